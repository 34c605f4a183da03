use axum::{extract::State, http::header, http::HeaderMap, Json};
use serde::{Deserialize, Serialize};

use crate::auth::JwtValidator;
use crate::campaign::{Caller, CampaignAggregate, FilterSpec, NotificationDraft};
use crate::error::Result;
use crate::server::AppState;

/// Request to launch a push campaign
#[derive(Debug, Deserialize)]
pub struct SendCampaignRequest {
    pub notification: NotificationDraft,
    #[serde(default)]
    pub filters: FilterSpec,
}

/// Response for a completed campaign
#[derive(Debug, Serialize)]
pub struct SendCampaignResponse {
    pub subscribers: u64,
    pub batches: u64,
    pub sent: u64,
    pub deleted: u64,
}

impl From<CampaignAggregate> for SendCampaignResponse {
    fn from(aggregate: CampaignAggregate) -> Self {
        Self {
            subscribers: aggregate.subscribers,
            batches: aggregate.batches,
            sent: aggregate.sent,
            deleted: aggregate.deleted,
        }
    }
}

/// Launch a push campaign.
///
/// The engine enforces the admin gate; this handler only establishes
/// the caller's identity from the bearer token. A missing or invalid
/// token yields an anonymous caller, which the engine rejects with 401.
pub async fn send_campaign(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SendCampaignRequest>,
) -> Result<Json<SendCampaignResponse>> {
    let caller = caller_from_headers(&headers, &state.jwt_validator);

    let aggregate = state
        .engine
        .send_campaign(request.notification, request.filters, &caller)
        .await?;

    Ok(Json(aggregate.into()))
}

fn caller_from_headers(headers: &HeaderMap, validator: &JwtValidator) -> Caller {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header {
        Some(value) => match validator.validate_bearer(value) {
            Ok(claims) => Caller::authenticated(claims),
            Err(e) => {
                tracing::debug!(error = %e, "Rejected bearer token");
                Caller::anonymous()
            }
        },
        None => Caller::anonymous(),
    }
}
