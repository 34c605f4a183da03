use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::Claims;
use crate::config::CampaignConfig;
use crate::error::{AppError, Result};
use crate::provider::PushMessage;

/// Raw notification payload as submitted by the caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDraft {
    pub title: Option<String>,
    pub body: Option<String>,
    pub icon: Option<String>,
    pub click_action: Option<String>,
}

/// Validated, immutable payload for one campaign.
///
/// `click_action` carries a `cb=<epoch millis>` cache-busting query
/// parameter appended at validation time.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationSpec {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub click_action: String,
}

impl NotificationSpec {
    /// Validate and normalize a draft. Missing title/body or an
    /// unparseable click action is fatal for the whole request.
    pub fn validate(draft: NotificationDraft, config: &CampaignConfig) -> Result<Self> {
        let title = draft
            .title
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::Validation("notification title is required".into()))?;

        let body = draft
            .body
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| AppError::Validation("notification body is required".into()))?;

        let icon = draft
            .icon
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| config.default_icon.clone());

        let click_action = draft
            .click_action
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| config.default_click_action.clone());
        let click_action = append_cache_buster(&click_action)?;

        Ok(Self {
            title,
            body,
            icon,
            click_action,
        })
    }

    /// Build the provider message for one registration token.
    pub fn message_for(&self, token: &str) -> PushMessage {
        PushMessage {
            token: token.to_string(),
            title: self.title.clone(),
            body: self.body.clone(),
            icon: self.icon.clone(),
            click_action: self.click_action.clone(),
        }
    }
}

fn append_cache_buster(raw: &str) -> Result<String> {
    let mut url = Url::parse(raw)
        .map_err(|e| AppError::Validation(format!("invalid click_action URL '{}': {}", raw, e)))?;
    let timestamp = chrono::Utc::now().timestamp_millis();
    url.query_pairs_mut()
        .append_pair("cb", &timestamp.to_string());
    Ok(url.to_string())
}

/// Audience selection for one campaign.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterSpec {
    /// Match registrations carrying any of these tags
    pub tags: Option<Vec<String>>,
    /// Match registrations owned by this user
    pub owner: Option<String>,
    /// Direct single-recipient send, bypassing the iterator
    pub token: Option<String>,
    /// Cap on total registrations processed
    pub limit: Option<u64>,
}

/// Running totals for one campaign call. Owned by exactly one in-flight
/// call; never shared across campaigns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CampaignAggregate {
    /// Registrations scanned
    pub subscribers: u64,
    /// Batches processed
    pub batches: u64,
    /// Messages accepted by the provider
    pub sent: u64,
    /// Dead registrations confirmed deleted
    pub deleted: u64,
}

/// The identity launching a campaign, as established by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    claims: Option<Claims>,
}

impl Caller {
    pub fn authenticated(claims: Claims) -> Self {
        Self {
            claims: Some(claims),
        }
    }

    pub fn anonymous() -> Self {
        Self { claims: None }
    }

    pub fn is_authenticated(&self) -> bool {
        self.claims.is_some()
    }

    pub fn is_admin(&self, admin_role: &str) -> bool {
        self.claims
            .as_ref()
            .map(|c| c.has_role(admin_role))
            .unwrap_or(false)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.claims.as_ref().map(|c| c.user_id())
    }
}
