use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::campaigns::send_campaign;
use super::handlers::{health, stats};
use super::metrics::prometheus_metrics;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Stats
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Campaign endpoints
        .nest(
            "/api/v1",
            Router::new().route("/campaigns/send", post(send_campaign)),
        )
}
