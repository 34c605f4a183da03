mod campaigns;
mod handlers;
mod metrics;
mod routes;

pub use campaigns::send_campaign;
pub use handlers::{health, stats};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
