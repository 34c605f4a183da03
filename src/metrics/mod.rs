//! Prometheus metrics for the campaign service.
//!
//! - Campaign metrics (launched, failed)
//! - Fan-out metrics (batches, messages sent, tokens deleted)
//! - Iterator metrics (pages fetched)

use lazy_static::lazy_static;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "fanout";

lazy_static! {
    /// Total campaigns accepted for processing
    pub static ref CAMPAIGNS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_campaigns_total", METRIC_PREFIX),
        "Total campaigns accepted for processing"
    ).unwrap();

    /// Total campaigns that terminated with an error
    pub static ref CAMPAIGNS_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_campaigns_failed_total", METRIC_PREFIX),
        "Total campaigns that terminated with an error"
    ).unwrap();

    /// Total fan-out batches processed
    pub static ref BATCHES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_batches_total", METRIC_PREFIX),
        "Total fan-out batches processed"
    ).unwrap();

    /// Total messages accepted by the push provider
    pub static ref MESSAGES_SENT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_sent_total", METRIC_PREFIX),
        "Total messages accepted by the push provider"
    ).unwrap();

    /// Total per-message failures reported by the push provider
    pub static ref MESSAGES_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_failed_total", METRIC_PREFIX),
        "Total per-message failures reported by the push provider"
    ).unwrap();

    /// Total registration tokens deleted as permanently invalid
    pub static ref TOKENS_DELETED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_tokens_deleted_total", METRIC_PREFIX),
        "Total registration tokens deleted as permanently invalid"
    ).unwrap();

    /// Total pages fetched by the collection iterator
    pub static ref PAGES_FETCHED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_pages_fetched_total", METRIC_PREFIX),
        "Total pages fetched by the collection iterator"
    ).unwrap();
}

/// Encode all registered metrics in Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Invalid UTF-8 in metrics: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_metrics() {
        CAMPAIGNS_TOTAL.inc();
        let output = encode_metrics().unwrap();
        assert!(output.contains("fanout_campaigns_total"));
    }
}
