//! No-op push provider for local development.
//!
//! Logs each batch instead of dispatching it and reports every message
//! as accepted.

use async_trait::async_trait;

use super::{ProviderError, PushMessage, PushProvider, SendOutcome};

#[derive(Debug, Default)]
pub struct NoopPushProvider;

impl NoopPushProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushProvider for NoopPushProvider {
    async fn send_batch(&self, messages: &[PushMessage]) -> Result<Vec<SendOutcome>, ProviderError> {
        tracing::info!(
            batch_size = messages.len(),
            title = messages.first().map(|m| m.title.as_str()).unwrap_or(""),
            "Noop provider: dropping batch"
        );
        Ok(messages.iter().map(|_| SendOutcome::ok()).collect())
    }
}
