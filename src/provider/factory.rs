//! Factory for creating push provider backends based on configuration.

use std::sync::Arc;

use crate::config::ProviderConfig;

use super::{NoopPushProvider, PushProvider};

/// Create a push provider backend from configuration.
///
/// Only the `"noop"` backend ships with the service; real delivery
/// backends plug in behind the `PushProvider` trait.
pub fn create_push_provider(config: &ProviderConfig) -> Arc<dyn PushProvider> {
    match config.backend.as_str() {
        "noop" => {
            tracing::info!("Using noop push provider");
            Arc::new(NoopPushProvider::new())
        }
        other => {
            tracing::warn!(
                backend = %other,
                "Unknown provider backend, falling back to noop"
            );
            Arc::new(NoopPushProvider::new())
        }
    }
}
