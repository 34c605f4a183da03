//! Factory for creating document store backends based on configuration.

use std::sync::Arc;

use crate::config::StoreConfig;

use super::{DocumentStore, MemoryDocumentStore, PostgresDocumentStore, StoreError};

/// Create a document store backend from configuration.
///
/// Backends:
/// - `"postgres"` — JSONB-backed store; requires `store.database_url`
/// - `"memory"` (default) — in-process store for development and tests
pub async fn create_document_store(
    config: &StoreConfig,
) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.backend.as_str() {
        "postgres" => {
            let store = PostgresDocumentStore::connect(config).await?;
            store.migrate().await?;
            tracing::info!("Using PostgreSQL document store");
            Ok(Arc::new(store))
        }
        "memory" => {
            tracing::info!("Using in-memory document store");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
        other => {
            tracing::warn!(
                backend = %other,
                "Unknown store backend, falling back to memory"
            );
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
    }
}
