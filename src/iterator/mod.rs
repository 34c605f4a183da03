//! Generic cursor-paginated bulk-collection iterator.
//!
//! Streams an externally-paginated collection as a sequence of
//! fixed-size batches without ever holding the full result set in
//! memory. Each page is fetched with a start-after cursor taken from
//! the last record of the previous page, so per-page cost stays
//! O(batch size) no matter how deep the iteration has progressed.
//!
//! Pages are fetched strictly sequentially: the next cursor depends on
//! the prior page's last record. This is not a consistent snapshot —
//! records inserted behind the cursor after the scan starts may be
//! skipped.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::metrics::PAGES_FETCHED_TOTAL;
use crate::store::{Document, DocumentStore, Filter, OrderBy, PageCursor, Query};

/// Default page size when the caller does not set one.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Resume point for an iteration run.
#[derive(Debug, Clone)]
pub enum StartCursor {
    /// A document identifier; resolved to the full record via a point
    /// lookup before it can seed pagination. A failed lookup aborts the
    /// iteration.
    DocumentId(String),
    /// A bare sort-field value, usable as a page cursor directly.
    FieldValue(serde_json::Value),
}

/// Configuration for one iteration run.
#[derive(Debug, Clone)]
pub struct IterationRequest {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub batch_size: usize,
    /// `None` = unbounded
    pub max_batches: Option<u64>,
    pub start_cursor: Option<StartCursor>,
    /// Request an estimated total count, reported on the first batch
    pub with_count: bool,
}

impl IterationRequest {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            batch_size: DEFAULT_BATCH_SIZE,
            max_batches: None,
            start_cursor: None,
            with_count: false,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn max_batches(mut self, max_batches: u64) -> Self {
        self.max_batches = Some(max_batches);
        self
    }

    pub fn start_cursor(mut self, cursor: StartCursor) -> Self {
        self.start_cursor = Some(cursor);
        self
    }

    pub fn with_count(mut self) -> Self {
        self.with_count = true;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.collection.is_empty() {
            return Err(AppError::Validation("collection must not be empty".into()));
        }
        if self.batch_size < 1 {
            return Err(AppError::Validation("batch_size must be at least 1".into()));
        }
        if self.max_batches == Some(0) {
            return Err(AppError::Validation("max_batches must be at least 1".into()));
        }
        Ok(())
    }
}

/// One page of results handed to the batch handler.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Zero-based, strictly increasing, gapless
    pub index: u64,
    pub documents: Vec<Document>,
    /// Estimated total collection count; `Some` only on batch 0 when
    /// the request asked for a count
    pub estimated_total: Option<u64>,
}

/// Per-batch callback invoked by [`CollectionIterator::iterate`].
///
/// An `Err` from `handle` aborts the whole iteration; partial outputs
/// are discarded.
#[async_trait]
pub trait BatchHandler: Send {
    type Output: Send;

    async fn handle(&mut self, batch: Batch) -> Result<Self::Output>;
}

/// Engine that walks a filtered, ordered collection in fixed-size
/// batches, accumulating the handler's outputs.
pub struct CollectionIterator {
    store: Arc<dyn DocumentStore>,
}

impl CollectionIterator {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Run one iteration to completion.
    ///
    /// Terminates successfully on the first empty page, or early once
    /// `max_batches` pages have been processed. Any query failure or
    /// handler error propagates immediately.
    #[tracing::instrument(
        name = "iterator.iterate",
        skip(self, request, handler),
        fields(
            collection = %request.collection,
            batch_size = request.batch_size,
            max_batches = ?request.max_batches,
        )
    )]
    pub async fn iterate<H: BatchHandler>(
        &self,
        request: IterationRequest,
        handler: &mut H,
    ) -> Result<Vec<H::Output>> {
        request.validate()?;

        let mut cursor = self.resolve_start_cursor(&request).await?;

        let base_query = Query {
            collection: request.collection.clone(),
            filters: request.filters.clone(),
            order_by: request.order_by.clone(),
            limit: Some(request.batch_size),
            start_after: None,
        };

        let mut estimated_total = if request.with_count {
            Some(self.store.count(&base_query).await?)
        } else {
            None
        };

        let mut outputs = Vec::new();
        let mut index: u64 = 0;

        loop {
            if let Some(max) = request.max_batches {
                if index >= max {
                    tracing::debug!(
                        batches_processed = index,
                        max_batches = max,
                        "Stopping iteration at batch limit"
                    );
                    break;
                }
            }

            let mut query = base_query.clone();
            query.start_after = cursor.take();

            let documents = self.store.query(&query).await?;
            PAGES_FETCHED_TOTAL.inc();

            if documents.is_empty() {
                tracing::debug!(
                    batches_processed = index,
                    "Iteration complete, collection exhausted"
                );
                break;
            }

            // The last record of this page seeds the next page's
            // start-after cursor.
            if let Some(last) = documents.last() {
                cursor = Some(PageCursor::Document(last.clone()));
            }

            let batch = Batch {
                index,
                documents,
                estimated_total: if index == 0 { estimated_total.take() } else { None },
            };

            let output = handler.handle(batch).await?;
            outputs.push(output);
            index += 1;
        }

        Ok(outputs)
    }

    async fn resolve_start_cursor(
        &self,
        request: &IterationRequest,
    ) -> Result<Option<PageCursor>> {
        match &request.start_cursor {
            None => Ok(None),
            Some(StartCursor::FieldValue(value)) => {
                Ok(Some(PageCursor::FieldValue(value.clone())))
            }
            Some(StartCursor::DocumentId(id)) => {
                let document = self
                    .store
                    .get(&request.collection, id)
                    .await?
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "Cursor document '{}' not found in '{}'",
                            id, request.collection
                        ))
                    })?;
                Ok(Some(PageCursor::Document(document)))
            }
        }
    }
}
