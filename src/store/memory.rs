//! In-memory document store backend.
//!
//! Used for local development and tests. Keeps per-operation call
//! counters so tests can assert how many store round trips a code path
//! issued.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{
    compare_values, value_as_text, Direction, Document, DocumentStore, Filter, FilterOp, OrderBy,
    PageCursor, Query, StoreError,
};

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: DashMap<String, DashMap<String, Value>>,
    query_calls: AtomicU64,
    count_calls: AtomicU64,
    get_calls: AtomicU64,
    delete_calls: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a document. Not part of the `DocumentStore`
    /// trait; writes other than deletes belong to other subsystems.
    pub fn insert(&self, collection: &str, id: impl Into<String>, fields: Value) {
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id.into(), fields);
    }

    /// Number of documents currently in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .get(collection)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }

    pub fn query_calls(&self) -> u64 {
        self.query_calls.load(AtomicOrdering::Relaxed)
    }

    pub fn count_calls(&self) -> u64 {
        self.count_calls.load(AtomicOrdering::Relaxed)
    }

    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(AtomicOrdering::Relaxed)
    }

    pub fn delete_calls(&self) -> u64 {
        self.delete_calls.load(AtomicOrdering::Relaxed)
    }

    fn matching_documents(&self, query: &Query) -> Vec<Document> {
        let Some(collection) = self.collections.get(&query.collection) else {
            return Vec::new();
        };

        collection
            .iter()
            .map(|entry| Document::new(entry.key().clone(), entry.value().clone()))
            .filter(|doc| query.filters.iter().all(|f| filter_matches(doc, f)))
            .collect()
    }
}

fn filter_matches(doc: &Document, filter: &Filter) -> bool {
    let field_value = doc.field(&filter.field).unwrap_or(&Value::Null);
    match filter.op {
        FilterOp::Eq => field_value == &filter.value,
        FilterOp::Lt => compare_values(field_value, &filter.value) == Ordering::Less,
        FilterOp::Gt => compare_values(field_value, &filter.value) == Ordering::Greater,
        FilterOp::ArrayContainsAny => {
            let (Some(haystack), Some(needles)) =
                (field_value.as_array(), filter.value.as_array())
            else {
                return false;
            };
            needles.iter().any(|n| haystack.contains(n))
        }
    }
}

/// Total order over documents under the requested ordering, with the
/// document id as tiebreak.
fn document_cmp(a: &Document, b: &Document, order_by: Option<&OrderBy>) -> Ordering {
    match order_by {
        None => a.id.cmp(&b.id),
        Some(order) => {
            let av = a.field(&order.field).unwrap_or(&Value::Null);
            let bv = b.field(&order.field).unwrap_or(&Value::Null);
            let cmp = compare_values(av, bv).then_with(|| a.id.cmp(&b.id));
            match order.direction {
                Direction::Ascending => cmp,
                Direction::Descending => cmp.reverse(),
            }
        }
    }
}

/// Whether a document lies strictly after the cursor under the
/// requested ordering.
fn after_cursor(doc: &Document, cursor: &PageCursor, order_by: Option<&OrderBy>) -> bool {
    match cursor {
        PageCursor::Document(cursor_doc) => {
            document_cmp(doc, cursor_doc, order_by) == Ordering::Greater
        }
        PageCursor::FieldValue(value) => match order_by {
            // Guarded in query(): the cursor value has a text form here
            None => Some(doc.id.clone()) > value_as_text(value),
            Some(order) => {
                let field_value = doc.field(&order.field).unwrap_or(&Value::Null);
                let cmp = compare_values(field_value, value);
                match order.direction {
                    Direction::Ascending => cmp == Ordering::Greater,
                    Direction::Descending => cmp == Ordering::Less,
                }
            }
        },
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.query_calls.fetch_add(1, AtomicOrdering::Relaxed);

        // Without an order_by, a bare field-value cursor pages by
        // document id, so it must render as text
        if let Some(PageCursor::FieldValue(value)) = &query.start_after {
            if query.order_by.is_none() && value_as_text(value).is_none() {
                return Err(StoreError::UnsupportedFilter(
                    "non-scalar page cursor requires an order_by field".into(),
                ));
            }
        }

        let mut documents = self.matching_documents(query);
        documents.sort_by(|a, b| document_cmp(a, b, query.order_by.as_ref()));

        if let Some(cursor) = &query.start_after {
            documents.retain(|doc| after_cursor(doc, cursor, query.order_by.as_ref()));
        }

        if let Some(limit) = query.limit {
            documents.truncate(limit);
        }

        Ok(documents)
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        self.count_calls.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(self.matching_documents(query).len() as u64)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.get_calls.fetch_add(1, AtomicOrdering::Relaxed);
        Ok(self
            .collections
            .get(collection)
            .and_then(|c| c.get(id).map(|v| Document::new(id, v.clone()))))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, AtomicOrdering::Relaxed);
        if let Some(collection) = self.collections.get(collection) {
            collection.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded_store() -> MemoryDocumentStore {
        let store = MemoryDocumentStore::new();
        store.insert("tokens", "tok-a", json!({"owner": "alice", "rank": 3, "tags": ["news"]}));
        store.insert("tokens", "tok-b", json!({"owner": "bob", "rank": 1, "tags": ["sports"]}));
        store.insert("tokens", "tok-c", json!({"owner": "alice", "rank": 2, "tags": ["news", "tech"]}));
        store
    }

    #[tokio::test]
    async fn test_query_default_order_is_id_ascending() {
        let store = seeded_store();
        let docs = store.query(&Query::new("tokens")).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["tok-a", "tok-b", "tok-c"]);
    }

    #[tokio::test]
    async fn test_query_order_by_field() {
        let store = seeded_store();
        let mut query = Query::new("tokens");
        query.order_by = Some(OrderBy::asc("rank"));
        let docs = store.query(&query).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["tok-b", "tok-c", "tok-a"]);

        query.order_by = Some(OrderBy::desc("rank"));
        let docs = store.query(&query).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["tok-a", "tok-c", "tok-b"]);
    }

    #[tokio::test]
    async fn test_query_eq_filter() {
        let store = seeded_store();
        let mut query = Query::new("tokens");
        query.filters.push(Filter::eq("owner", json!("alice")));
        let docs = store.query(&query).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.str_field("owner") == Some("alice")));
    }

    #[tokio::test]
    async fn test_query_array_contains_any() {
        let store = seeded_store();
        let mut query = Query::new("tokens");
        query
            .filters
            .push(Filter::array_contains_any("tags", vec!["tech".into(), "finance".into()]));
        let docs = store.query(&query).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "tok-c");
    }

    #[tokio::test]
    async fn test_query_document_cursor_pagination() {
        let store = seeded_store();
        let mut query = Query::new("tokens");
        query.limit = Some(2);
        let first_page = store.query(&query).await.unwrap();
        assert_eq!(first_page.len(), 2);

        query.start_after = Some(PageCursor::Document(first_page.last().unwrap().clone()));
        let second_page = store.query(&query).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].id, "tok-c");
    }

    #[tokio::test]
    async fn test_query_field_value_cursor() {
        let store = seeded_store();
        let mut query = Query::new("tokens");
        query.order_by = Some(OrderBy::asc("rank"));
        query.start_after = Some(PageCursor::FieldValue(json!(1)));
        let docs = store.query(&query).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["tok-c", "tok-a"]);
    }

    #[tokio::test]
    async fn test_non_scalar_id_cursor_rejected() {
        let store = seeded_store();
        let mut query = Query::new("tokens");
        query.start_after = Some(PageCursor::FieldValue(json!(["tok-a"])));

        let result = store.query(&query).await;
        assert!(matches!(result, Err(StoreError::UnsupportedFilter(_))));

        // A scalar cursor still pages by document id
        query.start_after = Some(PageCursor::FieldValue(json!("tok-a")));
        let docs = store.query(&query).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["tok-b", "tok-c"]);
    }

    #[tokio::test]
    async fn test_count_ignores_limit() {
        let store = seeded_store();
        let mut query = Query::new("tokens");
        query.limit = Some(1);
        assert_eq!(store.count(&query).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_get_and_delete() {
        let store = seeded_store();
        let doc = store.get("tokens", "tok-b").await.unwrap().unwrap();
        assert_eq!(doc.str_field("owner"), Some("bob"));

        store.delete("tokens", "tok-b").await.unwrap();
        assert!(store.get("tokens", "tok-b").await.unwrap().is_none());

        // Deleting a missing document is not an error
        store.delete("tokens", "tok-b").await.unwrap();
        assert_eq!(store.len("tokens"), 2);
    }

    #[tokio::test]
    async fn test_call_counters() {
        let store = seeded_store();
        store.query(&Query::new("tokens")).await.unwrap();
        store.query(&Query::new("tokens")).await.unwrap();
        store.get("tokens", "tok-a").await.unwrap();
        assert_eq!(store.query_calls(), 2);
        assert_eq!(store.get_calls(), 1);
        assert_eq!(store.delete_calls(), 0);
    }
}
