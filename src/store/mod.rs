//! Document store abstraction.
//!
//! The campaign engine treats its data store as an external
//! collaborator reachable through collection queries, point lookups and
//! deletes. This module defines that boundary, allowing different
//! storage implementations (memory, Postgres) to be used
//! interchangeably.

mod factory;
mod memory;
mod postgres;

pub use factory::create_document_store;
pub use memory::MemoryDocumentStore;
pub use postgres::PostgresDocumentStore;

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during document store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A filter cannot be expressed by this backend
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Backend is misconfigured or unavailable
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// One record in a collection. The document id doubles as the record's
/// address for point lookups and deletes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// JSON object holding the record's fields
    pub fields: serde_json::Value,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Look up a field value by name.
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }

    /// Look up a string field by name.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(|v| v.as_str())
    }
}

/// Comparison operator for a query predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Lt,
    Gt,
    /// Field is an array containing at least one of the given values
    ArrayContainsAny,
}

/// One query predicate. Multiple filters are ANDed together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: serde_json::Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: FilterOp, value: serde_json::Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn array_contains_any(field: impl Into<String>, values: Vec<String>) -> Self {
        Self::new(field, FilterOp::ArrayContainsAny, serde_json::json!(values))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Ascending,
    Descending,
}

/// Requested result ordering. When absent, the backend orders by
/// document id ascending.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

impl OrderBy {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Descending,
        }
    }
}

/// Resume point for a paginated query. Results begin strictly after the
/// cursor under the requested ordering.
#[derive(Debug, Clone)]
pub enum PageCursor {
    /// Resume after a full document; the document id breaks ties on the
    /// sort field
    Document(Document),
    /// Resume after a bare sort-field value
    FieldValue(serde_json::Value),
}

/// A filtered, ordered, bounded collection read.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
    pub start_after: Option<PageCursor>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            ..Default::default()
        }
    }
}

/// Backend trait for document storage.
///
/// # Thread Safety
///
/// Implementations must be thread-safe (`Send + Sync`) as they will be
/// shared across multiple async tasks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Execute a collection query, honoring filters, ordering, limit
    /// and start-after cursor.
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Count the documents a query would match, ignoring limit and
    /// cursor.
    async fn count(&self, query: &Query) -> Result<u64, StoreError>;

    /// Point lookup by document id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Delete a document by id. Deleting a missing document is not an
    /// error.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

/// Total order over JSON scalar values, used for sort keys and range
/// filters: null < bool < number < string < everything else.
pub(crate) fn compare_values(a: &serde_json::Value, b: &serde_json::Value) -> Ordering {
    use serde_json::Value;

    fn type_rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Text rendering of a JSON scalar, used for cursor keys and filter
/// values. Arrays, objects and null have no text form and are rejected
/// by the backends.
pub(crate) fn value_as_text(value: &serde_json::Value) -> Option<String> {
    use serde_json::Value;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_as_text() {
        assert_eq!(value_as_text(&json!("abc")), Some("abc".to_string()));
        assert_eq!(value_as_text(&json!(42)), Some("42".to_string()));
        assert_eq!(value_as_text(&json!(true)), Some("true".to_string()));
        assert_eq!(value_as_text(&json!(["a"])), None);
        assert_eq!(value_as_text(&json!(null)), None);
    }

    #[test]
    fn test_compare_values_scalars() {
        assert_eq!(compare_values(&json!(1), &json!(2)), Ordering::Less);
        assert_eq!(compare_values(&json!("a"), &json!("b")), Ordering::Less);
        assert_eq!(compare_values(&json!("b"), &json!("b")), Ordering::Equal);
        assert_eq!(compare_values(&json!(2.5), &json!(2)), Ordering::Greater);
    }

    #[test]
    fn test_compare_values_cross_type() {
        // null < bool < number < string
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(true), &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!(100), &json!("a")), Ordering::Less);
    }

    #[test]
    fn test_document_field_access() {
        let doc = Document::new("tok-1", json!({"owner": "alice", "count": 3}));
        assert_eq!(doc.str_field("owner"), Some("alice"));
        assert_eq!(doc.field("count"), Some(&json!(3)));
        assert_eq!(doc.field("missing"), None);
    }
}
