//! PostgreSQL-backed document store.
//!
//! Documents live in a single `documents` table keyed by
//! `(collection, doc_id)` with the record body in a JSONB column.
//! Filters and sort keys address JSONB fields through `->>`, so sort
//! order follows text collation; sort fields that need numeric order
//! should be stored zero-padded.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};

use crate::config::StoreConfig;

use super::{
    value_as_text, Direction, Document, DocumentStore, Filter, FilterOp, PageCursor, Query,
    StoreError,
};

pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a store from configuration, connecting a fresh pool.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("store.database_url is not set".into()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(url)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            "PostgreSQL document store connected"
        );

        Ok(Self::new(pool))
    }

    /// Create the backing table if it does not exist.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                doc_id     TEXT NOT NULL,
                data       JSONB NOT NULL,
                PRIMARY KEY (collection, doc_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert or replace a document. Not part of the `DocumentStore`
    /// trait; used by seeding tooling.
    pub async fn upsert(
        &self,
        collection: &str,
        id: &str,
        fields: &Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, doc_id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, doc_id) DO UPDATE SET data = EXCLUDED.data
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(fields)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn push_filters(
        builder: &mut QueryBuilder<'_, Postgres>,
        filters: &[Filter],
    ) -> Result<(), StoreError> {
        for filter in filters {
            match filter.op {
                FilterOp::Eq | FilterOp::Lt | FilterOp::Gt => {
                    let operator = match filter.op {
                        FilterOp::Eq => " = ",
                        FilterOp::Lt => " < ",
                        FilterOp::Gt => " > ",
                        FilterOp::ArrayContainsAny => unreachable!(),
                    };
                    let value = value_as_text(&filter.value).ok_or_else(|| {
                        StoreError::UnsupportedFilter(format!(
                            "non-scalar value for field '{}'",
                            filter.field
                        ))
                    })?;
                    builder.push(" AND data->>");
                    builder.push_bind(filter.field.clone());
                    builder.push(operator);
                    builder.push_bind(value);
                }
                FilterOp::ArrayContainsAny => {
                    let needles: Vec<String> = filter
                        .value
                        .as_array()
                        .map(|values| {
                            values
                                .iter()
                                .filter_map(|v| value_as_text(v))
                                .collect()
                        })
                        .ok_or_else(|| {
                            StoreError::UnsupportedFilter(format!(
                                "array_contains_any on '{}' requires an array value",
                                filter.field
                            ))
                        })?;
                    builder.push(" AND data->");
                    builder.push_bind(filter.field.clone());
                    builder.push(" ?| ");
                    builder.push_bind(needles);
                    builder.push("::text[]");
                }
            }
        }
        Ok(())
    }

    /// Sort clause matching `push_cursor`'s row-tuple predicate: the
    /// doc_id tiebreak follows the sort direction so that `(field,
    /// doc_id)` comparisons walk the exact emission order.
    fn push_order(builder: &mut QueryBuilder<'_, Postgres>, query: &Query) {
        match &query.order_by {
            Some(order) => {
                builder.push(" ORDER BY data->>");
                builder.push_bind(order.field.clone());
                match order.direction {
                    Direction::Ascending => builder.push(" ASC, doc_id ASC"),
                    Direction::Descending => builder.push(" DESC, doc_id DESC"),
                };
            }
            None => {
                builder.push(" ORDER BY doc_id ASC");
            }
        }
    }

    fn push_cursor(
        builder: &mut QueryBuilder<'_, Postgres>,
        query: &Query,
        cursor: &PageCursor,
    ) -> Result<(), StoreError> {
        match (&query.order_by, cursor) {
            (Some(order), PageCursor::Document(doc)) => {
                let key = doc
                    .field(&order.field)
                    .and_then(value_as_text)
                    .unwrap_or_default();
                let operator = match order.direction {
                    Direction::Ascending => " > ",
                    Direction::Descending => " < ",
                };
                builder.push(" AND (data->>");
                builder.push_bind(order.field.clone());
                builder.push(", doc_id)");
                builder.push(operator);
                builder.push("(");
                builder.push_bind(key);
                builder.push(", ");
                builder.push_bind(doc.id.clone());
                builder.push(")");
            }
            (Some(order), PageCursor::FieldValue(value)) => {
                let key = value_as_text(value).ok_or_else(|| {
                    StoreError::UnsupportedFilter("non-scalar page cursor value".into())
                })?;
                let operator = match order.direction {
                    Direction::Ascending => " > ",
                    Direction::Descending => " < ",
                };
                builder.push(" AND data->>");
                builder.push_bind(order.field.clone());
                builder.push(operator);
                builder.push_bind(key);
            }
            (None, PageCursor::Document(doc)) => {
                builder.push(" AND doc_id > ");
                builder.push_bind(doc.id.clone());
            }
            (None, PageCursor::FieldValue(value)) => {
                let key = value_as_text(value).ok_or_else(|| {
                    StoreError::UnsupportedFilter("non-scalar page cursor value".into())
                })?;
                builder.push(" AND doc_id > ");
                builder.push_bind(key);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT doc_id, data FROM documents WHERE collection = ",
        );
        builder.push_bind(query.collection.clone());

        Self::push_filters(&mut builder, &query.filters)?;

        if let Some(cursor) = &query.start_after {
            Self::push_cursor(&mut builder, query, cursor)?;
        }

        Self::push_order(&mut builder, query);

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let id: String = row.get("doc_id");
                let data: Value = row.get("data");
                Document::new(id, data)
            })
            .collect())
    }

    async fn count(&self, query: &Query) -> Result<u64, StoreError> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) AS total FROM documents WHERE collection = ",
        );
        builder.push_bind(query.collection.clone());
        Self::push_filters(&mut builder, &query.filters)?;

        let row = builder.build().fetch_one(&self.pool).await?;
        let total: i64 = row.get("total");
        Ok(total.max(0) as u64)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query(
            "SELECT doc_id, data FROM documents WHERE collection = $1 AND doc_id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| {
            let id: String = row.get("doc_id");
            let data: Value = row.get("data");
            Document::new(id, data)
        }))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM documents WHERE collection = $1 AND doc_id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
