//! `PostgreSQL` document store.
//!
//! All collections share `storefront.documents`, keyed by
//! `(collection, id)` with the fields in a JSONB `data` column. Equality
//! filters are a single containment test (`data @> $filters`) served by the
//! GIN index. Runtime queries are used throughout since the document shape is
//! not known to the compiler.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use super::{Collection, Direction, Document, DocumentStore, Query, RepositoryError, SortKey};

/// A [`DocumentStore`] backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_document(row: &sqlx::postgres::PgRow) -> Result<Document, RepositoryError> {
    let id: String = row.try_get("id")?;
    let Json(data): Json<Value> = row.try_get("data")?;
    let created_at: DateTime<Utc> = row.try_get("created_at")?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

    let Value::Object(data) = data else {
        return Err(RepositoryError::DataCorruption(format!(
            "document {id} is not a JSON object"
        )));
    };

    Ok(Document {
        id,
        data,
        created_at,
        updated_at,
    })
}

/// `ORDER BY` clause for a query. Field names are bound as `$n`, never
/// interpolated.
fn order_clause(order: Option<&(SortKey, Direction)>, field_param: usize) -> String {
    let Some((key, direction)) = order else {
        return "ORDER BY created_at ASC, id ASC".to_owned();
    };
    let dir = match direction {
        Direction::Ascending => "ASC",
        Direction::Descending => "DESC",
    };
    match key {
        SortKey::CreatedAt => format!("ORDER BY created_at {dir}, id {dir}"),
        SortKey::Field(_) => format!("ORDER BY data -> ${field_param} {dir}, created_at ASC"),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    #[instrument(skip(self, data), fields(collection = %collection))]
    async fn create(
        &self,
        collection: Collection,
        id: Option<&str>,
        data: Map<String, Value>,
    ) -> Result<Document, RepositoryError> {
        let id = id.map_or_else(|| Uuid::new_v4().simple().to_string(), str::to_owned);

        let row = sqlx::query(
            r"
            INSERT INTO storefront.documents (collection, id, data)
            VALUES ($1, $2, $3)
            RETURNING id, data, created_at, updated_at
            ",
        )
        .bind(collection.as_str())
        .bind(&id)
        .bind(Json(Value::Object(data)))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict(format!("{collection}/{id} already exists"));
            }
            RepositoryError::Database(e)
        })?;

        row_to_document(&row)
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, RepositoryError> {
        let row = sqlx::query(
            r"
            SELECT id, data, created_at, updated_at
            FROM storefront.documents
            WHERE collection = $1 AND id = $2
            ",
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_document).transpose()
    }

    #[instrument(skip(self, query), fields(collection = %collection))]
    async fn query(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Document>, RepositoryError> {
        let limit = query
            .limit
            .map_or(i64::MAX, |l| i64::try_from(l).unwrap_or(i64::MAX));

        let sql = format!(
            r"
            SELECT id, data, created_at, updated_at
            FROM storefront.documents
            WHERE collection = $1 AND data @> $2
            {}
            LIMIT $3
            ",
            order_clause(query.order.as_ref(), 4)
        );

        let mut statement = sqlx::query(&sql)
            .bind(collection.as_str())
            .bind(Json(Value::Object(query.filters.clone())))
            .bind(limit);
        if let Some((SortKey::Field(field), _)) = &query.order {
            statement = statement.bind(field);
        }

        let rows = statement.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_document).collect()
    }

    #[instrument(skip(self, partial), fields(collection = %collection))]
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        partial: Map<String, Value>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.documents
            SET data = data || $3, updated_at = now()
            WHERE collection = $1 AND id = $2
            ",
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(Value::Object(partial)))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(collection = %collection))]
    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE storefront.documents
            SET data = jsonb_set(
                    data,
                    ARRAY[$3::text],
                    to_jsonb(COALESCE((data ->> $3)::bigint, 0) + $4)
                ),
                updated_at = now()
            WHERE collection = $1 AND id = $2
            ",
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(field)
        .bind(by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_clause_defaults_to_insertion_order() {
        assert_eq!(order_clause(None, 4), "ORDER BY created_at ASC, id ASC");
    }

    #[test]
    fn test_order_clause_binds_field_name() {
        let order = (SortKey::Field("date".to_owned()), Direction::Descending);
        let clause = order_clause(Some(&order), 4);
        assert_eq!(clause, "ORDER BY data -> $4 DESC, created_at ASC");
        assert!(!clause.contains("date"));
    }

    #[test]
    fn test_order_clause_created_at() {
        let order = (SortKey::CreatedAt, Direction::Descending);
        assert_eq!(
            order_clause(Some(&order), 4),
            "ORDER BY created_at DESC, id DESC"
        );
    }
}
