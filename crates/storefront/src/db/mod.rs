//! Document persistence for the marketplace.
//!
//! Records are schemaless JSON documents grouped into collections, in the
//! shape the browser clients have always read and written. The
//! [`DocumentStore`] trait is the only way handlers touch storage:
//!
//! - [`postgres::PgDocumentStore`] - `storefront.documents` table, one JSONB
//!   row per document
//! - [`memory::MemoryDocumentStore`] - process-local, for tests and local
//!   development without a database
//!
//! Typed repositories (`waitlist`, `users`, `bookings`, `providers`) sit on
//! top and convert documents into models.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p brnno-cli -- migrate
//! ```

pub mod bookings;
pub mod memory;
pub mod postgres;
pub mod providers;
pub mod users;
pub mod waitlist;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored data does not match the expected shape.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested document was not found.
    #[error("not found")]
    NotFound,

    /// A document with the same ID already exists.
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Whether retrying the same operation may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// A named group of documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Waitlist,
    Users,
    Bookings,
    Providers,
}

impl Collection {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Waitlist => "waitlist",
            Self::Users => "users",
            Self::Bookings => "bookings",
            Self::Providers => "providers",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document with its server-assigned metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Deserialize the document into a model.
    ///
    /// `id`, `createdAt` and `updatedAt` are made visible to the model
    /// alongside the stored fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored fields do not
    /// fit `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, RepositoryError> {
        let mut fields = self.data.clone();
        fields.insert("id".to_owned(), Value::String(self.id.clone()));
        fields.insert(
            "createdAt".to_owned(),
            Value::String(self.created_at.to_rfc3339()),
        );
        fields.insert(
            "updatedAt".to_owned(),
            Value::String(self.updated_at.to_rfc3339()),
        );

        serde_json::from_value(Value::Object(fields)).map_err(|e| {
            RepositoryError::DataCorruption(format!("document {} is malformed: {e}", self.id))
        })
    }
}

/// Sort direction for [`Query::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// What a query is ordered by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    /// Server creation timestamp.
    CreatedAt,
    /// A top-level field of the document.
    Field(String),
}

/// Equality filters over top-level fields, with optional order and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Map<String, Value>,
    pub order: Option<(SortKey, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Match documents whose `field` equals `value`.
    #[must_use]
    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.insert(field.to_owned(), value.into());
        self
    }

    #[must_use]
    pub fn order_by(mut self, key: SortKey, direction: Direction) -> Self {
        self.order = Some((key, direction));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `data` satisfies every equality filter.
    #[must_use]
    pub fn matches(&self, data: &Map<String, Value>) -> bool {
        self.filters
            .iter()
            .all(|(field, expected)| data.get(field) == Some(expected))
    }
}

/// Backing store for marketplace documents.
///
/// Updates merge top-level fields, last write wins; there are no
/// transactions across documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document. The ID is generated unless `id` is given.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if `id` is already taken.
    async fn create(
        &self,
        collection: Collection,
        id: Option<&str>,
        data: Map<String, Value>,
    ) -> Result<Document, RepositoryError>;

    async fn get(&self, collection: Collection, id: &str)
    -> Result<Option<Document>, RepositoryError>;

    async fn query(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Document>, RepositoryError>;

    /// Merge `partial` into the stored document's top-level fields.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the document does not exist.
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        partial: Map<String, Value>,
    ) -> Result<(), RepositoryError>;

    /// Atomically add `by` to a numeric field, treating a missing field as 0.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the document does not exist.
    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<(), RepositoryError>;

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), RepositoryError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Serialize a model into the field map stored for a document.
///
/// # Errors
///
/// Returns `RepositoryError::DataCorruption` if `value` does not serialize
/// to a JSON object.
pub fn to_fields<T: serde::Serialize>(value: &T) -> Result<Map<String, Value>, RepositoryError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(RepositoryError::DataCorruption(format!(
            "expected an object, got {other}"
        ))),
        Err(e) => Err(RepositoryError::DataCorruption(e.to_string())),
    }
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Sample {
        id: String,
        name: String,
        created_at: DateTime<Utc>,
    }

    fn doc(data: Value) -> Document {
        let Value::Object(data) = data else {
            panic!("object expected")
        };
        Document {
            id: "doc-1".to_owned(),
            data,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_decode_exposes_metadata() {
        let document = doc(json!({"name": "Provo"}));
        let sample: Sample = document.decode().unwrap();
        assert_eq!(sample.id, "doc-1");
        assert_eq!(sample.name, "Provo");
        assert_eq!(sample.created_at, document.created_at);
    }

    #[test]
    fn test_decode_reports_corruption() {
        let err = doc(json!({"name": 42})).decode::<Sample>().unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(_)));
    }

    #[test]
    fn test_query_matches_all_filters() {
        let query = Query::new()
            .filter("status", "approved")
            .filter("city", "Provo");
        let Value::Object(hit) = json!({"status": "approved", "city": "Provo", "x": 1}) else {
            unreachable!()
        };
        let Value::Object(miss) = json!({"status": "pending", "city": "Provo"}) else {
            unreachable!()
        };
        assert!(query.matches(&hit));
        assert!(!query.matches(&miss));
        assert!(Query::new().matches(&miss));
    }

    #[test]
    fn test_only_database_errors_are_transient() {
        assert!(RepositoryError::Database(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!RepositoryError::NotFound.is_transient());
        assert!(!RepositoryError::Conflict("x".to_owned()).is_transient());
        assert!(!RepositoryError::DataCorruption("x".to_owned()).is_transient());
    }

    #[test]
    fn test_to_fields_requires_object() {
        assert!(to_fields(&json!({"a": 1})).is_ok());
        assert!(to_fields(&3).is_err());
    }
}
