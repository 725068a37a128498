//! In-process document store.
//!
//! Used by tests and by local development when no database URL is
//! configured. Contents are lost on restart.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Collection, Direction, Document, DocumentStore, Query, RepositoryError, SortKey};

/// Documents of one collection, in insertion order.
#[derive(Default)]
struct Shelf {
    order: Vec<String>,
    docs: HashMap<String, Document>,
}

/// A [`DocumentStore`] held in memory.
#[derive(Default)]
pub struct MemoryDocumentStore {
    shelves: RwLock<HashMap<Collection, Shelf>>,
}

impl MemoryDocumentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn create(
        &self,
        collection: Collection,
        id: Option<&str>,
        data: Map<String, Value>,
    ) -> Result<Document, RepositoryError> {
        let id = id.map_or_else(|| Uuid::new_v4().simple().to_string(), str::to_owned);
        let now = Utc::now();

        let mut shelves = self.shelves.write().await;
        let shelf = shelves.entry(collection).or_default();
        if shelf.docs.contains_key(&id) {
            return Err(RepositoryError::Conflict(format!(
                "{collection}/{id} already exists"
            )));
        }

        let document = Document {
            id: id.clone(),
            data,
            created_at: now,
            updated_at: now,
        };
        shelf.order.push(id.clone());
        shelf.docs.insert(id, document.clone());
        Ok(document)
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, RepositoryError> {
        let shelves = self.shelves.read().await;
        Ok(shelves
            .get(&collection)
            .and_then(|shelf| shelf.docs.get(id))
            .cloned())
    }

    async fn query(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Document>, RepositoryError> {
        let shelves = self.shelves.read().await;
        let Some(shelf) = shelves.get(&collection) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<Document> = shelf
            .order
            .iter()
            .filter_map(|id| shelf.docs.get(id))
            .filter(|doc| query.matches(&doc.data))
            .cloned()
            .collect();

        if let Some((key, direction)) = &query.order {
            hits.sort_by(|a, b| {
                let ordering = match key {
                    SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
                    SortKey::Field(field) => compare_values(a.data.get(field), b.data.get(field)),
                };
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            hits.truncate(limit);
        }
        Ok(hits)
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        partial: Map<String, Value>,
    ) -> Result<(), RepositoryError> {
        let mut shelves = self.shelves.write().await;
        let doc = shelves
            .get_mut(&collection)
            .and_then(|shelf| shelf.docs.get_mut(id))
            .ok_or(RepositoryError::NotFound)?;

        doc.data.extend(partial);
        doc.updated_at = Utc::now();
        Ok(())
    }

    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<(), RepositoryError> {
        let mut shelves = self.shelves.write().await;
        let doc = shelves
            .get_mut(&collection)
            .and_then(|shelf| shelf.docs.get_mut(id))
            .ok_or(RepositoryError::NotFound)?;

        let current = doc.data.get(field).and_then(Value::as_i64).unwrap_or(0);
        doc.data
            .insert(field.to_owned(), Value::from(current.saturating_add(by)));
        doc.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), RepositoryError> {
        let mut shelves = self.shelves.write().await;
        if let Some(shelf) = shelves.get_mut(&collection)
            && shelf.docs.remove(id).is_some()
        {
            shelf.order.retain(|existing| existing != id);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Order JSON values the way the query engine does: missing and null first,
/// then booleans, numbers and strings.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    const fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
