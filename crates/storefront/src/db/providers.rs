//! Provider application repository.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use brnno_core::wizard::provider::ProviderApplicationRecord;
use brnno_core::{ApplicationStatus, ProviderId};

use super::{Collection, Direction, DocumentStore, Query, RepositoryError, SortKey, to_fields};
use crate::models::ProviderApplication;
use crate::services::places::LatLng;

/// Repository for provider applications.
pub struct ProviderRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> ProviderRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Persist a submitted application.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store rejects the write.
    pub async fn create(
        &self,
        record: &ProviderApplicationRecord,
    ) -> Result<ProviderApplication, RepositoryError> {
        let doc = self
            .store
            .create(Collection::Providers, None, to_fields(record)?)
            .await?;
        doc.decode()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the application is
    /// malformed.
    pub async fn get(&self, id: &ProviderId) -> Result<Option<ProviderApplication>, RepositoryError> {
        self.store
            .get(Collection::Providers, id.as_str())
            .await?
            .map(|doc| doc.decode())
            .transpose()
    }

    /// Applications in a given review state, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or a document is
    /// malformed.
    pub async fn with_status(
        &self,
        status: ApplicationStatus,
    ) -> Result<Vec<ProviderApplication>, RepositoryError> {
        let query = Query::new()
            .filter("status", status.as_str())
            .order_by(SortKey::CreatedAt, Direction::Ascending);
        self.store
            .query(Collection::Providers, &query)
            .await?
            .iter()
            .map(super::Document::decode)
            .collect()
    }

    /// Record a review decision.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the application does not exist.
    pub async fn set_status(
        &self,
        id: &ProviderId,
        status: ApplicationStatus,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut fields = Map::new();
        fields.insert("status".to_owned(), Value::from(status.as_str()));
        fields.insert("reviewedAt".to_owned(), Value::from(at.to_rfc3339()));
        self.store
            .update(Collection::Providers, id.as_str(), fields)
            .await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the application does not exist.
    pub async fn set_payout_account(
        &self,
        id: &ProviderId,
        account_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut fields = Map::new();
        fields.insert("payoutAccountId".to_owned(), Value::from(account_id));
        self.store
            .update(Collection::Providers, id.as_str(), fields)
            .await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the application does not exist.
    pub async fn set_location(&self, id: &ProviderId, at: LatLng) -> Result<(), RepositoryError> {
        let mut fields = Map::new();
        fields.insert("location".to_owned(), serde_json::to_value(at).unwrap_or_default());
        self.store
            .update(Collection::Providers, id.as_str(), fields)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryDocumentStore;
    use brnno_core::UserId;
    use brnno_core::wizard::provider::ProviderApplicationDraft;

    #[tokio::test]
    async fn test_review_flow() {
        let store = MemoryDocumentStore::new();
        let providers = ProviderRepository::new(&store);
        let draft = ProviderApplicationDraft {
            business_name: Some("Shine Co".to_owned()),
            services: vec!["Full Detail".to_owned()],
            ..Default::default()
        };
        let created = providers
            .create(&ProviderApplicationRecord::new(&draft, UserId::new("u1")))
            .await
            .unwrap();
        assert_eq!(created.status(), ApplicationStatus::Pending);
        assert!(
            providers
                .with_status(ApplicationStatus::Approved)
                .await
                .unwrap()
                .is_empty()
        );

        providers
            .set_status(&created.id, ApplicationStatus::Approved, Utc::now())
            .await
            .unwrap();
        providers
            .set_location(&created.id, LatLng { lat: 40.2338, lng: -111.6585 })
            .await
            .unwrap();

        let approved = providers
            .with_status(ApplicationStatus::Approved)
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert!(approved[0].reviewed_at.is_some());
        assert_eq!(approved[0].location.map(|l| l.lat), Some(40.2338));
        assert_eq!(
            approved[0].record.application.business_name.as_deref(),
            Some("Shine Co")
        );
    }
}
