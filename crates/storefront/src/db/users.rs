//! User profile repository.
//!
//! Profiles are keyed by the identity provider's uid.

use serde_json::{Map, Value};

use brnno_core::{AccountType, ProviderId, Role, UserId};

use super::{Collection, DocumentStore, RepositoryError, to_fields};
use crate::models::{ProfileUpdate, UserProfile, UserProfileRecord};

/// Repository for user profiles.
pub struct UserRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Get a profile by uid.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored profile is
    /// malformed.
    pub async fn get(&self, uid: &UserId) -> Result<Option<UserProfile>, RepositoryError> {
        self.store
            .get(Collection::Users, uid.as_str())
            .await?
            .map(|doc| doc.decode())
            .transpose()
    }

    /// Create a profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the uid already has a profile.
    pub async fn create(&self, record: &UserProfileRecord) -> Result<UserProfile, RepositoryError> {
        let doc = self
            .store
            .create(Collection::Users, Some(record.uid.as_str()), to_fields(record)?)
            .await?;
        doc.decode()
    }

    /// Apply a user's own edits.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    pub async fn update_profile(
        &self,
        uid: &UserId,
        update: &ProfileUpdate,
    ) -> Result<(), RepositoryError> {
        self.store
            .update(Collection::Users, uid.as_str(), to_fields(update)?)
            .await
    }

    /// Change a user's permission level.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    pub async fn set_role(&self, uid: &UserId, role: Role) -> Result<(), RepositoryError> {
        let mut fields = Map::new();
        fields.insert("role".to_owned(), Value::from(role.as_str()));
        self.store
            .update(Collection::Users, uid.as_str(), fields)
            .await
    }

    /// Record that a user has applied to be a provider.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    pub async fn mark_provider(
        &self,
        uid: &UserId,
        application_id: &ProviderId,
        business_name: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut fields = Map::new();
        fields.insert(
            "accountType".to_owned(),
            Value::from(AccountType::Provider.as_str()),
        );
        fields.insert(
            "providerApplicationId".to_owned(),
            Value::from(application_id.as_str()),
        );
        if let Some(name) = business_name {
            fields.insert("businessName".to_owned(), Value::from(name));
        }
        self.store
            .update(Collection::Users, uid.as_str(), fields)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryDocumentStore;

    #[tokio::test]
    async fn test_profile_lifecycle() {
        let store = MemoryDocumentStore::new();
        let users = UserRepository::new(&store);
        let uid = UserId::new("uid-42");

        assert!(users.get(&uid).await.unwrap().is_none());

        let record = UserProfileRecord::customer(uid.clone(), "a@b.co".to_owned(), None);
        let created = users.create(&record).await.unwrap();
        assert_eq!(created.record, record);

        users
            .mark_provider(&uid, &ProviderId::new("app-1"), Some("Shine Co"))
            .await
            .unwrap();
        users.set_role(&uid, Role::Admin).await.unwrap();

        let profile = users.get(&uid).await.unwrap().unwrap();
        assert_eq!(profile.record.account_type, AccountType::Provider);
        assert_eq!(profile.record.role, Role::Admin);
        assert_eq!(
            profile.record.provider_application_id,
            Some(ProviderId::new("app-1"))
        );
        assert_eq!(profile.record.business_name.as_deref(), Some("Shine Co"));
    }

    #[tokio::test]
    async fn test_update_profile_keeps_other_fields() {
        let store = MemoryDocumentStore::new();
        let users = UserRepository::new(&store);
        let uid = UserId::new("uid-7");
        users
            .create(&UserProfileRecord::customer(
                uid.clone(),
                "x@y.co".to_owned(),
                Some("X".to_owned()),
            ))
            .await
            .unwrap();

        users
            .update_profile(
                &uid,
                &ProfileUpdate {
                    phone: Some("555".to_owned()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let profile = users.get(&uid).await.unwrap().unwrap();
        assert_eq!(profile.record.phone.as_deref(), Some("555"));
        assert_eq!(profile.record.display_name.as_deref(), Some("X"));
    }
}
