//! Waitlist repository.

use serde_json::Value;

use brnno_core::{Email, WaitlistEntryId};

use super::{Collection, Direction, DocumentStore, Query, RepositoryError, SortKey, to_fields};
use crate::models::{NewWaitlistEntry, WaitlistEntry};

/// Repository for waitlist signups.
pub struct WaitlistRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> WaitlistRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Store a new signup.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store rejects the write.
    pub async fn create(&self, entry: &NewWaitlistEntry) -> Result<WaitlistEntry, RepositoryError> {
        let doc = self
            .store
            .create(Collection::Waitlist, None, to_fields(entry)?)
            .await?;
        doc.decode()
    }

    /// All signups, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if any stored signup is
    /// malformed.
    pub async fn list(&self) -> Result<Vec<WaitlistEntry>, RepositoryError> {
        let query = Query::new().order_by(SortKey::CreatedAt, Direction::Ascending);
        self.store
            .query(Collection::Waitlist, &query)
            .await?
            .iter()
            .map(super::Document::decode)
            .collect()
    }

    /// Number of signups.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store query fails.
    pub async fn count(&self) -> Result<usize, RepositoryError> {
        Ok(self
            .store
            .query(Collection::Waitlist, &Query::new())
            .await?
            .len())
    }

    /// Find the signup that owns a referral code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store query fails or the document is
    /// malformed.
    pub async fn find_by_referral_code(
        &self,
        code: &str,
    ) -> Result<Option<WaitlistEntry>, RepositoryError> {
        self.find_one("referralCode", Value::from(code)).await
    }

    /// Find a signup by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store query fails or the document is
    /// malformed.
    pub async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<WaitlistEntry>, RepositoryError> {
        self.find_one("email", Value::from(email.as_str())).await
    }

    /// Add one to a signup's referral count.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the signup no longer exists.
    pub async fn increment_referrals(&self, id: &WaitlistEntryId) -> Result<(), RepositoryError> {
        self.store
            .increment(Collection::Waitlist, id.as_str(), "referralCount", 1)
            .await
    }

    async fn find_one(
        &self,
        field: &str,
        value: Value,
    ) -> Result<Option<WaitlistEntry>, RepositoryError> {
        let query = Query::new().filter(field, value).limit(1);
        self.store
            .query(Collection::Waitlist, &query)
            .await?
            .first()
            .map(super::Document::decode)
            .transpose()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryDocumentStore;
    use brnno_core::WaitlistStatus;

    fn signup(email: &str, code: &str) -> NewWaitlistEntry {
        NewWaitlistEntry {
            name: "Sam".to_owned(),
            email: Email::parse(email).unwrap(),
            phone: None,
            city: Some("Provo".to_owned()),
            zip_code: Some("84601".to_owned()),
            vehicle_type: None,
            services_interested: vec!["Full Detail".to_owned()],
            how_soon: None,
            status: WaitlistStatus::Pending,
            referral_code: code.to_owned(),
            referred_by: None,
            referral_count: 0,
        }
    }

    #[tokio::test]
    async fn test_referral_lookup_and_increment() {
        let store = MemoryDocumentStore::new();
        let waitlist = WaitlistRepository::new(&store);

        let first = waitlist
            .create(&signup("sam@example.com", "samab12"))
            .await
            .unwrap();
        waitlist
            .create(&signup("kim@example.com", "kimzz99"))
            .await
            .unwrap();

        let owner = waitlist
            .find_by_referral_code("samab12")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(owner.id, first.id);
        waitlist.increment_referrals(&owner.id).await.unwrap();

        let reloaded = waitlist
            .find_by_email(&Email::parse("SAM@example.com").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reloaded.entry.referral_count, 1);
        assert_eq!(waitlist.count().await.unwrap(), 2);
        assert!(
            waitlist
                .find_by_referral_code("nobody")
                .await
                .unwrap()
                .is_none()
        );
    }
}
