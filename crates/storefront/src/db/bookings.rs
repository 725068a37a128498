//! Booking repository.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use brnno_core::wizard::booking::BookingRecord;
use brnno_core::{BookingId, BookingStatus, PaymentStatus, ProviderId, UserId};

use super::{Collection, Direction, DocumentStore, Query, RepositoryError, SortKey, to_fields};
use crate::models::Booking;

/// Repository for bookings.
pub struct BookingRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> BookingRepository<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    /// Persist a submitted booking.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the store rejects the write.
    pub async fn create(&self, record: &BookingRecord) -> Result<Booking, RepositoryError> {
        let doc = self
            .store
            .create(Collection::Bookings, None, to_fields(record)?)
            .await?;
        doc.decode()
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the booking is malformed.
    pub async fn get(&self, id: &BookingId) -> Result<Option<Booking>, RepositoryError> {
        self.store
            .get(Collection::Bookings, id.as_str())
            .await?
            .map(|doc| doc.decode())
            .transpose()
    }

    /// Bookings assigned to a provider, by service date.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or a booking is malformed.
    pub async fn for_provider(&self, provider: &ProviderId) -> Result<Vec<Booking>, RepositoryError> {
        let query = Query::new()
            .filter("providerId", provider.as_str())
            .order_by(SortKey::Field("date".to_owned()), Direction::Ascending);
        self.list(&query).await
    }

    /// A customer's bookings, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the query fails or a booking is malformed.
    pub async fn for_customer(&self, customer: &UserId) -> Result<Vec<Booking>, RepositoryError> {
        let query = Query::new()
            .filter("customerId", customer.as_str())
            .order_by(SortKey::CreatedAt, Direction::Descending);
        self.list(&query).await
    }

    /// Remember the processor intent created for a booking.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the booking no longer exists.
    pub async fn set_payment_intent(
        &self,
        id: &BookingId,
        intent_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut fields = Map::new();
        fields.insert("paymentIntentId".to_owned(), Value::from(intent_id));
        self.store
            .update(Collection::Bookings, id.as_str(), fields)
            .await
    }

    /// Settlement succeeded: paid and confirmed. Already-paid bookings are
    /// left as they are.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the booking no longer exists and
    /// `RepositoryError::Conflict` if its status cannot move to `confirmed`.
    pub async fn mark_paid(&self, id: &BookingId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let current = self.get(id).await?.ok_or(RepositoryError::NotFound)?;
        if current.record.payment_status == PaymentStatus::Paid {
            return Ok(());
        }
        if !current
            .record
            .status
            .can_transition_to(BookingStatus::Confirmed)
        {
            return Err(RepositoryError::Conflict(format!(
                "booking {id} is {} and cannot be confirmed",
                current.record.status
            )));
        }

        let mut fields = Map::new();
        fields.insert(
            "paymentStatus".to_owned(),
            Value::from(PaymentStatus::Paid.as_str()),
        );
        fields.insert(
            "status".to_owned(),
            Value::from(BookingStatus::Confirmed.as_str()),
        );
        fields.insert("paidAt".to_owned(), Value::from(at.to_rfc3339()));
        self.store
            .update(Collection::Bookings, id.as_str(), fields)
            .await
    }

    /// Settlement gave up. The booking stays pending.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the booking no longer exists.
    pub async fn mark_payment_failed(&self, id: &BookingId) -> Result<(), RepositoryError> {
        let mut fields = Map::new();
        fields.insert(
            "paymentStatus".to_owned(),
            Value::from(PaymentStatus::Failed.as_str()),
        );
        self.store
            .update(Collection::Bookings, id.as_str(), fields)
            .await
    }

    async fn list(&self, query: &Query) -> Result<Vec<Booking>, RepositoryError> {
        self.store
            .query(Collection::Bookings, query)
            .await?
            .iter()
            .map(super::Document::decode)
            .collect()
    }
}
