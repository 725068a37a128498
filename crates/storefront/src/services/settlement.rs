//! Payment settlement for submitted bookings.
//!
//! A submitted booking starts as `pending`/`pending`. Its ID is pushed onto
//! the [`SettlementQueue`]; the [`SettlementWorker`] waits the configured
//! delay, then drives the processor:
//!
//! 1. Create a payment intent for the total (reusing a stored one)
//! 2. Confirm it with the customer's payment method
//! 3. Mark the booking `paid`/`confirmed` with `paidAt`
//!
//! Failed attempts are retried with exponential backoff. After the last
//! attempt the booking is compensated to `paymentStatus = failed` and keeps
//! `status = pending`. Bookings no longer pending payment are skipped, so
//! re-enqueueing is harmless.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{Instrument, debug, error, info, info_span, warn};

use brnno_core::{BookingId, PaymentStatus};

use super::payments::{PaymentError, PaymentGateway, PaymentMetadata};
use crate::db::bookings::BookingRepository;
use crate::db::{DocumentStore, RepositoryError};
use crate::models::Booking;

/// Errors from the settlement queue and jobs.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("settlement queue is closed")]
    QueueClosed,

    #[error("payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Timing and retry policy.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Wait between enqueue and the first attempt.
    pub delay: Duration,
    /// Attempts before the booking is marked failed. At least 1.
    pub max_attempts: u32,
    /// Wait after the first failure; doubles per failure.
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            max_attempts: 5,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl SettlementConfig {
    /// Wait after failed attempt number `attempt` (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// How a settlement job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    Paid,
    /// Every attempt failed; the booking was marked `failed`.
    Failed,
    /// The booking was missing or no longer pending payment.
    Skipped,
}

enum Message {
    Settle(BookingId),
    Close,
}

/// Sending half: hands booking IDs to the worker.
#[derive(Clone)]
pub struct SettlementQueue {
    tx: mpsc::UnboundedSender<Message>,
}

impl SettlementQueue {
    /// Schedule settlement for a booking.
    ///
    /// # Errors
    ///
    /// Returns `SettlementError::QueueClosed` once the worker has stopped.
    pub fn enqueue(&self, booking: BookingId) -> Result<(), SettlementError> {
        self.tx
            .send(Message::Settle(booking))
            .map_err(|_| SettlementError::QueueClosed)
    }

    /// Stop accepting jobs. The worker finishes in-flight jobs, then exits.
    pub fn close(&self) {
        if self.tx.send(Message::Close).is_err() {
            debug!("settlement worker already stopped");
        }
    }
}

/// Receiving half: runs jobs concurrently until the queue is closed.
pub struct SettlementWorker {
    rx: mpsc::UnboundedReceiver<Message>,
    job: Job,
}

#[derive(Clone)]
struct Job {
    store: Arc<dyn DocumentStore>,
    payments: Arc<dyn PaymentGateway>,
    config: SettlementConfig,
}

/// Create a connected queue and worker.
#[must_use]
pub fn channel(
    store: Arc<dyn DocumentStore>,
    payments: Arc<dyn PaymentGateway>,
    config: SettlementConfig,
) -> (SettlementQueue, SettlementWorker) {
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = SettlementWorker {
        rx,
        job: Job {
            store,
            payments,
            config,
        },
    };
    (SettlementQueue { tx }, worker)
}

impl SettlementWorker {
    /// Run the worker on the current runtime.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process jobs until [`SettlementQueue::close`] is called or every
    /// queue handle is dropped, then drain in-flight jobs.
    pub async fn run(mut self) {
        let mut jobs = JoinSet::new();

        loop {
            tokio::select! {
                message = self.rx.recv() => match message {
                    Some(Message::Settle(booking)) => {
                        let job = self.job.clone();
                        let span = info_span!("settlement", booking_id = %booking);
                        jobs.spawn(async move { job.run(&booking).await }.instrument(span));
                    }
                    Some(Message::Close) | None => break,
                },
                Some(joined) = jobs.join_next(), if !jobs.is_empty() => log_join(joined),
            }
        }

        if !jobs.is_empty() {
            info!(in_flight = jobs.len(), "draining settlement jobs");
        }
        while let Some(joined) = jobs.join_next().await {
            log_join(joined);
        }
        info!("settlement worker stopped");
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "settlement job panicked");
    }
}

impl Job {
    async fn run(&self, booking: &BookingId) {
        match settle(
            self.store.as_ref(),
            self.payments.as_ref(),
            &self.config,
            booking,
        )
        .await
        {
            Ok(outcome) => debug!(?outcome, "settlement finished"),
            Err(e) => error!(error = %e, "settlement could not record its outcome"),
        }
    }
}

/// Settle one booking: wait, attempt payment with retries, record the result.
///
/// Store and processor failures share one retry budget. A declined card
/// fails the booking at once. Writing the outcome is retried separately, so
/// a confirmed charge is never compensated to `failed`.
///
/// # Errors
///
/// Returns an error only if the final outcome cannot be written.
pub async fn settle(
    store: &dyn DocumentStore,
    payments: &dyn PaymentGateway,
    config: &SettlementConfig,
    id: &BookingId,
) -> Result<SettlementOutcome, SettlementError> {
    let bookings = BookingRepository::new(store);
    tokio::time::sleep(config.delay).await;

    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    let booking = loop {
        match attempt_payment(&bookings, payments, id).await {
            Ok(Some(booking)) => break booking,
            Ok(None) => return Ok(SettlementOutcome::Skipped),
            Err(SettlementError::Payment(PaymentError::Declined(reason))) => {
                warn!(attempt, reason = %reason, "payment declined");
                return compensate(&bookings, config, id).await;
            }
            Err(e) if attempt < max_attempts => {
                let wait = config.backoff(attempt);
                warn!(attempt, error = %e, retry_in = ?wait, "settlement attempt failed");
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(attempt, error = %e, "final settlement attempt failed");
                return compensate(&bookings, config, id).await;
            }
        }
    };

    let paid_at = Utc::now();
    let repo = &bookings;
    let recorded = with_retries(config, "record payment", move || repo.mark_paid(id, paid_at)).await;
    if let Err(e) = recorded {
        error!(
            error = %e,
            payment_intent_id = booking.payment_intent_id.as_deref().unwrap_or_default(),
            "payment captured but booking not marked paid"
        );
        return Err(e.into());
    }
    info!(attempt, amount = %booking.record.total_amount, "booking paid");
    Ok(SettlementOutcome::Paid)
}

/// Mark the booking's payment failed; its status stays `pending`.
async fn compensate(
    bookings: &BookingRepository<'_>,
    config: &SettlementConfig,
    id: &BookingId,
) -> Result<SettlementOutcome, SettlementError> {
    with_retries(config, "record payment failure", move || {
        bookings.mark_payment_failed(id)
    })
    .await?;
    error!("booking payment failed");
    Ok(SettlementOutcome::Failed)
}

/// Run a store write, retrying transient failures with the settlement
/// backoff.
async fn with_retries<F, Fut>(
    config: &SettlementConfig,
    what: &'static str,
    mut write: F,
) -> Result<(), RepositoryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), RepositoryError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match write().await {
            Ok(()) => return Ok(()),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let wait = config.backoff(attempt);
                warn!(attempt, error = %e, retry_in = ?wait, "{what} failed");
                tokio::time::sleep(wait).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// One payment attempt. `None` when there is nothing left to settle.
async fn attempt_payment(
    bookings: &BookingRepository<'_>,
    payments: &dyn PaymentGateway,
    id: &BookingId,
) -> Result<Option<Booking>, SettlementError> {
    let Some(mut booking) = bookings.get(id).await? else {
        warn!("booking disappeared before settlement");
        return Ok(None);
    };
    if booking.record.payment_status != PaymentStatus::Pending {
        debug!(payment_status = %booking.record.payment_status, "booking already settled");
        return Ok(None);
    }

    let intent_id = if let Some(existing) = &booking.payment_intent_id {
        existing.clone()
    } else {
        let mut metadata = PaymentMetadata::new();
        metadata.insert("bookingId".to_owned(), booking.id.to_string());
        metadata.insert("customerId".to_owned(), booking.record.customer_id.to_string());
        if let Some(provider) = &booking.record.provider_id {
            metadata.insert("providerId".to_owned(), provider.to_string());
        }

        let intent = payments
            .create_payment_intent(booking.record.total_amount, &metadata)
            .await?;
        bookings.set_payment_intent(&booking.id, &intent.id).await?;
        booking.payment_intent_id = Some(intent.id.clone());
        intent.id
    };

    let confirmed = payments
        .confirm_payment(&intent_id, booking.record.payment_method_id.as_deref())
        .await?;
    if confirmed.succeeded() {
        Ok(Some(booking))
    } else {
        Err(PaymentError::Api {
            status: 402,
            message: format!("intent {intent_id} is {}", confirmed.status),
        }
        .into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use brnno_core::wizard::booking::{BookingRecord, ServiceSnapshot, Vehicle};
    use brnno_core::{Amount, BookingStatus, ServiceId, UserId};
    use chrono::NaiveDate;

    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use serde_json::{Map, Value};

    use super::*;
    use crate::db::{Collection, Document, MemoryDocumentStore, Query};
    use crate::services::payments::SimulatedPayments;

    /// Memory store whose reads, or writes of `paidAt`, fail a set number of
    /// times.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryDocumentStore,
        failing_gets: AtomicU32,
        failing_paid_writes: AtomicU32,
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn unavailable() -> RepositoryError {
        RepositoryError::Database(sqlx::Error::PoolTimedOut)
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn create(
            &self,
            collection: Collection,
            id: Option<&str>,
            data: Map<String, Value>,
        ) -> Result<Document, RepositoryError> {
            self.inner.create(collection, id, data).await
        }

        async fn get(
            &self,
            collection: Collection,
            id: &str,
        ) -> Result<Option<Document>, RepositoryError> {
            if take(&self.failing_gets) {
                return Err(unavailable());
            }
            self.inner.get(collection, id).await
        }

        async fn query(
            &self,
            collection: Collection,
            query: &Query,
        ) -> Result<Vec<Document>, RepositoryError> {
            self.inner.query(collection, query).await
        }

        async fn update(
            &self,
            collection: Collection,
            id: &str,
            partial: Map<String, Value>,
        ) -> Result<(), RepositoryError> {
            if partial.contains_key("paidAt") && take(&self.failing_paid_writes) {
                return Err(unavailable());
            }
            self.inner.update(collection, id, partial).await
        }

        async fn increment(
            &self,
            collection: Collection,
            id: &str,
            field: &str,
            by: i64,
        ) -> Result<(), RepositoryError> {
            self.inner.increment(collection, id, field, by).await
        }

        async fn delete(&self, collection: Collection, id: &str) -> Result<(), RepositoryError> {
            self.inner.delete(collection, id).await
        }

        async fn ping(&self) -> Result<(), RepositoryError> {
            self.inner.ping().await
        }
    }

    fn record() -> BookingRecord {
        BookingRecord {
            customer_id: UserId::new("cust"),
            customer_email: "c@example.com".to_owned(),
            customer_name: "C".to_owned(),
            provider_id: None,
            provider_name: None,
            service: ServiceSnapshot {
                id: ServiceId::new("3"),
                name: "Exterior Detail".to_owned(),
                price: Amount::new(150),
                duration: "2.5 hours".to_owned(),
            },
            date: NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(),
            time: "10:00 AM".to_owned(),
            vehicle: Vehicle {
                id: None,
                make: "Tesla".to_owned(),
                model: "Model 3".to_owned(),
                year: "2023".to_owned(),
            },
            address: "1 Center St, Provo, UT".to_owned(),
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            total_amount: Amount::new(150),
            platform_fee: Amount::new(23),
            provider_amount: Amount::new(128),
            payment_method_id: Some("pm_card_visa".to_owned()),
        }
    }

    fn config(max_attempts: u32) -> SettlementConfig {
        SettlementConfig {
            max_attempts,
            ..SettlementConfig::default()
        }
    }

    async fn booking(store: &dyn DocumentStore) -> BookingId {
        BookingRepository::new(store)
            .create(&record())
            .await
            .unwrap()
            .id
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = SettlementConfig::default();
        assert_eq!(config.backoff(1), Duration::from_millis(500));
        assert_eq!(config.backoff(2), Duration::from_secs(1));
        assert_eq!(config.backoff(3), Duration::from_secs(2));
        assert_eq!(config.backoff(20), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_marks_paid() {
        let store = MemoryDocumentStore::new();
        let payments = SimulatedPayments::new();
        let id = booking(&store).await;

        let outcome = settle(&store, &payments, &config(5), &id).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::Paid);

        let stored = BookingRepository::new(&store).get(&id).await.unwrap().unwrap();
        assert_eq!(stored.record.payment_status, PaymentStatus::Paid);
        assert_eq!(stored.record.status, BookingStatus::Confirmed);
        assert!(stored.paid_at.is_some());
        assert!(stored.payment_intent_id.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_retries_then_succeeds() {
        let store = MemoryDocumentStore::new();
        let payments = SimulatedPayments::new();
        payments.fail_next(2);
        let id = booking(&store).await;

        let started = tokio::time::Instant::now();
        let outcome = settle(&store, &payments, &config(5), &id).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::Paid);
        assert_eq!(payments.confirmations(), 1);
        // delay + 500ms + 1s
        assert!(started.elapsed() >= Duration::from_millis(3500));

        // The intent created on the first attempt is reused.
        let stored = BookingRepository::new(&store).get(&id).await.unwrap().unwrap();
        assert_eq!(stored.payment_intent_id.as_deref(), Some("pi_sim_000001"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_compensates_after_last_attempt() {
        let store = MemoryDocumentStore::new();
        let payments = SimulatedPayments::new();
        payments.fail_next(10);
        let id = booking(&store).await;

        let outcome = settle(&store, &payments, &config(3), &id).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::Failed);

        let stored = BookingRepository::new(&store).get(&id).await.unwrap().unwrap();
        assert_eq!(stored.record.payment_status, PaymentStatus::Failed);
        assert_eq!(stored.record.status, BookingStatus::Pending);
        assert!(stored.paid_at.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_retries_transient_read_failure() {
        let store = FlakyStore::default();
        let payments = SimulatedPayments::new();
        let id = booking(&store).await;
        store.failing_gets.store(1, Ordering::SeqCst);

        let outcome = settle(&store, &payments, &config(5), &id).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::Paid);
        assert_eq!(payments.confirmations(), 1);

        let stored = BookingRepository::new(&store).get(&id).await.unwrap().unwrap();
        assert_eq!(stored.record.payment_status, PaymentStatus::Paid);
        assert_eq!(stored.record.status, BookingStatus::Confirmed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_compensates_when_store_stays_down() {
        let store = FlakyStore::default();
        let payments = SimulatedPayments::new();
        let id = booking(&store).await;
        store.failing_gets.store(3, Ordering::SeqCst);

        let outcome = settle(&store, &payments, &config(3), &id).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::Failed);
        assert_eq!(payments.confirmations(), 0);

        let stored = BookingRepository::new(&store).get(&id).await.unwrap().unwrap();
        assert_eq!(stored.record.payment_status, PaymentStatus::Failed);
        assert_eq!(stored.record.status, BookingStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_retries_paid_write_without_charging_again() {
        let store = FlakyStore::default();
        let payments = SimulatedPayments::new();
        let id = booking(&store).await;
        store.failing_paid_writes.store(2, Ordering::SeqCst);

        let outcome = settle(&store, &payments, &config(5), &id).await.unwrap();
        assert_eq!(outcome, SettlementOutcome::Paid);
        assert_eq!(payments.confirmations(), 1);

        let stored = BookingRepository::new(&store).get(&id).await.unwrap().unwrap();
        assert_eq!(stored.record.payment_status, PaymentStatus::Paid);
        assert!(stored.paid_at.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_never_fails_a_captured_payment() {
        let store = FlakyStore::default();
        let payments = SimulatedPayments::new();
        let id = booking(&store).await;
        store.failing_paid_writes.store(10, Ordering::SeqCst);

        let result = settle(&store, &payments, &config(3), &id).await;
        assert!(matches!(
            result,
            Err(SettlementError::Repository(RepositoryError::Database(_)))
        ));
        assert_eq!(payments.confirmations(), 1);

        let stored = BookingRepository::new(&store).get(&id).await.unwrap().unwrap();
        assert_eq!(stored.record.payment_status, PaymentStatus::Pending);
        assert!(stored.payment_intent_id.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_skips_settled_and_missing() {
        let store = MemoryDocumentStore::new();
        let payments = SimulatedPayments::new();
        let id = booking(&store).await;

        settle(&store, &payments, &config(5), &id).await.unwrap();
        let again = settle(&store, &payments, &config(5), &id).await.unwrap();
        assert_eq!(again, SettlementOutcome::Skipped);
        assert_eq!(payments.confirmations(), 1);

        let missing = settle(&store, &payments, &config(5), &BookingId::new("nope"))
            .await
            .unwrap();
        assert_eq!(missing, SettlementOutcome::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_drains_on_close() {
        let store = Arc::new(MemoryDocumentStore::new());
        let payments = Arc::new(SimulatedPayments::new());
        let first = booking(store.as_ref()).await;
        let second = booking(store.as_ref()).await;

        let (queue, worker) = channel(store.clone(), payments.clone(), config(5));
        let handle = worker.spawn();
        queue.enqueue(first.clone()).unwrap();
        queue.enqueue(second.clone()).unwrap();
        queue.close();
        handle.await.unwrap();

        let bookings = BookingRepository::new(store.as_ref());
        for id in [first, second] {
            let stored = bookings.get(&id).await.unwrap().unwrap();
            assert_eq!(stored.record.payment_status, PaymentStatus::Paid);
        }
        assert!(matches!(
            queue.enqueue(BookingId::new("late")),
            Err(SettlementError::QueueClosed)
        ));
    }
}
