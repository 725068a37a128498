//! Payment processor gateway.
//!
//! Card capture and tokenization stay in the browser; the server only sees
//! an opaque payment method ID and drives the intent lifecycle:
//!
//! 1. `create_payment_intent` for the booking total
//! 2. `confirm_payment` with the customer's payment method
//!
//! Providers get a connected payout account when they are approved.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use brnno_core::Amount;

/// Processor API base URL.
const STRIPE_BASE_URL: &str = "https://api.stripe.com";

/// Settlement currency.
pub const CURRENCY: &str = "usd";

/// Errors that can occur when talking to the payment processor.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The card was declined.
    #[error("payment declined: {0}")]
    Declined(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The intent is not in a state that can be confirmed.
    #[error("payment intent {0} cannot be confirmed")]
    InvalidIntent(String),
}

/// A processor payment intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    /// Amount in cents.
    pub amount: u64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub client_secret: Option<String>,
}

impl PaymentIntent {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

/// A provider's connected payout account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedAccount {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Metadata attached to an intent for reconciliation.
pub type PaymentMetadata = HashMap<String, String>;

/// Payment processor operations used by the marketplace.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create an intent for `amount` (whole dollars).
    async fn create_payment_intent(
        &self,
        amount: Amount,
        metadata: &PaymentMetadata,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Confirm an intent, optionally attaching a payment method.
    async fn confirm_payment(
        &self,
        intent_id: &str,
        payment_method_id: Option<&str>,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Create a payout account for a provider.
    async fn create_connected_account(&self, email: &str)
    -> Result<ConnectedAccount, PaymentError>;
}

// =============================================================================
// Stripe
// =============================================================================

/// Stripe REST client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    secret_key: SecretString,
    base_url: String,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl StripeClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(secret_key: SecretString) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            secret_key,
            base_url: STRIPE_BASE_URL.to_owned(),
        })
    }

    async fn post_form<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<T, PaymentError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(self.secret_key.expose_secret())
            .form(form)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<StripeErrorBody>(&body).ok();
            let message = detail
                .as_ref()
                .and_then(|d| d.error.message.clone())
                .unwrap_or(body);
            let is_card_error = detail
                .as_ref()
                .and_then(|d| d.error.kind.as_deref())
                .is_some_and(|k| k == "card_error");

            return Err(if is_card_error || status.as_u16() == 402 {
                PaymentError::Declined(message)
            } else {
                PaymentError::Api {
                    status: status.as_u16(),
                    message,
                }
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl PaymentGateway for StripeClient {
    #[instrument(skip(self, metadata), fields(amount = %amount))]
    async fn create_payment_intent(
        &self,
        amount: Amount,
        metadata: &PaymentMetadata,
    ) -> Result<PaymentIntent, PaymentError> {
        let mut form = vec![
            ("amount".to_owned(), amount.cents().to_string()),
            ("currency".to_owned(), CURRENCY.to_owned()),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{key}]"), value.clone()));
        }
        self.post_form("/v1/payment_intents", &form).await
    }

    #[instrument(skip(self, payment_method_id))]
    async fn confirm_payment(
        &self,
        intent_id: &str,
        payment_method_id: Option<&str>,
    ) -> Result<PaymentIntent, PaymentError> {
        let mut form = Vec::new();
        if let Some(method) = payment_method_id {
            form.push(("payment_method".to_owned(), method.to_owned()));
        }
        self.post_form(&format!("/v1/payment_intents/{intent_id}/confirm"), &form)
            .await
    }

    #[instrument(skip(self, email))]
    async fn create_connected_account(
        &self,
        email: &str,
    ) -> Result<ConnectedAccount, PaymentError> {
        let form = vec![
            ("type".to_owned(), "express".to_owned()),
            ("email".to_owned(), email.to_owned()),
            ("capabilities[transfers][requested]".to_owned(), "true".to_owned()),
        ];
        self.post_form("/v1/accounts", &form).await
    }
}

// =============================================================================
// Simulated
// =============================================================================

/// In-process processor for development and tests.
///
/// Every call succeeds unless failures have been queued with
/// [`SimulatedPayments::fail_next`].
#[derive(Clone, Default)]
pub struct SimulatedPayments {
    inner: Arc<SimulatedInner>,
}

#[derive(Default)]
struct SimulatedInner {
    next_id: AtomicU64,
    pending_failures: AtomicU32,
    confirmations: AtomicU32,
}

impl SimulatedPayments {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` confirmations fail.
    pub fn fail_next(&self, n: u32) {
        self.inner.pending_failures.store(n, Ordering::SeqCst);
    }

    /// Number of successful confirmations so far.
    #[must_use]
    pub fn confirmations(&self) -> u32 {
        self.inner.confirmations.load(Ordering::SeqCst)
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}_sim_{n:06}")
    }

    fn take_failure(&self) -> bool {
        self.inner
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPayments {
    async fn create_payment_intent(
        &self,
        amount: Amount,
        _metadata: &PaymentMetadata,
    ) -> Result<PaymentIntent, PaymentError> {
        let id = self.next_id("pi");
        Ok(PaymentIntent {
            client_secret: Some(format!("{id}_secret")),
            id,
            amount: amount.cents(),
            currency: CURRENCY.to_owned(),
            status: "requires_confirmation".to_owned(),
        })
    }

    async fn confirm_payment(
        &self,
        intent_id: &str,
        _payment_method_id: Option<&str>,
    ) -> Result<PaymentIntent, PaymentError> {
        if self.take_failure() {
            return Err(PaymentError::Api {
                status: 503,
                message: "simulated outage".to_owned(),
            });
        }
        if !intent_id.starts_with("pi_") {
            return Err(PaymentError::InvalidIntent(intent_id.to_owned()));
        }
        self.inner.confirmations.fetch_add(1, Ordering::SeqCst);
        Ok(PaymentIntent {
            id: intent_id.to_owned(),
            amount: 0,
            currency: CURRENCY.to_owned(),
            status: "succeeded".to_owned(),
            client_secret: None,
        })
    }

    async fn create_connected_account(
        &self,
        email: &str,
    ) -> Result<ConnectedAccount, PaymentError> {
        Ok(ConnectedAccount {
            id: self.next_id("acct"),
            email: Some(email.to_owned()),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_simulated_intent_in_cents() {
        let payments = SimulatedPayments::new();
        let intent = payments
            .create_payment_intent(Amount::new(150), &PaymentMetadata::new())
            .await
            .unwrap();
        assert_eq!(intent.amount, 15_000);
        assert!(intent.id.starts_with("pi_"));
        assert!(!intent.succeeded());

        let confirmed = payments.confirm_payment(&intent.id, None).await.unwrap();
        assert!(confirmed.succeeded());
        assert_eq!(payments.confirmations(), 1);
    }

    #[tokio::test]
    async fn test_simulated_failures_are_consumed() {
        let payments = SimulatedPayments::new();
        payments.fail_next(2);
        assert!(payments.confirm_payment("pi_x", None).await.is_err());
        assert!(payments.confirm_payment("pi_x", None).await.is_err());
        assert!(payments.confirm_payment("pi_x", None).await.is_ok());
    }

    #[tokio::test]
    async fn test_simulated_rejects_unknown_intent() {
        let payments = SimulatedPayments::new();
        let err = payments.confirm_payment("bogus", None).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidIntent(_)));
    }

    #[test]
    fn test_stripe_error_body_parses() {
        let body = r#"{"error":{"message":"Your card was declined.","type":"card_error"}}"#;
        let parsed: StripeErrorBody = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.kind.as_deref(), Some("card_error"));
    }
}
