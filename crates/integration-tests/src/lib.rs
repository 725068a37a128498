//! End-to-end tests for the BRNNO marketplace API.
//!
//! Each test starts the real router on an ephemeral port with an in-memory
//! store, local accounts and simulated payments, then talks to it over HTTP
//! with a cookie-keeping client, the way a browser would.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p brnno-integration-tests
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use brnno_core::{FeeMode, Role, UserId};
use brnno_storefront::config::{IntegrationsConfig, StorefrontConfig};
use brnno_storefront::db::{
    Collection, Document, DocumentStore, MemoryDocumentStore, Query, RepositoryError,
};
use brnno_storefront::db::users::UserRepository;
use brnno_storefront::routes::build_app;
use brnno_storefront::services::payments::SimulatedPayments;
use brnno_storefront::services::settlement::SettlementConfig;
use brnno_storefront::state::{AppState, Services};

/// In-memory store that can be told to refuse new bookings, as a database
/// outage would.
#[derive(Default)]
pub struct SwitchableStore {
    inner: MemoryDocumentStore,
    bookings_down: AtomicBool,
}

impl SwitchableStore {
    /// Make booking writes fail (`true`) or succeed again (`false`).
    pub fn set_bookings_down(&self, down: bool) {
        self.bookings_down.store(down, Ordering::SeqCst);
    }

    fn check(&self, collection: Collection) -> Result<(), RepositoryError> {
        if collection == Collection::Bookings && self.bookings_down.load(Ordering::SeqCst) {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SwitchableStore {
    async fn create(
        &self,
        collection: Collection,
        id: Option<&str>,
        data: Map<String, Value>,
    ) -> Result<Document, RepositoryError> {
        self.check(collection)?;
        self.inner.create(collection, id, data).await
    }

    async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, RepositoryError> {
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
        self.check(collection)?;
        self.inner.update(collection, id, partial).await
    }

    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        by: i64,
    ) -> Result<(), RepositoryError> {
        self.check(collection)?;
        self.inner.increment(collection, id, field, by).await
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), RepositoryError> {
        self.check(collection)?;
        self.inner.delete(collection, id).await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.inner.ping().await
    }
}

/// A running server and handles for steering it.
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    pub payments: SimulatedPayments,
    pub store: Arc<SwitchableStore>,
    server: JoinHandle<()>,
    worker: JoinHandle<()>,
}

/// Configuration for tests: no rate limits, fast settlement.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: None,
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://127.0.0.1".to_owned(),
        session_secret: SecretString::from("x".repeat(32)),
        fee_mode: FeeMode::Independent,
        rate_limit: false,
        integrations: IntegrationsConfig::default(),
        settlement: SettlementConfig {
            delay: Duration::from_millis(20),
            max_attempts: 3,
            base_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
        },
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 0.0,
        sentry_traces_sample_rate: 0.0,
    }
}

impl TestServer {
    /// Start a server with [`test_config`].
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        Self::start_with(test_config()).await
    }

    /// Start a server with `config`.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start_with(config: StorefrontConfig) -> Self {
        let payments = SimulatedPayments::new();
        let store = Arc::new(SwitchableStore::default());
        let services = Services {
            store: store.clone(),
            payments: Arc::new(payments.clone()),
            ..Services::in_memory()
        };
        let (state, worker) = AppState::new(config, services);
        let worker = worker.spawn();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let app = build_app(state.clone());
        let server = tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .expect("test server");
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
            payments,
            store,
            server,
            worker,
        }
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// A fresh browser: its own cookie jar, so its own session.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built.
    #[must_use]
    pub fn client() -> Client {
        Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client")
    }

    /// Send a JSON request and return the status and parsed body (`Null` for
    /// an empty body).
    ///
    /// # Panics
    ///
    /// Panics if the request fails in transport.
    pub async fn send(
        &self,
        client: &Client,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = client.request(method, self.url(path));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.expect("request failed");
        let status = response.status();
        let text = response.text().await.expect("response body");
        let value = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };
        (status, value)
    }

    pub async fn get(&self, client: &Client, path: &str) -> (StatusCode, Value) {
        self.send(client, reqwest::Method::GET, path, None).await
    }

    pub async fn post(&self, client: &Client, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(client, reqwest::Method::POST, path, Some(body))
            .await
    }

    pub async fn patch(&self, client: &Client, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(client, reqwest::Method::PATCH, path, Some(body))
            .await
    }

    /// Sign up `email` with a known password on `client`; returns the uid.
    ///
    /// # Panics
    ///
    /// Panics if sign-up is refused.
    pub async fn sign_up(&self, client: &Client, email: &str) -> String {
        let (status, body) = self
            .post(
                client,
                "/api/auth/signup",
                json!({ "email": email, "password": "hunter22", "firstName": "Test" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
        body["uid"].as_str().expect("uid in signup response").to_owned()
    }

    /// Give `uid` the admin role directly in the store, as the operator CLI
    /// does.
    ///
    /// # Panics
    ///
    /// Panics if the profile does not exist.
    pub async fn promote_to_admin(&self, uid: &str) {
        UserRepository::new(self.state.store())
            .set_role(&UserId::new(uid), Role::Admin)
            .await
            .expect("promote to admin");
    }

    /// Poll a booking until `done` accepts it or `timeout` passes.
    ///
    /// # Panics
    ///
    /// Panics on timeout.
    pub async fn wait_for_booking(
        &self,
        client: &Client,
        id: &str,
        timeout: Duration,
        done: impl Fn(&Value) -> bool,
    ) -> Value {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let (_, booking) = self.get(client, &format!("/api/bookings/{id}")).await;
            if done(&booking) {
                return booking;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "booking {id} did not settle: {booking}"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.abort();
        self.worker.abort();
    }
}
