//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::StorefrontConfig;
use crate::db::{self, DocumentStore, MemoryDocumentStore, PgDocumentStore};
use crate::error::AppError;
use crate::models::SessionEvent;
use crate::services::auth::{
    AuthError, AuthService, IdentityProvider, IdentityToolkitClient, LocalIdentityProvider,
};
use crate::services::payments::{PaymentError, PaymentGateway, SimulatedPayments, StripeClient};
use crate::services::places::{GooglePlacesClient, PlacesError, PlacesProvider, PlacesService};
use crate::services::settlement::{self, SettlementQueue, SettlementWorker};

/// Capacity of the session event channel. Slow observers miss events
/// rather than block sign-ins.
const SESSION_EVENT_CAPACITY: usize = 64;

/// Error wiring up external services at startup.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("database connection failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("identity client: {0}")]
    Identity(#[from] AuthError),
    #[error("payment client: {0}")]
    Payments(#[from] PaymentError),
    #[error("places client: {0}")]
    Places(#[from] PlacesError),
}

/// The external collaborators the server talks to.
///
/// Built from configuration in production; tests assemble one by hand with
/// in-memory and simulated implementations.
pub struct Services {
    pub store: Arc<dyn DocumentStore>,
    /// Present when the store is `PostgreSQL`; sessions are kept there too.
    pub pool: Option<PgPool>,
    pub identity: Arc<dyn IdentityProvider>,
    pub payments: Arc<dyn PaymentGateway>,
    pub places: Option<Arc<dyn PlacesProvider>>,
}

impl Services {
    /// Connect to everything `config` names, substituting local stand-ins
    /// for what it leaves out.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if the database is unreachable or an HTTP client
    /// cannot be built.
    pub async fn from_config(config: &StorefrontConfig) -> Result<Self, StateError> {
        let (store, pool): (Arc<dyn DocumentStore>, _) = match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url).await?;
                info!("Connected to PostgreSQL");
                (Arc::new(PgDocumentStore::new(pool.clone())), Some(pool))
            }
            None => {
                warn!("No database URL configured; using in-memory store (data is lost on restart)");
                (Arc::new(MemoryDocumentStore::new()), None)
            }
        };

        let integrations = &config.integrations;

        let identity: Arc<dyn IdentityProvider> = match &integrations.identity_api_key {
            Some(key) => Arc::new(IdentityToolkitClient::new(key.clone(), &config.base_url)?),
            None => {
                warn!("IDENTITY_API_KEY not set; using local accounts (development only)");
                Arc::new(LocalIdentityProvider::new())
            }
        };

        let payments: Arc<dyn PaymentGateway> = match &integrations.stripe_secret_key {
            Some(key) => Arc::new(StripeClient::new(key.clone())?),
            None => {
                warn!("STRIPE_SECRET_KEY not set; payments are simulated");
                Arc::new(SimulatedPayments::new())
            }
        };

        let places: Option<Arc<dyn PlacesProvider>> = match &integrations.google_maps_api_key {
            Some(key) => Some(Arc::new(GooglePlacesClient::new(key.clone())?)),
            None => {
                info!("GOOGLE_MAPS_API_KEY not set; address lookup disabled");
                None
            }
        };

        Ok(Self {
            store,
            pool,
            identity,
            payments,
            places,
        })
    }

    /// In-memory store, local accounts, simulated payments, no places.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(MemoryDocumentStore::new()),
            pool: None,
            identity: Arc::new(LocalIdentityProvider::new()),
            payments: Arc::new(SimulatedPayments::new()),
            places: None,
        }
    }
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn DocumentStore>,
    pool: Option<PgPool>,
    identity: Arc<dyn IdentityProvider>,
    payments: Arc<dyn PaymentGateway>,
    places: Option<PlacesService>,
    session_events: broadcast::Sender<SessionEvent>,
    settlement: SettlementQueue,
}

impl AppState {
    /// Create the application state and the settlement worker that serves
    /// its queue. The caller decides where the worker runs.
    #[must_use]
    pub fn new(config: StorefrontConfig, services: Services) -> (Self, SettlementWorker) {
        let Services {
            store,
            pool,
            identity,
            payments,
            places,
        } = services;

        let (settlement, worker) = settlement::channel(
            Arc::clone(&store),
            Arc::clone(&payments),
            config.settlement.clone(),
        );
        let places = places
            .map(|provider| PlacesService::new(provider, config.integrations.places_cache_ttl));
        let (session_events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);

        let state = Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                pool,
                identity,
                payments,
                places,
                session_events,
                settlement,
            }),
        };
        (state, worker)
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The document store.
    #[must_use]
    pub fn store(&self) -> &dyn DocumentStore {
        self.inner.store.as_ref()
    }

    /// The `PostgreSQL` pool, when the store is backed by one.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }

    /// Authentication for the current request.
    #[must_use]
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(
            self.inner.identity.as_ref(),
            self.store(),
            &self.inner.session_events,
        )
    }

    #[must_use]
    pub fn payments(&self) -> &dyn PaymentGateway {
        self.inner.payments.as_ref()
    }

    /// Address lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unavailable` when no places API key is configured.
    pub fn places(&self) -> Result<&PlacesService, AppError> {
        self.inner
            .places
            .as_ref()
            .ok_or_else(|| AppError::Unavailable("Address lookup is not configured".to_owned()))
    }

    #[must_use]
    pub fn settlement(&self) -> &SettlementQueue {
        &self.inner.settlement
    }
}
