//! HTTP route handlers for the marketplace API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Store ping
//!
//! # Auth
//! POST /api/auth/signup                 - Create account, sign in
//! POST /api/auth/login                  - Email/password sign-in
//! POST /api/auth/federated              - ID token sign-in
//! POST /api/auth/logout                 - Sign out
//! POST /api/auth/password-reset         - Send reset email (202)
//! GET  /api/auth/me                     - Current profile
//!
//! # Account (requires auth)
//! GET  /api/account/profile             - Read profile
//! PATCH /api/account/profile            - Edit names and phone
//!
//! # Booking wizard (submit requires auth)
//! GET  /api/booking                     - Wizard state
//! PATCH /api/booking/draft              - Edit draft
//! POST /api/booking/{advance,retreat,reset,submit}
//! GET  /api/bookings                    - Caller's bookings
//! GET  /api/bookings/{id}               - One booking
//!
//! # Provider application wizard (submit requires auth)
//! GET  /api/provider-application        - Wizard state
//! PATCH /api/provider-application/draft - Edit draft
//! POST /api/provider-application/{advance,retreat,reset,submit}
//!
//! # Providers
//! GET  /api/providers                   - Approved providers (?lat&lng&radiusKm)
//! GET  /api/provider/dashboard          - Provider's bookings and stats
//!
//! # Admin (requires admin role)
//! GET  /api/admin/analytics             - Waitlist analytics
//! GET  /api/admin/providers             - Applications (?status=)
//! POST /api/admin/providers/{id}/approve
//! POST /api/admin/providers/{id}/reject
//!
//! # Waitlist
//! POST /api/waitlist                    - Join (?ref=CODE)
//! GET  /api/waitlist/count              - Signup count
//! GET  /api/waitlist/referrals          - Referral progress (?email=)
//!
//! # Catalog and places
//! GET  /api/services                    - Service menu
//! GET  /api/time-slots                  - Bookable times
//! GET  /api/form-options                - Application and waitlist options
//! GET  /api/places/autocomplete         - Address predictions (?q=)
//! GET  /api/places/{id}                 - Place details
//! ```

pub mod account;
pub mod admin;
pub mod auth;
pub mod booking;
pub mod catalog;
pub mod places;
pub mod provider_application;
pub mod providers;
pub mod waitlist;
pub mod wizard;

use axum::{
    Router, extract::State, http::StatusCode, middleware::from_fn, routing::get,
};
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tower_sessions::MemoryStore;
use tower_sessions_sqlx_store::PostgresStore;
use tracing::Span;

use crate::config::StorefrontConfig;
use crate::middleware::{
    api_rate_limiter, auth_rate_limiter, create_session_layer, request_id_middleware,
};
use crate::state::AppState;

/// All API routes. Auth, waitlist and places routes are rate limited per
/// client IP when `config.rate_limit` is set.
pub fn routes(config: &StorefrontConfig) -> Router<AppState> {
    let mut auth = auth::router();
    let mut waitlist = waitlist::router();
    let mut places = places::router();
    if config.rate_limit {
        auth = auth.layer(auth_rate_limiter());
        waitlist = waitlist.layer(api_rate_limiter());
        places = places.layer(api_rate_limiter());
    }

    Router::new()
        .merge(auth)
        .merge(waitlist)
        .merge(account::router())
        .merge(booking::router())
        .merge(provider_application::router())
        .merge(providers::router())
        .merge(admin::router())
        .merge(catalog::router())
        .merge(places)
}

/// The complete application: routes, health checks and the middleware
/// stack, bound to `state`.
pub fn build_app(state: AppState) -> Router {
    let config = state.config();
    let router = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes(config));

    let router = match state.pool() {
        Some(pool) => router.layer(create_session_layer(PostgresStore::new(pool.clone()), config)),
        None => router.layer(create_session_layer(MemoryStore::default(), config)),
    };

    router
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the document store is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.store().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
