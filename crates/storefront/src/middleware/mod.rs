//! HTTP middleware stack for the marketplace API.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request span with `request_id` field)
//! 3. Request ID
//! 4. Session layer (tower-sessions, `PostgreSQL` or memory store)
//! 5. Rate limiting on auth and public write routes (governor)
//!
//! Authorization is done by extractors in [`auth`], not by a layer.

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{
    OptionalAuth, RequireAdmin, RequireAuth, RequireProvider, clear_current_user,
    set_current_user,
};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
