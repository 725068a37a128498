//! Authentication extractors.
//!
//! The signed-in user lives in the session as a [`SessionContext`]. Guarded
//! extractors re-read the profile from the store on every request, so role
//! and account-type changes made elsewhere (admin promotion, provider
//! application) apply without signing in again.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use tracing::debug;

use crate::db::users::UserRepository;
use crate::error::AppError;
use crate::models::{SessionContext, UserProfile, session_keys};
use crate::state::AppState;

/// Extractor that requires a signed-in user.
///
/// Rejects with 401 when there is no session user or the profile is gone.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireAuth(user): RequireAuth,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub SessionContext);

/// Extractor that requires `role = admin`. Rejects with 403 otherwise.
pub struct RequireAdmin(pub SessionContext);

/// Extractor that requires `accountType = provider`. Rejects with 403
/// otherwise. Carries the full profile, which links the provider
/// application.
pub struct RequireProvider(pub UserProfile);

/// Extractor that optionally gets the session user, without touching the
/// store.
pub struct OptionalAuth(pub Option<SessionContext>);

fn session(parts: &Parts) -> Result<Session, AppError> {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))
}

/// Load the session user and refresh it from their profile.
async fn current_user(
    parts: &Parts,
    state: &AppState,
) -> Result<(SessionContext, UserProfile), AppError> {
    let session = session(parts)?;
    let stored: SessionContext = session
        .get(session_keys::CURRENT_USER)
        .await
        .map_err(|e| AppError::Internal(format!("session read failed: {e}")))?
        .ok_or_else(|| AppError::Unauthorized("Sign in required".to_owned()))?;

    let Some(profile) = UserRepository::new(state.store()).get(&stored.uid).await? else {
        debug!(uid = %stored.uid, "session user has no profile");
        clear_current_user(&session)
            .await
            .map_err(|e| AppError::Internal(format!("session write failed: {e}")))?;
        return Err(AppError::Unauthorized("Sign in required".to_owned()));
    };

    let fresh = SessionContext::from(&profile);
    if fresh != stored {
        debug!(uid = %fresh.uid, role = %fresh.role, "refreshed session user");
        set_current_user(&session, &fresh)
            .await
            .map_err(|e| AppError::Internal(format!("session write failed: {e}")))?;
    }

    Ok((fresh, profile))
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (context, _) = current_user(parts, state).await?;
        Ok(Self(context))
    }
}

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (context, _) = current_user(parts, state).await?;
        if !context.is_admin() {
            return Err(AppError::Forbidden("Admin access required".to_owned()));
        }
        Ok(Self(context))
    }
}

impl FromRequestParts<AppState> for RequireProvider {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (context, profile) = current_user(parts, state).await?;
        if !context.is_provider() {
            return Err(AppError::Forbidden("Provider account required".to_owned()));
        }
        Ok(Self(profile))
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<SessionContext>(session_keys::CURRENT_USER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}

/// Helper to set the current user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &SessionContext,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Helper to clear the current user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<SessionContext>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}
