//! Authentication route handlers.
//!
//! Sign-up, password and federated sign-in, sign-out and password reset.
//! A successful sign-in stores a [`SessionContext`] in the session under a
//! fresh session id.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::db::users::UserRepository;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::{OptionalAuth, RequireAuth, clear_current_user, set_current_user};
use crate::models::{SessionContext, UserProfile};
use crate::services::auth::SignUp;
use crate::state::AppState;

/// Password sign-in body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Federated sign-in body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FederatedRequest {
    pub id_token: String,
}

/// Password reset body.
#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

/// Build the auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/federated", post(federated))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/password-reset", post(password_reset))
        .route("/api/auth/me", get(me))
}

/// Create an account and sign it in.
///
/// # Errors
///
/// Returns 400 for a bad email or short password and 409 if the email is
/// already registered.
#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<SignUp>,
) -> Result<(StatusCode, Json<SessionContext>)> {
    let user = state.auth().sign_up(&request).await?;
    start_session(&session, &user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Sign in with email and password.
///
/// # Errors
///
/// Returns 401 for wrong credentials.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<LoginRequest>,
) -> Result<Json<SessionContext>> {
    let user = state
        .auth()
        .sign_in(&request.email, &request.password)
        .await?;
    start_session(&session, &user).await?;
    Ok(Json(user))
}

/// Sign in with an ID token from a federated provider.
///
/// # Errors
///
/// Returns 401 if the token is rejected.
#[instrument(skip_all)]
pub async fn federated(
    State(state): State<AppState>,
    session: Session,
    Json(request): Json<FederatedRequest>,
) -> Result<Json<SessionContext>> {
    let user = state
        .auth()
        .sign_in_with_federated(&request.id_token)
        .await?;
    start_session(&session, &user).await?;
    Ok(Json(user))
}

/// Sign out. Signing out without a session is not an error.
///
/// # Errors
///
/// Returns 500 if the session store fails.
pub async fn logout(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
) -> Result<StatusCode> {
    if let Some(user) = user {
        state.auth().sign_out(&user.uid);
    }
    clear_current_user(&session).await.map_err(session_error)?;
    session.flush().await.map_err(session_error)?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// Send a password reset email.
///
/// Answers 202 whether or not the address has an account.
///
/// # Errors
///
/// Returns 400 for a malformed address.
pub async fn password_reset(
    State(state): State<AppState>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<StatusCode> {
    state.auth().send_password_reset(&request.email).await?;
    Ok(StatusCode::ACCEPTED)
}

/// The signed-in user's profile.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UserProfile>> {
    let profile = UserRepository::new(state.store())
        .get(&user.uid)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_owned()))?;
    Ok(Json(profile))
}

async fn start_session(session: &Session, user: &SessionContext) -> Result<()> {
    session.cycle_id().await.map_err(session_error)?;
    set_current_user(session, user).await.map_err(session_error)?;
    set_sentry_user(&user.uid, Some(&user.email));
    Ok(())
}

fn session_error(e: tower_sessions::session::Error) -> AppError {
    AppError::Internal(format!("session write failed: {e}"))
}
