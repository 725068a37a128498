//! Account route handlers (require a signed-in user).

use axum::{Json, Router, extract::State, routing::get};

use crate::db::users::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{ProfileUpdate, UserProfile};
use crate::state::AppState;

/// Build the account router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/account/profile", get(profile).patch(update_profile))
}

/// The signed-in user's profile.
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UserProfile>> {
    let profile = UserRepository::new(state.store())
        .get(&user.uid)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_owned()))?;
    Ok(Json(profile))
}

/// Edit names and phone. Role, account type and email are not editable
/// here.
///
/// # Errors
///
/// Returns 400 for an empty update.
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<UserProfile>> {
    if update.is_empty() {
        return Err(AppError::BadRequest("Nothing to update".to_owned()));
    }

    let users = UserRepository::new(state.store());
    users.update_profile(&user.uid, &update).await?;
    let profile = users
        .get(&user.uid)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_owned()))?;
    Ok(Json(profile))
}
