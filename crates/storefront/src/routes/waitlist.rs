//! Pre-launch waitlist routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::WaitlistEntry;
use crate::models::waitlist::ReferralStatus;
use crate::services::waitlist::{WaitlistService, WaitlistSignup};
use crate::state::AppState;

/// `?ref=` on the signup link.
#[derive(Debug, Default, Deserialize)]
pub struct ReferralQuery {
    #[serde(rename = "ref")]
    pub referral_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: usize,
}

/// Build the waitlist router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/waitlist", post(join))
        .route("/api/waitlist/count", get(count))
        .route("/api/waitlist/referrals", get(referrals))
}

/// Join the waitlist, optionally through a referral link.
///
/// # Errors
///
/// Returns 400 for a missing name or malformed email.
pub async fn join(
    State(state): State<AppState>,
    Query(query): Query<ReferralQuery>,
    Json(signup): Json<WaitlistSignup>,
) -> Result<(StatusCode, Json<WaitlistEntry>)> {
    let entry = WaitlistService::new(state.store())
        .join(&signup, query.referral_code.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn count(State(state): State<AppState>) -> Result<Json<CountResponse>> {
    let count = WaitlistService::new(state.store()).count().await?;
    Ok(Json(CountResponse { count }))
}

/// Referral code and progress for a signup.
///
/// # Errors
///
/// Returns 404 if nobody signed up with the email.
pub async fn referrals(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<ReferralStatus>> {
    let status = WaitlistService::new(state.store())
        .referral_status(&query.email)
        .await?;
    Ok(Json(status))
}
