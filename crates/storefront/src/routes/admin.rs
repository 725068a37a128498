//! Admin-only routes: waitlist analytics and provider review.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use brnno_core::analytics::WaitlistAnalytics;
use brnno_core::{ApplicationStatus, ProviderId};

use crate::db::waitlist::WaitlistRepository;
use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireAdmin;
use crate::models::{ProviderApplication, WaitlistEntry};
use crate::services::providers::ProviderService;
use crate::state::AppState;

/// A leading group in the analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Leader {
    pub name: String,
    pub count: u64,
}

impl From<(&str, u64)> for Leader {
    fn from((name, count): (&str, u64)) -> Self {
        Self {
            name: name.to_owned(),
            count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    #[serde(flatten)]
    pub analytics: WaitlistAnalytics,
    pub top_city: Option<Leader>,
    pub top_service: Option<Leader>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub status: ApplicationStatus,
}

/// Build the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/analytics", get(analytics))
        .route("/api/admin/providers", get(applications))
        .route("/api/admin/providers/{id}/approve", post(approve))
        .route("/api/admin/providers/{id}/reject", post(reject))
}

/// Grouped waitlist counts.
pub async fn analytics(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
) -> Result<Json<AnalyticsResponse>> {
    let entries = WaitlistRepository::new(state.store()).list().await?;
    let analytics = WaitlistAnalytics::aggregate(entries.iter().map(WaitlistEntry::facts), Utc::now());
    Ok(Json(AnalyticsResponse {
        top_city: analytics.top_city().map(Leader::from),
        top_service: analytics.top_service().map(Leader::from),
        analytics,
    }))
}

/// Provider applications in `?status=` (default `pending`).
pub async fn applications(
    State(state): State<AppState>,
    RequireAdmin(_): RequireAdmin,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Vec<ProviderApplication>>> {
    let applications = ProviderService::new(state.store())
        .applications(query.status)
        .await?;
    Ok(Json(applications))
}

/// Approve an application.
///
/// # Errors
///
/// Returns 404 for an unknown application.
#[instrument(skip_all, fields(provider = %id))]
pub async fn approve(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProviderId>,
) -> Result<Json<ProviderApplication>> {
    let places = state.places().ok();
    let application = ProviderService::new(state.store())
        .approve(&id, state.payments(), places)
        .await?;
    info!(admin = %admin.uid, "application approved");
    add_breadcrumb("admin", "Approved provider", Some(&[("provider_id", id.as_str())]));
    Ok(Json(application.masked()))
}

/// Reject an application.
///
/// # Errors
///
/// Returns 404 for an unknown application.
#[instrument(skip_all, fields(provider = %id))]
pub async fn reject(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProviderId>,
) -> Result<Json<ProviderApplication>> {
    let application = ProviderService::new(state.store()).reject(&id).await?;
    info!(admin = %admin.uid, "application rejected");
    add_breadcrumb("admin", "Rejected provider", Some(&[("provider_id", id.as_str())]));
    Ok(Json(application.masked()))
}
