//! Provider directory and provider dashboard routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use brnno_core::Amount;
use brnno_core::analytics::DashboardStats;

use crate::db::bookings::BookingRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireProvider;
use crate::models::booking::UpcomingBooking;
use crate::models::{Booking, ProviderListing};
use crate::services::places::LatLng;
use crate::services::providers::ProviderService;
use crate::state::AppState;

/// Radius used when a location is given without one.
const DEFAULT_RADIUS_KM: f64 = 40.0;

/// Optional location filter for the directory.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuery {
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
}

impl ListingQuery {
    fn near(&self) -> Result<Option<(LatLng, f64)>> {
        match (self.lat, self.lng) {
            (None, None) => Ok(None),
            (Some(lat), Some(lng)) => {
                let radius = self.radius_km.unwrap_or(DEFAULT_RADIUS_KM);
                let valid = (-90.0..=90.0).contains(&lat)
                    && (-180.0..=180.0).contains(&lng)
                    && radius.is_finite()
                    && radius > 0.0;
                if !valid {
                    return Err(AppError::BadRequest("Invalid location".to_owned()));
                }
                Ok(Some((LatLng { lat, lng }, radius)))
            }
            _ => Err(AppError::BadRequest(
                "lat and lng must be given together".to_owned(),
            )),
        }
    }
}

/// What a provider sees on their dashboard.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDashboard {
    pub today_bookings: u64,
    pub week_revenue: Amount,
    pub total_jobs: u64,
    pub upcoming: Vec<UpcomingBooking>,
    pub bookings: Vec<Booking>,
}

/// Build the providers router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/providers", get(listings))
        .route("/api/provider/dashboard", get(dashboard))
}

/// Approved providers, nearest first when a location is given.
///
/// # Errors
///
/// Returns 400 for a half-given or out-of-range location.
pub async fn listings(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> Result<Json<Vec<ProviderListing>>> {
    let near = query.near()?;
    let listings = ProviderService::new(state.store()).listings(near).await?;
    Ok(Json(listings))
}

/// The signed-in provider's bookings and headline numbers.
///
/// A provider whose application has not been linked yet sees an empty
/// dashboard.
pub async fn dashboard(
    State(state): State<AppState>,
    RequireProvider(profile): RequireProvider,
) -> Result<Json<ProviderDashboard>> {
    let bookings = match &profile.record.provider_application_id {
        Some(provider) => {
            BookingRepository::new(state.store())
                .for_provider(provider)
                .await?
        }
        None => Vec::new(),
    };

    let today = Utc::now().date_naive();
    let facts: Vec<_> = bookings.iter().map(Booking::facts).collect();
    let stats = DashboardStats::compute(&facts, today);
    let upcoming = stats
        .upcoming
        .iter()
        .filter_map(|id| bookings.iter().find(|b| &b.id == id))
        .map(|booking| UpcomingBooking::new(booking, today))
        .collect();

    Ok(Json(ProviderDashboard {
        today_bookings: stats.today_bookings,
        week_revenue: stats.week_revenue,
        total_jobs: stats.total_jobs,
        upcoming,
        bookings,
    }))
}
