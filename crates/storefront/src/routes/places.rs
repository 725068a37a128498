//! Address lookup proxy, so the mapping API key stays on the server.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::services::places::{AutocompleteOptions, PlaceDetails, PlacePrediction, PlacesError};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AutocompleteQuery {
    #[serde(default)]
    pub q: String,
    pub country: Option<String>,
}

/// Build the places router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/places/autocomplete", get(autocomplete))
        .route("/api/places/{id}", get(details))
}

/// Address predictions. Short inputs return an empty list.
///
/// # Errors
///
/// Returns 503 when address lookup is not configured and 502 when the
/// mapping API fails.
pub async fn autocomplete(
    State(state): State<AppState>,
    Query(query): Query<AutocompleteQuery>,
) -> Result<Json<Vec<PlacePrediction>>> {
    let mut options = AutocompleteOptions::default();
    if let Some(country) = query.country.filter(|c| c.len() == 2) {
        options.country = country;
    }
    let predictions = state.places()?.autocomplete(&query.q, &options).await?;
    Ok(Json(predictions))
}

/// Resolve a prediction to a formatted address and coordinates.
///
/// # Errors
///
/// Returns 404 for an unknown place.
pub async fn details(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PlaceDetails>> {
    match state.places()?.place_details(&id).await {
        Ok(details) => Ok(Json(details)),
        Err(PlacesError::NotFound(_)) => Err(AppError::NotFound("Place not found".to_owned())),
        Err(e) => Err(e.into()),
    }
}
