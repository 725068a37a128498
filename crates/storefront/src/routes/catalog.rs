//! Static menu data for the booking and application forms.

use axum::{Json, Router, routing::get};
use serde::Serialize;

use brnno_core::catalog::{
    self, BUSINESS_TYPES, PROVIDER_SERVICE_OPTIONS, ServiceOffering, TIME_SLOTS,
    WAITLIST_SERVICE_OPTIONS,
};

use crate::state::AppState;

/// Option lists for the provider application and waitlist forms.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormOptions {
    pub provider_services: &'static [&'static str],
    pub waitlist_services: &'static [&'static str],
    pub business_types: &'static [&'static str],
}

/// Build the catalog router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/services", get(services))
        .route("/api/time-slots", get(time_slots))
        .route("/api/form-options", get(form_options))
}

pub async fn services() -> Json<Vec<ServiceOffering>> {
    Json(catalog::services())
}

pub async fn time_slots() -> Json<&'static [&'static str]> {
    Json(&TIME_SLOTS)
}

pub async fn form_options() -> Json<FormOptions> {
    Json(FormOptions {
        provider_services: &PROVIDER_SERVICE_OPTIONS,
        waitlist_services: &WAITLIST_SERVICE_OPTIONS,
        business_types: &BUSINESS_TYPES,
    })
}
