//! Provider applications and public provider listings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use brnno_core::wizard::provider::ProviderApplicationRecord;
use brnno_core::{ApplicationStatus, ProviderId};

use crate::services::places::LatLng;

/// A stored provider application.
///
/// Approved applications are the marketplace's providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderApplication {
    pub id: ProviderId,
    #[serde(flatten)]
    pub record: ProviderApplicationRecord,
    #[serde(alias = "createdAt")]
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    /// Connected payout account, created on approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout_account_id: Option<String>,
    /// Geocoded service area, set on approval when geocoding is available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LatLng>,
}

impl ProviderApplication {
    #[must_use]
    pub fn status(&self) -> ApplicationStatus {
        self.record.status
    }

    /// Copy with bank details masked, for API responses.
    #[must_use]
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        copy.record.application = copy.record.application.masked();
        copy
    }
}

/// Public view of an approved provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderListing {
    pub id: ProviderId,
    pub name: String,
    pub services: Vec<String>,
    pub service_area: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl From<&ProviderApplication> for ProviderListing {
    fn from(provider: &ProviderApplication) -> Self {
        let application = &provider.record.application;
        Self {
            id: provider.id.clone(),
            name: application
                .business_name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Unknown Business".to_owned()),
            services: application.services.clone(),
            service_area: application.service_area.clone(),
            distance_km: None,
        }
    }
}
