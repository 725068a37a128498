//! Waitlist signups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use brnno_core::analytics::SignupFacts;
use brnno_core::{Email, Urgency, VehicleType, WaitlistEntryId, WaitlistStatus};

/// Fields stored on a waitlist document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWaitlistEntry {
    pub name: String,
    pub email: Email,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub vehicle_type: Option<VehicleType>,
    #[serde(default)]
    pub services_interested: Vec<String>,
    #[serde(default)]
    pub how_soon: Option<Urgency>,
    #[serde(default)]
    pub status: WaitlistStatus,
    pub referral_code: String,
    #[serde(default)]
    pub referred_by: Option<String>,
    #[serde(default)]
    pub referral_count: u64,
}

/// A stored waitlist signup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    pub id: WaitlistEntryId,
    #[serde(flatten)]
    pub entry: NewWaitlistEntry,
    /// Server time of signup.
    #[serde(alias = "createdAt")]
    pub timestamp: DateTime<Utc>,
}

impl WaitlistEntry {
    /// The fields analytics groups on.
    #[must_use]
    pub fn facts(&self) -> SignupFacts<'_> {
        SignupFacts {
            city: self.entry.city.as_deref(),
            services_interested: &self.entry.services_interested,
            how_soon: self.entry.how_soon.as_ref().map(Urgency::as_str),
            vehicle_type: self.entry.vehicle_type.as_ref().map(VehicleType::as_str),
            created_at: Some(self.timestamp),
        }
    }
}

/// What a signup can see about their own referrals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralStatus {
    pub referral_code: String,
    pub referral_count: u64,
    pub city: Option<String>,
    pub signed_up_at: DateTime<Utc>,
}

impl From<&WaitlistEntry> for ReferralStatus {
    fn from(entry: &WaitlistEntry) -> Self {
        Self {
            referral_code: entry.entry.referral_code.clone(),
            referral_count: entry.entry.referral_count,
            city: entry.entry.city.clone(),
            signed_up_at: entry.timestamp,
        }
    }
}
