//! User profiles.
//!
//! The identity provider owns credentials; the marketplace keeps a profile
//! document per identity, keyed by its uid.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use brnno_core::{AccountType, ProviderId, Role, UserId};

/// Fields stored on a user profile document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileRecord {
    pub uid: UserId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_application_id: Option<ProviderId>,
}

impl UserProfileRecord {
    /// A fresh customer profile.
    #[must_use]
    pub fn customer(uid: UserId, email: String, display_name: Option<String>) -> Self {
        Self {
            uid,
            email,
            display_name,
            first_name: None,
            last_name: None,
            phone: None,
            business_name: None,
            account_type: AccountType::Customer,
            role: Role::User,
            provider_application_id: None,
        }
    }
}

/// A stored user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(flatten)]
    pub record: UserProfileRecord,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    /// Best available human name: display name, then first + last, then
    /// the email address.
    #[must_use]
    pub fn name(&self) -> String {
        let record = &self.record;
        if let Some(display) = record.display_name.as_deref().filter(|d| !d.trim().is_empty()) {
            return display.to_owned();
        }
        let full = [record.first_name.as_deref(), record.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        if full.is_empty() {
            record.email.clone()
        } else {
            full
        }
    }
}

/// Fields a user may edit on their own profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ProfileUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.phone.is_none()
    }
}
