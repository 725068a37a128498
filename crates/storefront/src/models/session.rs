//! Session-related types.
//!
//! Types stored in the session for authentication and wizard state.

use serde::{Deserialize, Serialize};

use brnno_core::{AccountType, Role, UserId};

use super::UserProfile;

/// Who is signed in on this session.
///
/// Written at sign-in and refreshed from the profile on every guarded
/// request, so out-of-band role changes apply without a new login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub uid: UserId,
    pub email: String,
    pub account_type: AccountType,
    pub role: Role,
}

impl SessionContext {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    #[must_use]
    pub fn is_provider(&self) -> bool {
        self.account_type == AccountType::Provider
    }
}

impl From<&UserProfile> for SessionContext {
    fn from(profile: &UserProfile) -> Self {
        Self {
            uid: profile.record.uid.clone(),
            email: profile.record.email.clone(),
            account_type: profile.record.account_type,
            role: profile.record.role,
        }
    }
}

/// Authentication state changes, broadcast to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(SessionContext),
    SignedOut(UserId),
}

/// Session keys.
pub mod session_keys {
    /// Key for the signed-in user's [`super::SessionContext`].
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the booking wizard state.
    pub const BOOKING_WIZARD: &str = "wizard.booking";

    /// Key for the provider application wizard state.
    pub const PROVIDER_WIZARD: &str = "wizard.provider_application";
}
