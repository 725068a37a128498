//! Pre-launch waitlist signups and referral tracking.

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use brnno_core::{Email, EmailError, Urgency, VehicleType, WaitlistStatus};

use crate::db::waitlist::WaitlistRepository;
use crate::db::{DocumentStore, RepositoryError};
use crate::models::waitlist::ReferralStatus;
use crate::models::{NewWaitlistEntry, WaitlistEntry};
use crate::services::referral::{generate_referral_code, normalize_code};

/// Fresh codes drawn before accepting a collision.
const CODE_ATTEMPTS: usize = 3;

/// Errors from waitlist operations.
#[derive(Debug, Error)]
pub enum WaitlistError {
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error("name is required")]
    MissingName,

    #[error("no waitlist signup for that email")]
    UnknownEmail,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// The waitlist form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistSignup {
    pub name: String,
    pub email: String,
    #[serde(default)]
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
}

/// Waitlist operations over a borrowed store.
pub struct WaitlistService<'a> {
    entries: WaitlistRepository<'a>,
}

impl<'a> WaitlistService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn DocumentStore) -> Self {
        Self {
            entries: WaitlistRepository::new(store),
        }
    }

    /// Record a signup, crediting the owner of `referral_code` if it matches
    /// an existing entry.
    ///
    /// A failed credit is logged and does not fail the signup.
    ///
    /// # Errors
    ///
    /// Returns `WaitlistError::InvalidEmail` or `WaitlistError::MissingName`
    /// for bad input and `WaitlistError::Repository` if the entry cannot be
    /// stored.
    #[instrument(skip(self, signup), fields(city = signup.city.as_deref()))]
    pub async fn join(
        &self,
        signup: &WaitlistSignup,
        referral_code: Option<&str>,
    ) -> Result<WaitlistEntry, WaitlistError> {
        let email = Email::parse(&signup.email)?;
        let name = signup.name.trim();
        if name.is_empty() {
            return Err(WaitlistError::MissingName);
        }

        let referrer = match referral_code.and_then(normalize_code) {
            Some(code) => {
                let found = self.entries.find_by_referral_code(&code).await?;
                if found.is_none() {
                    info!(code = %code, "unknown referral code");
                }
                found.filter(|r| r.entry.email != email)
            }
            None => None,
        };

        let entry = NewWaitlistEntry {
            name: name.to_owned(),
            referral_code: self.unused_code(&email).await?,
            email,
            phone: non_blank(signup.phone.as_deref()),
            city: non_blank(signup.city.as_deref()),
            zip_code: non_blank(signup.zip_code.as_deref()),
            vehicle_type: signup.vehicle_type,
            services_interested: signup.services_interested.clone(),
            how_soon: signup.how_soon,
            status: WaitlistStatus::Pending,
            referred_by: referrer.as_ref().map(|r| r.entry.referral_code.clone()),
            referral_count: 0,
        };
        let created = self.entries.create(&entry).await?;
        info!(id = %created.id, referred = referrer.is_some(), "waitlist signup");

        if let Some(referrer) = referrer
            && let Err(e) = self.entries.increment_referrals(&referrer.id).await
        {
            warn!(referrer = %referrer.id, error = %e, "failed to credit referral");
        }

        Ok(created)
    }

    /// Number of signups.
    ///
    /// # Errors
    ///
    /// Returns `WaitlistError::Repository` if the store query fails.
    pub async fn count(&self) -> Result<usize, WaitlistError> {
        Ok(self.entries.count().await?)
    }

    /// Referral progress for the signup with `email`.
    ///
    /// # Errors
    ///
    /// Returns `WaitlistError::UnknownEmail` if nobody signed up with it.
    pub async fn referral_status(&self, email: &str) -> Result<ReferralStatus, WaitlistError> {
        let email = Email::parse(email)?;
        let entry = self
            .entries
            .find_by_email(&email)
            .await?
            .ok_or(WaitlistError::UnknownEmail)?;
        Ok(ReferralStatus::from(&entry))
    }

    /// A referral code not yet held by another signup.
    async fn unused_code(&self, email: &Email) -> Result<String, RepositoryError> {
        let mut code = generate_referral_code(email);
        for _ in 1..CODE_ATTEMPTS {
            if self.entries.find_by_referral_code(&code).await?.is_none() {
                break;
            }
            code = generate_referral_code(email);
        }
        Ok(code)
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}
