//! Provider application review.
//!
//! # Usage
//!
//! ```bash
//! brnno-cli providers list --status pending
//! brnno-cli providers approve <application-id>
//! brnno-cli providers reject <application-id>
//! ```

use brnno_core::{ApplicationStatus, ProviderId};
use brnno_storefront::config::StorefrontConfig;
use brnno_storefront::services::places::PlacesService;
use brnno_storefront::services::providers::ProviderService;
use brnno_storefront::state::Services;

use super::{CliError, store};

/// Log applications in `status`, bank details masked.
///
/// # Errors
///
/// Returns `CliError` if the store cannot be read.
pub async fn list(status: ApplicationStatus) -> Result<(), CliError> {
    let store = store().await?;
    let applications = ProviderService::new(&store).applications(status).await?;

    tracing::info!("{} {} application(s)", applications.len(), status);
    for application in &applications {
        let details = &application.record.application;
        tracing::info!(
            "  {}  {}  {}  services: {}",
            application.id,
            details.business_name.as_deref().unwrap_or("-"),
            details.service_area.as_deref().unwrap_or("-"),
            details.services.join(", "),
        );
    }
    Ok(())
}

/// Approve an application, attaching a payout account and geocoding its
/// service area with the server's credentials.
///
/// # Errors
///
/// Returns `CliError` if configuration is incomplete or the application
/// does not exist.
pub async fn approve(id: &str) -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    let config = StorefrontConfig::from_env()?;
    let services = Services::from_config(&config).await?;
    let places = services
        .places
        .map(|provider| PlacesService::new(provider, config.integrations.places_cache_ttl));

    let application = ProviderService::new(services.store.as_ref())
        .approve(&ProviderId::new(id), services.payments.as_ref(), places.as_ref())
        .await?;

    tracing::info!("Approved {}", application.id);
    match &application.payout_account_id {
        Some(account) => tracing::info!("  Payout account: {account}"),
        None => tracing::warn!("  No payout account yet; approve again to retry"),
    }
    if application.location.is_none() {
        tracing::warn!("  Service area not geocoded; listing is excluded from radius search");
    }
    Ok(())
}

/// Reject an application.
///
/// # Errors
///
/// Returns `CliError` if the application does not exist.
pub async fn reject(id: &str) -> Result<(), CliError> {
    let store = store().await?;
    let application = ProviderService::new(&store)
        .reject(&ProviderId::new(id))
        .await?;
    tracing::info!("Rejected {}", application.id);
    Ok(())
}
