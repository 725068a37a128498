//! Reports.

use chrono::Utc;

use brnno_core::analytics::WaitlistAnalytics;
use brnno_storefront::db::waitlist::WaitlistRepository;
use brnno_storefront::models::WaitlistEntry;

use super::{CliError, store};

/// Print waitlist analytics as pretty JSON on stdout.
///
/// # Errors
///
/// Returns `CliError` if the waitlist cannot be read.
pub async fn waitlist() -> Result<(), CliError> {
    let store = store().await?;
    let entries = WaitlistRepository::new(&store).list().await?;
    let analytics =
        WaitlistAnalytics::aggregate(entries.iter().map(WaitlistEntry::facts), Utc::now());

    if let Some((city, count)) = analytics.top_city() {
        tracing::info!("Top city: {city} ({count} signups)");
    }
    if let Some((service, count)) = analytics.top_service() {
        tracing::info!("Most requested service: {service} ({count})");
    }

    let report = serde_json::to_string_pretty(&analytics)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{report}");
    }
    Ok(())
}
