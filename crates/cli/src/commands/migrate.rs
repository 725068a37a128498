//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! brnno-cli migrate
//! ```
//!
//! Migrations live in `crates/storefront/migrations/` and create the
//! `storefront.documents` table and the `tower_sessions.session` table.

use super::{CliError, connect};

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
