//! Subcommand implementations.

pub mod admin;
pub mod analytics;
pub mod migrate;
pub mod providers;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use brnno_storefront::config::ConfigError;
use brnno_storefront::db::{PgDocumentStore, RepositoryError, create_pool};
use brnno_storefront::state::StateError;

/// Errors from CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Service setup failed: {0}")]
    Services(#[from] StateError),

    #[error("No user with uid {0}")]
    UnknownUser(String),

    #[error("Could not encode report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Connect to the database named by `BRNNO_DATABASE_URL` or `DATABASE_URL`.
async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let url = std::env::var("BRNNO_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map_err(|_| CliError::MissingEnvVar("BRNNO_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    Ok(create_pool(&SecretString::from(url)).await?)
}

/// The document store over [`connect`].
async fn store() -> Result<PgDocumentStore, CliError> {
    Ok(PgDocumentStore::new(connect().await?))
}
