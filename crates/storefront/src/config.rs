//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BRNNO_BASE_URL` - Public URL for the marketplace
//! - `BRNNO_SESSION_SECRET` - Session secret (min 32 chars, high entropy)
//!
//! ## Optional
//! - `BRNNO_DATABASE_URL` - `PostgreSQL` connection string (fallback:
//!   `DATABASE_URL`; absent: in-memory store, development only)
//! - `BRNNO_HOST` - Bind address (default: 127.0.0.1)
//! - `BRNNO_PORT` - Listen port (default: 3000)
//! - `BRNNO_FEE_MODE` - `independent` (default) or `remainder`
//! - `BRNNO_RATE_LIMIT` - Rate limit auth, waitlist and places endpoints (default: true)
//! - `IDENTITY_API_KEY` - Hosted identity toolkit key (absent: local accounts)
//! - `STRIPE_SECRET_KEY` - Payment processor key (absent: simulated payments)
//! - `GOOGLE_MAPS_API_KEY` - Places/geocoding key (absent: places routes 503)
//! - `PLACES_CACHE_TTL_SECS` - Autocomplete cache lifetime (default: 300)
//! - `SETTLEMENT_DELAY_MS` - Wait before settling a booking (default: 2000)
//! - `SETTLEMENT_MAX_ATTEMPTS` - Payment attempts before failing (default: 5)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Transaction sample rate (default: 0.0)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use brnno_core::FeeMode;

use crate::services::settlement::SettlementConfig;

const MIN_SESSION_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password). `None`
    /// selects the in-memory store.
    pub database_url: Option<SecretString>,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the marketplace
    pub base_url: String,
    /// Session secret
    pub session_secret: SecretString,
    /// How booking totals are split between platform and provider
    pub fee_mode: FeeMode,
    /// Whether auth endpoints are rate limited
    pub rate_limit: bool,
    /// External service credentials
    pub integrations: IntegrationsConfig,
    /// Payment settlement timing
    pub settlement: SettlementConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
    /// Fraction of errors sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced
    pub sentry_traces_sample_rate: f32,
}

/// Credentials for the identity, payment and mapping providers.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone, Default)]
pub struct IntegrationsConfig {
    /// Hosted identity toolkit API key
    pub identity_api_key: Option<SecretString>,
    /// Payment processor secret key
    pub stripe_secret_key: Option<SecretString>,
    /// Places and geocoding API key
    pub google_maps_api_key: Option<SecretString>,
    /// Autocomplete cache lifetime
    pub places_cache_ttl: Duration,
}

fn redacted(secret: Option<&SecretString>) -> &'static str {
    if secret.is_some() {
        "[REDACTED]"
    } else {
        "None"
    }
}

impl std::fmt::Debug for IntegrationsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationsConfig")
            .field(
                "identity_api_key",
                &redacted(self.identity_api_key.as_ref()),
            )
            .field(
                "stripe_secret_key",
                &redacted(self.stripe_secret_key.as_ref()),
            )
            .field(
                "google_maps_api_key",
                &redacted(self.google_maps_api_key.as_ref()),
            )
            .field("places_cache_ttl", &self.places_cache_ttl)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("BRNNO_DATABASE_URL");
        let host = get_parsed_or_default("BRNNO_HOST", "127.0.0.1")?;
        let port = get_parsed_or_default("BRNNO_PORT", "3000")?;
        let base_url = get_base_url("BRNNO_BASE_URL")?;
        let session_secret = get_validated_secret("BRNNO_SESSION_SECRET")?;
        validate_session_secret(&session_secret, "BRNNO_SESSION_SECRET")?;

        let fee_mode = get_parsed_or_default("BRNNO_FEE_MODE", "independent")?;
        let rate_limit = get_parsed_or_default("BRNNO_RATE_LIMIT", "true")?;
        let integrations = IntegrationsConfig::from_env()?;
        let settlement = settlement_from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            session_secret,
            fee_mode,
            rate_limit,
            integrations,
            settlement,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_parsed_or_default("SENTRY_SAMPLE_RATE", "1.0")?,
            sentry_traces_sample_rate: get_parsed_or_default("SENTRY_TRACES_SAMPLE_RATE", "0.0")?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether session cookies should be marked `Secure`.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl IntegrationsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let ttl_secs: u64 = get_parsed_or_default("PLACES_CACHE_TTL_SECS", "300")?;
        Ok(Self {
            identity_api_key: get_optional_validated_secret("IDENTITY_API_KEY")?,
            stripe_secret_key: get_optional_validated_secret("STRIPE_SECRET_KEY")?,
            google_maps_api_key: get_optional_validated_secret("GOOGLE_MAPS_API_KEY")?,
            places_cache_ttl: Duration::from_secs(ttl_secs),
        })
    }
}

fn settlement_from_env() -> Result<SettlementConfig, ConfigError> {
    let delay_ms: u64 = get_parsed_or_default("SETTLEMENT_DELAY_MS", "2000")?;
    let max_attempts: u32 = get_parsed_or_default("SETTLEMENT_MAX_ATTEMPTS", "5")?;
    if max_attempts == 0 {
        return Err(ConfigError::InvalidEnvVar(
            "SETTLEMENT_MAX_ATTEMPTS".to_string(),
            "must be at least 1".to_string(),
        ));
    }

    Ok(SettlementConfig {
        delay: Duration::from_millis(delay_ms),
        max_attempts,
        ..SettlementConfig::default()
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get the public base URL, which must be an absolute http(s) URL. A
/// trailing slash is dropped.
fn get_base_url(key: &str) -> Result<String, ConfigError> {
    let raw = get_required_env(key)?;
    let parsed =
        url::Url::parse(&raw).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must be an http or https URL".to_string(),
        ));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .filter(|url| !url.trim().is_empty())
        .map(SecretString::from)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn get_parsed_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a session secret meets minimum length requirements.
fn validate_session_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SESSION_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SESSION_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real secrets like API keys have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

/// Load and validate a secret that may be absent.
fn get_optional_validated_secret(key: &str) -> Result<Option<SecretString>, ConfigError> {
    match get_optional_env(key).filter(|v| !v.trim().is_empty()) {
        Some(value) => {
            validate_secret_strength(&value, key)?;
            Ok(Some(SecretString::from(value)))
        }
        None => Ok(None),
    }
}
