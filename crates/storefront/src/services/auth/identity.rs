//! Identity providers.
//!
//! The marketplace never stores credentials of its own in production: the
//! hosted identity toolkit owns them and hands back a stable uid. The local
//! provider keeps argon2 hashes in memory so development and tests can run
//! without an API key.

use std::collections::HashMap;
use std::time::Duration;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::RwLock;
use tracing::instrument;

use brnno_core::{Email, UserId};

use super::AuthError;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Prefix of federated tokens accepted by [`LocalIdentityProvider`].
pub const LOCAL_FEDERATED_PREFIX: &str = "dev:";

/// An authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: UserId,
    pub email: Email,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// External identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_up(&self, email: &Email, password: &str) -> Result<Identity, AuthError>;

    async fn sign_in(&self, email: &Email, password: &str) -> Result<Identity, AuthError>;

    /// Exchange an ID token from a federated provider (Google) for an
    /// identity, creating the account on first use.
    async fn sign_in_with_federated(&self, id_token: &str) -> Result<Identity, AuthError>;

    async fn send_password_reset(&self, email: &Email) -> Result<(), AuthError>;
}

// =============================================================================
// Hosted identity toolkit
// =============================================================================

/// REST client for the hosted identity toolkit.
#[derive(Clone)]
pub struct IdentityToolkitClient {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
    /// Origin sent as `requestUri` on federated sign-in.
    request_uri: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

impl IdentityToolkitClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(api_key: SecretString, request_uri: impl Into<String>) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: IDENTITY_TOOLKIT_URL.to_owned(),
            request_uri: request_uri.into(),
        })
    }

    async fn call<T: for<'de> Deserialize<'de>>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> Result<T, AuthError> {
        let response = self
            .client
            .post(format!("{}/accounts:{method}", self.base_url))
            .query(&[("key", self.api_key.expose_secret())])
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(serde_json::from_str::<ErrorResponse>(&text).map_or_else(
                |_| AuthError::Provider {
                    code: format!("HTTP_{}", status.as_u16()),
                },
                |e| AuthError::from_provider_message(&e.error.message),
            ));
        }

        Ok(response.json().await?)
    }

    fn to_identity(account: AccountResponse) -> Result<Identity, AuthError> {
        Ok(Identity {
            uid: UserId::new(account.local_id),
            email: Email::parse(&account.email)?,
            display_name: account.display_name.filter(|n| !n.trim().is_empty()),
        })
    }
}

#[async_trait]
impl IdentityProvider for IdentityToolkitClient {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(&self, email: &Email, password: &str) -> Result<Identity, AuthError> {
        let body = json!({
            "email": email.as_str(),
            "password": password,
            "returnSecureToken": true,
        });
        Self::to_identity(self.call("signUp", &body).await?)
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(&self, email: &Email, password: &str) -> Result<Identity, AuthError> {
        let body = json!({
            "email": email.as_str(),
            "password": password,
            "returnSecureToken": true,
        });
        Self::to_identity(self.call("signInWithPassword", &body).await?)
    }

    #[instrument(skip_all)]
    async fn sign_in_with_federated(&self, id_token: &str) -> Result<Identity, AuthError> {
        let body = json!({
            "postBody": format!("id_token={id_token}&providerId=google.com"),
            "requestUri": self.request_uri,
            "returnIdpCredential": true,
            "returnSecureToken": true,
        });
        Self::to_identity(self.call("signInWithIdp", &body).await?)
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn send_password_reset(&self, email: &Email) -> Result<(), AuthError> {
        let body = json!({
            "requestType": "PASSWORD_RESET",
            "email": email.as_str(),
        });
        let _: serde_json::Value = self.call("sendOobCode", &body).await?;
        Ok(())
    }
}

// =============================================================================
// Local (development and tests)
// =============================================================================

struct LocalAccount {
    uid: UserId,
    /// `None` for accounts created through federated sign-in.
    password_hash: Option<String>,
    display_name: Option<String>,
}

/// In-memory identity provider with argon2 password hashes.
///
/// Federated tokens are accepted in the form `dev:<email>` and are not
/// verified. Never configured when an identity API key is present.
#[derive(Default)]
pub struct LocalIdentityProvider {
    accounts: RwLock<HashMap<Email, LocalAccount>>,
}

impl LocalIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_up(&self, email: &Email, password: &str) -> Result<Identity, AuthError> {
        let password_hash = hash_password(password)?;

        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(email) {
            return Err(AuthError::UserAlreadyExists);
        }
        let uid = UserId::generate();
        accounts.insert(
            email.clone(),
            LocalAccount {
                uid: uid.clone(),
                password_hash: Some(password_hash),
                display_name: None,
            },
        );

        Ok(Identity {
            uid,
            email: email.clone(),
            display_name: None,
        })
    }

    async fn sign_in(&self, email: &Email, password: &str) -> Result<Identity, AuthError> {
        let accounts = self.accounts.read().await;
        let account = accounts.get(email).ok_or(AuthError::InvalidCredentials)?;
        let hash = account
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        verify_password(password, hash)?;

        Ok(Identity {
            uid: account.uid.clone(),
            email: email.clone(),
            display_name: account.display_name.clone(),
        })
    }

    async fn sign_in_with_federated(&self, id_token: &str) -> Result<Identity, AuthError> {
        let email = id_token
            .strip_prefix(LOCAL_FEDERATED_PREFIX)
            .ok_or(AuthError::InvalidCredentials)?;
        let email = Email::parse(email)?;

        let mut accounts = self.accounts.write().await;
        let account = accounts.entry(email.clone()).or_insert_with(|| LocalAccount {
            uid: UserId::generate(),
            password_hash: None,
            display_name: Some(email.local_part().to_owned()),
        });

        Ok(Identity {
            uid: account.uid.clone(),
            email,
            display_name: account.display_name.clone(),
        })
    }

    async fn send_password_reset(&self, email: &Email) -> Result<(), AuthError> {
        if self.accounts.read().await.contains_key(email) {
            tracing::info!(email = %email, "password reset requested (local provider, no email sent)");
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}
