//! Authentication service.
//!
//! Wraps an [`IdentityProvider`] and makes sure every identity that signs in
//! has a profile document. The result of a successful sign-in is a
//! [`SessionContext`], which handlers store in the session and receive back
//! through extractors; nothing here is global.
//!
//! Sign-ins and sign-outs are broadcast as [`SessionEvent`]s to anyone who
//! called [`AuthService::observe`].

mod error;
pub mod identity;

pub use error::AuthError;
pub use identity::{Identity, IdentityProvider, IdentityToolkitClient, LocalIdentityProvider};

use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use brnno_core::{AccountType, Email, UserId};

use crate::db::users::UserRepository;
use crate::db::{DocumentStore, RepositoryError};
use crate::models::{SessionContext, SessionEvent, UserProfile, UserProfileRecord};

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// A sign-up request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUp {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub account_type: Option<AccountType>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
}

impl SignUp {
    /// Profile for a freshly created identity, carrying the form's extras.
    fn profile_for(&self, identity: &Identity) -> UserProfileRecord {
        let mut record = UserProfileRecord::customer(
            identity.uid.clone(),
            identity.email.to_string(),
            non_blank(self.display_name.as_deref()).or_else(|| identity.display_name.clone()),
        );
        record.account_type = self.account_type.unwrap_or_default();
        record.first_name = non_blank(self.first_name.as_deref());
        record.last_name = non_blank(self.last_name.as_deref());
        record.phone = non_blank(self.phone.as_deref());
        if record.account_type == AccountType::Provider {
            record.business_name = non_blank(self.business_name.as_deref());
        }
        record
    }
}

/// Authentication service.
///
/// Borrowed from application state for the duration of a request.
pub struct AuthService<'a> {
    identity: &'a dyn IdentityProvider,
    users: UserRepository<'a>,
    events: &'a broadcast::Sender<SessionEvent>,
}

impl<'a> AuthService<'a> {
    #[must_use]
    pub const fn new(
        identity: &'a dyn IdentityProvider,
        store: &'a dyn DocumentStore,
        events: &'a broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            identity,
            users: UserRepository::new(store),
            events,
        }
    }

    /// Subscribe to sign-in and sign-out events.
    #[must_use]
    pub fn observe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Create an account and its profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::WeakPassword` for bad
    /// input and `AuthError::UserAlreadyExists` if the email is taken.
    #[instrument(skip(self, request), fields(account_type))]
    pub async fn sign_up(&self, request: &SignUp) -> Result<SessionContext, AuthError> {
        let email = Email::parse(&request.email)?;
        validate_password(&request.password)?;

        let identity = self.identity.sign_up(&email, &request.password).await?;
        let profile = self
            .ensure_profile_with(&identity, || request.profile_for(&identity))
            .await?;
        tracing::Span::current().record("account_type", profile.record.account_type.as_str());

        Ok(self.signed_in(&profile))
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    #[instrument(skip(self, password))]
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SessionContext, AuthError> {
        let email = Email::parse(email)?;
        let identity = self.identity.sign_in(&email, password).await?;
        let profile = self.ensure_profile(&identity).await?;
        Ok(self.signed_in(&profile))
    }

    /// Sign in with a federated ID token.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the provider rejects the
    /// token.
    #[instrument(skip_all)]
    pub async fn sign_in_with_federated(&self, id_token: &str) -> Result<SessionContext, AuthError> {
        let identity = self.identity.sign_in_with_federated(id_token).await?;
        let profile = self.ensure_profile(&identity).await?;
        Ok(self.signed_in(&profile))
    }

    /// Ask the provider to email a reset link.
    ///
    /// Unknown addresses succeed silently so the endpoint does not reveal
    /// which emails have accounts.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` for a malformed address and provider
    /// or transport errors.
    #[instrument(skip(self))]
    pub async fn send_password_reset(&self, email: &str) -> Result<(), AuthError> {
        let email = Email::parse(email)?;
        match self.identity.send_password_reset(&email).await {
            Ok(()) | Err(AuthError::InvalidCredentials) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Announce that `uid` signed out. Clearing the session is the caller's
    /// job.
    pub fn sign_out(&self, uid: &UserId) {
        info!(uid = %uid, "signed out");
        self.emit(SessionEvent::SignedOut(uid.clone()));
    }

    /// Load the profile for `identity`, creating a customer profile if the
    /// identity has none yet.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the store fails.
    pub async fn ensure_profile(&self, identity: &Identity) -> Result<UserProfile, AuthError> {
        self.ensure_profile_with(identity, || {
            UserProfileRecord::customer(
                identity.uid.clone(),
                identity.email.to_string(),
                identity.display_name.clone(),
            )
        })
        .await
    }

    async fn ensure_profile_with(
        &self,
        identity: &Identity,
        fresh: impl FnOnce() -> UserProfileRecord,
    ) -> Result<UserProfile, AuthError> {
        if let Some(profile) = self.users.get(&identity.uid).await? {
            return Ok(profile);
        }

        match self.users.create(&fresh()).await {
            Ok(profile) => {
                info!(uid = %identity.uid, "created user profile");
                Ok(profile)
            }
            // Another request created it first.
            Err(RepositoryError::Conflict(_)) => {
                warn!(uid = %identity.uid, "profile created concurrently");
                self.users
                    .get(&identity.uid)
                    .await?
                    .ok_or(AuthError::Repository(RepositoryError::NotFound))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn signed_in(&self, profile: &UserProfile) -> SessionContext {
        let context = SessionContext::from(profile);
        info!(uid = %context.uid, account_type = %context.account_type, "signed in");
        self.emit(SessionEvent::SignedIn(context.clone()));
        context
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("no session observers");
        }
    }
}

/// Validate password meets requirements.
fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::WeakPassword(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use brnno_core::Role;

    use super::*;
    use crate::db::MemoryDocumentStore;

    struct Fixture {
        identity: LocalIdentityProvider,
        store: MemoryDocumentStore,
        events: broadcast::Sender<SessionEvent>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                identity: LocalIdentityProvider::new(),
                store: MemoryDocumentStore::new(),
                events: broadcast::channel(16).0,
            }
        }

        fn auth(&self) -> AuthService<'_> {
            AuthService::new(&self.identity, &self.store, &self.events)
        }
    }

    fn sign_up(email: &str) -> SignUp {
        SignUp {
            email: email.to_owned(),
            password: "hunter22".to_owned(),
            ..SignUp::default()
        }
    }

    #[tokio::test]
    async fn test_sign_up_creates_customer_profile() {
        let fixture = Fixture::new();
        let auth = fixture.auth();
        let mut events = auth.observe();

        let context = auth.sign_up(&sign_up("Ana@Example.com")).await.unwrap();
        assert_eq!(context.email, "ana@example.com");
        assert_eq!(context.account_type, AccountType::Customer);
        assert_eq!(context.role, Role::User);

        let profile = UserRepository::new(&fixture.store)
            .get(&context.uid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.record.email, "ana@example.com");

        assert_eq!(events.recv().await.unwrap(), SessionEvent::SignedIn(context));
    }

    #[tokio::test]
    async fn test_provider_sign_up_keeps_business_name() {
        let fixture = Fixture::new();
        let request = SignUp {
            account_type: Some(AccountType::Provider),
            business_name: Some("  Shine Co ".to_owned()),
            first_name: Some("Sam".to_owned()),
            ..sign_up("sam@example.com")
        };
        let context = fixture.auth().sign_up(&request).await.unwrap();
        assert!(context.is_provider());

        let profile = UserRepository::new(&fixture.store)
            .get(&context.uid)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.record.business_name.as_deref(), Some("Shine Co"));
        assert_eq!(profile.record.first_name.as_deref(), Some("Sam"));
    }

    #[tokio::test]
    async fn test_sign_up_rejects_short_password() {
        let fixture = Fixture::new();
        let request = SignUp {
            password: "12345".to_owned(),
            ..sign_up("ana@example.com")
        };
        let err = fixture.auth().sign_up(&request).await.unwrap_err();
        assert!(matches!(err, AuthError::WeakPassword(_)));
    }

    #[tokio::test]
    async fn test_sign_in_reads_existing_profile() {
        let fixture = Fixture::new();
        let auth = fixture.auth();
        let created = auth.sign_up(&sign_up("ana@example.com")).await.unwrap();
        UserRepository::new(&fixture.store)
            .set_role(&created.uid, Role::Admin)
            .await
            .unwrap();

        let context = auth.sign_in("ana@example.com", "hunter22").await.unwrap();
        assert_eq!(context.uid, created.uid);
        assert!(context.is_admin());
    }

    #[tokio::test]
    async fn test_federated_creates_profile_once() {
        let fixture = Fixture::new();
        let auth = fixture.auth();
        let first = auth
            .sign_in_with_federated("dev:sam@example.com")
            .await
            .unwrap();
        let second = auth
            .sign_in_with_federated("dev:sam@example.com")
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_password_reset_hides_unknown_accounts() {
        let fixture = Fixture::new();
        let auth = fixture.auth();
        auth.send_password_reset("nobody@example.com").await.unwrap();
        assert!(matches!(
            auth.send_password_reset("not-an-email").await,
            Err(AuthError::InvalidEmail(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_out_is_observed() {
        let fixture = Fixture::new();
        let auth = fixture.auth();
        let mut events = auth.observe();
        let uid = UserId::new("u-1");
        auth.sign_out(&uid);
        assert_eq!(events.recv().await.unwrap(), SessionEvent::SignedOut(uid));
    }
}
