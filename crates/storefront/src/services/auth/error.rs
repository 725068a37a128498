//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] brnno_core::EmailError),

    /// Wrong password, unknown account, or a rejected federated token.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// Password too weak or invalid.
    #[error("password validation failed: {0}")]
    WeakPassword(String),

    /// The identity provider refused the request for another reason.
    #[error("identity provider error: {code}")]
    Provider { code: String },

    /// HTTP request to the identity provider failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,
}

impl AuthError {
    /// Map an identity toolkit error message to an error.
    ///
    /// Messages look like `EMAIL_EXISTS` or
    /// `WEAK_PASSWORD : Password should be at least 6 characters`.
    #[must_use]
    pub fn from_provider_message(message: &str) -> Self {
        let (code, detail) = match message.split_once(" : ") {
            Some((code, detail)) => (code.trim(), Some(detail.trim())),
            None => (message.trim(), None),
        };

        match code {
            "EMAIL_EXISTS" => Self::UserAlreadyExists,
            "INVALID_PASSWORD"
            | "EMAIL_NOT_FOUND"
            | "INVALID_LOGIN_CREDENTIALS"
            | "INVALID_IDP_RESPONSE"
            | "USER_DISABLED" => Self::InvalidCredentials,
            "WEAK_PASSWORD" => Self::WeakPassword(
                detail
                    .unwrap_or("password should be at least 6 characters")
                    .to_owned(),
            ),
            other => Self::Provider {
                code: other.to_owned(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_codes() {
        assert!(matches!(
            AuthError::from_provider_message("EMAIL_EXISTS"),
            AuthError::UserAlreadyExists
        ));
        assert!(matches!(
            AuthError::from_provider_message("INVALID_LOGIN_CREDENTIALS"),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            AuthError::from_provider_message("EMAIL_NOT_FOUND"),
            AuthError::InvalidCredentials
        ));
        assert!(matches!(
            AuthError::from_provider_message("TOO_MANY_ATTEMPTS_TRY_LATER"),
            AuthError::Provider { code } if code == "TOO_MANY_ATTEMPTS_TRY_LATER"
        ));
    }

    #[test]
    fn test_weak_password_keeps_detail() {
        let err = AuthError::from_provider_message(
            "WEAK_PASSWORD : Password should be at least 6 characters",
        );
        let AuthError::WeakPassword(detail) = err else {
            panic!("expected WeakPassword, got {err:?}");
        };
        assert_eq!(detail, "Password should be at least 6 characters");
    }
}
