//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use brnno_core::wizard::{DraftError, WizardError};

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::payments::PaymentError;
use crate::services::places::PlacesError;
use crate::services::settlement::SettlementError;
use crate::services::waitlist::WaitlistError;

/// Shown for failures of the store or an external provider.
pub const GENERIC_MESSAGE: &str = "Something went wrong. Please try again.";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Payment processor call failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Mapping API call failed.
    #[error("Places error: {0}")]
    Places(#[from] PlacesError),

    /// Settlement could not be scheduled.
    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    /// Waitlist signup or lookup failed.
    #[error("Waitlist error: {0}")]
    Waitlist(#[from] WaitlistError),

    /// Wizard submitted out of order or with a stale draft.
    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),

    /// Draft edit carried an unacceptable value.
    #[error("Invalid draft: {0}")]
    Draft(#[from] DraftError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but lacks the role or account type.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request conflicts with the current state of a resource.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An optional integration is not configured.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Database(_) | Self::Internal(_) | Self::Settlement(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Payment(PaymentError::Declined(_)) => StatusCode::PAYMENT_REQUIRED,
            Self::Payment(_) | Self::Places(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) | AuthError::InvalidEmail(_) => StatusCode::BAD_REQUEST,
                AuthError::Provider { .. } | AuthError::Http(_) => StatusCode::BAD_GATEWAY,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Waitlist(err) => match err {
                WaitlistError::InvalidEmail(_) | WaitlistError::MissingName => {
                    StatusCode::BAD_REQUEST
                }
                WaitlistError::UnknownEmail => StatusCode::NOT_FOUND,
                WaitlistError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Wizard(WizardError::NotAtTerminalStep { .. }) => StatusCode::CONFLICT,
            Self::Wizard(WizardError::IncompleteStep { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Draft(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    /// Whether the error is our fault (or a provider's) rather than the
    /// client's.
    fn is_server_side(&self) -> bool {
        matches!(
            self,
            Self::Database(
                RepositoryError::Database(_) | RepositoryError::DataCorruption(_)
            ) | Self::Internal(_)
                | Self::Settlement(_)
                | Self::Waitlist(WaitlistError::Repository(_))
                | Self::Places(_)
                | Self::Payment(
                    PaymentError::Http(_)
                        | PaymentError::Api { .. }
                        | PaymentError::InvalidIntent(_)
                )
                | Self::Auth(
                    AuthError::Provider { .. }
                        | AuthError::Http(_)
                        | AuthError::Repository(_)
                        | AuthError::PasswordHash
                )
        )
    }

    fn client_message(&self) -> String {
        if self.is_server_side() {
            return GENERIC_MESSAGE.to_string();
        }

        match self {
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid email or password".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                _ => GENERIC_MESSAGE.to_string(),
            },
            Self::Payment(PaymentError::Declined(_)) => {
                "Your payment was declined. Please try another card.".to_string()
            }
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(_)) => "Already exists".to_string(),
            Self::Waitlist(WaitlistError::InvalidEmail(_)) => "Invalid email address".to_string(),
            Self::Waitlist(err) => err.to_string(),
            Self::Wizard(err) => err.to_string(),
            Self::Draft(err) => err.to_string(),
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::Conflict(msg)
            | Self::BadRequest(msg)
            | Self::Unavailable(msg) => msg.clone(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_side() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let status = self.status();
        let body = Json(json!({ "error": self.client_message() }));

        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of user actions
/// leading up to an error.
///
/// # Example
///
/// ```rust,ignore
/// add_breadcrumb("booking", "Submitted booking", Some(&[("booking_id", "abc123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("booking-123".to_string());
        assert_eq!(err.to_string(), "Not found: booking-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::RateLimited),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_wizard_errors() {
        assert_eq!(
            get_status(AppError::Wizard(WizardError::NotAtTerminalStep {
                current: 2,
                total: 5
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Wizard(WizardError::IncompleteStep {
                step: 1,
                name: "service"
            })),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Draft(DraftError::UnknownService("99".to_string()))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_waitlist_errors() {
        assert_eq!(
            get_status(AppError::Waitlist(WaitlistError::MissingName)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Waitlist(WaitlistError::UnknownEmail)),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_external_failures_use_generic_message() {
        let err = AppError::Payment(PaymentError::Api {
            status: 500,
            message: "processor exploded at row 12".to_string(),
        });
        assert_eq!(err.client_message(), GENERIC_MESSAGE);

        let err = AppError::Database(RepositoryError::DataCorruption("bad".to_string()));
        assert_eq!(err.client_message(), GENERIC_MESSAGE);

        let err = AppError::Auth(AuthError::InvalidCredentials);
        assert_eq!(err.client_message(), "Invalid email or password");
    }
}
