//! Provider application wizard routes.
//!
//! Bank details are masked in every response; the full values stay in the
//! session until submission.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch, post},
};
use tower_sessions::Session;
use tracing::instrument;

use brnno_core::wizard::provider::{
    ProviderApplicationDraft, ProviderApplicationFlow, ProviderApplicationPatch,
};

use super::wizard::{SessionWizard, WizardView};
use crate::db::users::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{ProviderApplication, session_keys};
use crate::services::providers::ProviderService;
use crate::state::AppState;

type ApplicationWizard = SessionWizard<ProviderApplicationFlow>;
type View = Json<WizardView<ProviderApplicationDraft>>;

/// Build the provider application router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/provider-application", get(show))
        .route("/api/provider-application/draft", patch(update_draft))
        .route("/api/provider-application/advance", post(advance))
        .route("/api/provider-application/retreat", post(retreat))
        .route("/api/provider-application/reset", post(reset))
        .route("/api/provider-application/submit", post(submit))
}

async fn load(session: Session) -> Result<ApplicationWizard> {
    ApplicationWizard::load(session, session_keys::PROVIDER_WIZARD).await
}

fn view(wizard: &ApplicationWizard) -> View {
    Json(wizard.view(ProviderApplicationDraft::masked))
}

pub async fn show(session: Session) -> Result<View> {
    Ok(view(&load(session).await?))
}

/// Merge an edit into the draft.
///
/// # Errors
///
/// Returns 400 for malformed EINs, bank numbers and unknown business types.
pub async fn update_draft(
    session: Session,
    Json(edit): Json<ProviderApplicationPatch>,
) -> Result<View> {
    let mut wizard = load(session).await?;
    edit.apply(wizard.wizard.draft_mut())?;
    wizard.save().await?;
    Ok(view(&wizard))
}

pub async fn advance(session: Session) -> Result<View> {
    let mut wizard = load(session).await?;
    if wizard.wizard.advance() {
        wizard.save().await?;
    }
    Ok(view(&wizard))
}

pub async fn retreat(session: Session) -> Result<View> {
    let mut wizard = load(session).await?;
    if wizard.wizard.retreat() {
        wizard.save().await?;
    }
    Ok(view(&wizard))
}

pub async fn reset(session: Session) -> Result<View> {
    let mut wizard = load(session).await?;
    wizard.wizard.reset();
    wizard.save().await?;
    Ok(view(&wizard))
}

/// Submit the application and make the caller a provider account.
///
/// # Errors
///
/// Returns 401 when signed out, 409 before the review step or when the
/// caller already has an application.
#[instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Result<(StatusCode, Json<ProviderApplication>)> {
    let mut wizard = load(session).await?;
    let draft = wizard.wizard.ready_for_submit()?.clone();

    let existing = UserRepository::new(state.store())
        .get(&user.uid)
        .await?
        .and_then(|profile| profile.record.provider_application_id);
    if existing.is_some() {
        return Err(AppError::Conflict(
            "A provider application has already been submitted".to_owned(),
        ));
    }

    let application = ProviderService::new(state.store())
        .submit(&draft, &user)
        .await?;

    wizard.wizard.reset();
    wizard.save().await?;

    Ok((StatusCode::CREATED, Json(application.masked())))
}
