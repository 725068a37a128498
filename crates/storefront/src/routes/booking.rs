//! Booking wizard and customer booking routes.
//!
//! The wizard lives in the session and may be driven anonymously; only
//! submission needs a signed-in customer.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use chrono::Utc;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use brnno_core::wizard::booking::{
    BookingContext, BookingDraft, BookingDraftPatch, BookingFlow, BookingRecord, ProviderSnapshot,
};
use brnno_core::{ApplicationStatus, BookingId};

use super::wizard::{SessionWizard, WizardView};
use crate::db::bookings::BookingRepository;
use crate::db::providers::ProviderRepository;
use crate::db::users::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::{Booking, ProviderListing, session_keys};
use crate::state::AppState;

type BookingWizard = SessionWizard<BookingFlow>;
type View = Json<WizardView<BookingDraft>>;

/// Build the booking router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/booking", get(show))
        .route("/api/booking/draft", patch(update_draft))
        .route("/api/booking/advance", post(advance))
        .route("/api/booking/retreat", post(retreat))
        .route("/api/booking/reset", post(reset))
        .route("/api/booking/submit", post(submit))
        .route("/api/bookings", get(my_bookings))
        .route("/api/bookings/{id}", get(booking_detail))
}

async fn load(session: Session) -> Result<BookingWizard> {
    BookingWizard::load(session, session_keys::BOOKING_WIZARD).await
}

fn view(wizard: &BookingWizard) -> View {
    Json(wizard.view(Clone::clone))
}

/// Current wizard state.
pub async fn show(session: Session) -> Result<View> {
    Ok(view(&load(session).await?))
}

/// Merge an edit into the draft.
///
/// A chosen provider must be an approved provider; its stored business name
/// replaces whatever name the client sent.
///
/// # Errors
///
/// Returns 400 for unknown services, time slots or providers and for past
/// dates.
#[instrument(skip_all)]
pub async fn update_draft(
    State(state): State<AppState>,
    session: Session,
    Json(mut edit): Json<BookingDraftPatch>,
) -> Result<View> {
    if let Some(chosen) = edit.provider.take() {
        edit.provider = Some(approved_provider(&state, chosen).await?);
    }

    let mut wizard = load(session).await?;
    edit.apply(wizard.wizard.draft_mut(), Utc::now().date_naive())?;
    wizard.save().await?;
    Ok(view(&wizard))
}

async fn approved_provider(state: &AppState, chosen: ProviderSnapshot) -> Result<ProviderSnapshot> {
    let provider = ProviderRepository::new(state.store())
        .get(&chosen.id)
        .await?
        .filter(|p| p.status() == ApplicationStatus::Approved)
        .ok_or_else(|| AppError::BadRequest(format!("unknown provider: {}", chosen.id)))?;

    Ok(ProviderSnapshot {
        name: ProviderListing::from(&provider).name,
        email: provider.record.application.email.clone(),
        id: provider.id,
    })
}

/// Move forward if the current step is complete. A refused advance returns
/// the unchanged state with `canAdvance: false`.
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

/// Persist the booking, schedule settlement and reset the wizard.
///
/// Once the booking is stored it is always queued for settlement. A failure
/// to reset the session afterwards is logged, not returned.
///
/// # Errors
///
/// Returns 401 when signed out, 409 before the confirm step and 422 if an
/// earlier step was invalidated by a later edit.
#[instrument(skip_all)]
pub async fn submit(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Result<(StatusCode, Json<Booking>)> {
    let mut wizard = load(session).await?;
    let draft = wizard.wizard.ready_for_submit()?.clone();

    let customer_name = UserRepository::new(state.store())
        .get(&user.uid)
        .await?
        .map_or_else(|| user.email.clone(), |profile| profile.name());
    let context = BookingContext {
        customer_id: user.uid.clone(),
        customer_email: user.email.clone(),
        customer_name,
        fee_mode: state.config().fee_mode,
    };
    let record = BookingRecord::assemble(&draft, &context)
        .ok_or_else(|| AppError::BadRequest("Booking is incomplete".to_owned()))?;

    let booking = BookingRepository::new(state.store()).create(&record).await?;
    info!(
        booking_id = %booking.id,
        uid = %user.uid,
        total = %record.total_amount,
        platform_fee = %record.platform_fee,
        "booking created"
    );

    state.settlement().enqueue(booking.id.clone())?;

    wizard.wizard.reset();
    if let Err(e) = wizard.save().await {
        warn!(booking_id = %booking.id, error = %e, "could not reset booking wizard");
    }

    Ok((StatusCode::CREATED, Json(booking)))
}

/// The signed-in customer's bookings.
pub async fn my_bookings(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Booking>>> {
    let bookings = BookingRepository::new(state.store())
        .for_customer(&user.uid)
        .await?;
    Ok(Json(bookings))
}

/// A single booking, visible to its customer, its provider and admins.
///
/// # Errors
///
/// Returns 404 both for unknown bookings and for bookings the caller may not
/// see.
pub async fn booking_detail(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<BookingId>,
) -> Result<Json<Booking>> {
    let not_found = || AppError::NotFound("Booking not found".to_owned());
    let booking = BookingRepository::new(state.store())
        .get(&id)
        .await?
        .ok_or_else(not_found)?;

    let visible = user.is_admin() || booking.record.customer_id == user.uid || {
        let profile = UserRepository::new(state.store()).get(&user.uid).await?;
        profile
            .and_then(|p| p.record.provider_application_id)
            .is_some_and(|provider| booking.record.provider_id.as_ref() == Some(&provider))
    };
    if !visible {
        return Err(not_found());
    }
    Ok(Json(booking))
}
