//! Session-backed wizard plumbing shared by the booking and provider
//! application routes.

use serde::Serialize;
use tower_sessions::Session;

use brnno_core::wizard::{Flow, Wizard, WizardState};

use crate::error::AppError;

/// A wizard loaded from the session under `key`.
pub struct SessionWizard<F: Flow> {
    session: Session,
    key: &'static str,
    pub wizard: Wizard<F>,
}

/// What the client sees of a wizard.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardView<D> {
    pub flow: &'static str,
    pub current_step: u8,
    pub step_name: &'static str,
    pub step_count: u8,
    pub can_advance: bool,
    pub is_terminal: bool,
    pub draft: D,
}

impl<F: Flow> SessionWizard<F> {
    /// Load the wizard, starting a fresh one if the session has none.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the session store fails.
    pub async fn load(session: Session, key: &'static str) -> Result<Self, AppError> {
        let state: Option<WizardState<F::Draft>> = session
            .get(key)
            .await
            .map_err(|e| AppError::Internal(format!("session read failed: {e}")))?;
        let wizard = state.map_or_else(Wizard::new, Wizard::from_state);
        Ok(Self {
            session,
            key,
            wizard,
        })
    }

    /// Write the wizard back to the session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the session store fails.
    pub async fn save(&self) -> Result<(), AppError> {
        self.session
            .insert(self.key, self.wizard.to_state())
            .await
            .map_err(|e| AppError::Internal(format!("session write failed: {e}")))
    }

    /// Client view, with the draft passed through `present`.
    pub fn view<D>(&self, present: impl FnOnce(&F::Draft) -> D) -> WizardView<D> {
        let wizard = &self.wizard;
        WizardView {
            flow: F::NAME,
            current_step: wizard.current_step(),
            step_name: wizard.current_step_name(),
            step_count: wizard.step_count(),
            can_advance: wizard.can_advance(),
            is_terminal: wizard.is_terminal(),
            draft: present(wizard.draft()),
        }
    }
}
