//! Step-gated wizards.
//!
//! A wizard walks a user through a fixed, numbered sequence of steps while
//! accumulating a draft record. Each non-terminal step owns a completion
//! predicate over the draft; `advance` moves forward only when the current
//! step's predicate holds, `retreat` always moves back, and `reset` returns
//! to step 1 with an empty draft.
//!
//! The machine is quiet about refusals: a blocked advance leaves
//! everything unchanged and reports only that nothing moved. Callers render
//! that as a disabled "Continue" control.
//!
//! Two flows are defined:
//!
//! - [`booking::BookingFlow`] - service, date/time, vehicle + address,
//!   payment, confirm
//! - [`provider::ProviderApplicationFlow`] - business info, services,
//!   verification, banking, review
//!
//! ```
//! use brnno_core::wizard::{Wizard, booking::BookingFlow};
//!
//! let mut wizard = Wizard::<BookingFlow>::new();
//! assert_eq!(wizard.current_step(), 1);
//! assert!(!wizard.advance()); // no service picked yet
//! assert_eq!(wizard.current_step(), 1);
//! ```

pub mod booking;
pub mod provider;

use core::fmt;
use core::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Errors raised when a wizard is asked to produce its final record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    /// Submission is only reachable from the last step.
    #[error("wizard is on step {current} of {total}; submit is only available on the last step")]
    NotAtTerminalStep {
        /// Step the wizard is on.
        current: u8,
        /// Number of steps in the flow.
        total: u8,
    },
    /// A step's predicate no longer holds (the draft was edited after the
    /// step was passed).
    #[error("step {step} ({name}) is incomplete")]
    IncompleteStep {
        /// The failing step.
        step: u8,
        /// Its display name.
        name: &'static str,
    },
}

/// Errors raised when a draft edit carries a value the flow cannot accept.
///
/// These reject the edit itself; they are distinct from an incomplete step,
/// which is never reported beyond a refused advance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    /// The referenced service is not on the menu.
    #[error("unknown service: {0}")]
    UnknownService(String),
    /// The time is not one of the bookable slots.
    #[error("unknown time slot: {0}")]
    UnknownTimeSlot(String),
    /// The date is before today.
    #[error("date {0} is in the past")]
    DateInPast(chrono::NaiveDate),
    /// A free-text field failed a format check.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Field name as sent by the client.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
}

/// A concrete wizard flow: its steps, draft shape and completion predicates.
pub trait Flow {
    /// Accumulated, partially filled record.
    type Draft: Default + Clone + fmt::Debug + Serialize + DeserializeOwned;

    /// Stable name, used as the session key prefix and in logs.
    const NAME: &'static str;

    /// Display names of the steps, in order. The last entry is the terminal
    /// (submit) step.
    const STEPS: &'static [&'static str];

    /// Whether `step` (1-indexed, never the terminal step) is complete.
    fn is_step_complete(step: u8, draft: &Self::Draft) -> bool;

    /// Number of steps in the flow.
    #[must_use]
    fn step_count() -> u8 {
        u8::try_from(Self::STEPS.len()).unwrap_or(u8::MAX)
    }
}

/// Serializable snapshot of a wizard, as stored in a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardState<D> {
    pub current_step: u8,
    pub draft: D,
}

/// A running wizard for flow `F`.
///
/// Invariant: `1 <= current_step <= F::step_count()`.
pub struct Wizard<F: Flow> {
    current_step: u8,
    draft: F::Draft,
    _flow: PhantomData<F>,
}

impl<F: Flow> Wizard<F> {
    /// A fresh wizard on step 1 with an empty draft.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current_step: 1,
            draft: F::Draft::default(),
            _flow: PhantomData,
        }
    }

    /// Rebuild a wizard from a stored snapshot, clamping the step into range.
    #[must_use]
    pub fn from_state(state: WizardState<F::Draft>) -> Self {
        Self {
            current_step: state.current_step.clamp(1, F::step_count()),
            draft: state.draft,
            _flow: PhantomData,
        }
    }

    /// Snapshot for storage.
    #[must_use]
    pub fn to_state(&self) -> WizardState<F::Draft> {
        WizardState {
            current_step: self.current_step,
            draft: self.draft.clone(),
        }
    }

    /// The 1-indexed step the wizard is on.
    #[must_use]
    pub const fn current_step(&self) -> u8 {
        self.current_step
    }

    /// Display name of the current step.
    #[must_use]
    pub fn current_step_name(&self) -> &'static str {
        F::STEPS
            .get(usize::from(self.current_step - 1))
            .copied()
            .unwrap_or_default()
    }

    /// Number of steps in this flow.
    #[must_use]
    pub fn step_count(&self) -> u8 {
        F::step_count()
    }

    /// Whether the wizard is on its last (submit) step.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.current_step == F::step_count()
    }

    /// The draft accumulated so far.
    #[must_use]
    pub const fn draft(&self) -> &F::Draft {
        &self.draft
    }

    /// Mutable access to the draft. Editing never changes the step.
    pub const fn draft_mut(&mut self) -> &mut F::Draft {
        &mut self.draft
    }

    /// Whether `advance` would move forward right now.
    #[must_use]
    pub fn can_advance(&self) -> bool {
        !self.is_terminal() && F::is_step_complete(self.current_step, &self.draft)
    }

    /// Move to the next step if the current step is complete.
    ///
    /// Returns `true` if the step changed. A refused advance is a no-op.
    pub fn advance(&mut self) -> bool {
        if !self.can_advance() {
            return false;
        }
        self.current_step += 1;
        true
    }

    /// Move back one step. Never validates.
    ///
    /// Returns `true` if the step changed (i.e. the wizard was past step 1).
    pub const fn retreat(&mut self) -> bool {
        if self.current_step <= 1 {
            return false;
        }
        self.current_step -= 1;
        true
    }

    /// Return to step 1 and discard the draft.
    pub fn reset(&mut self) {
        self.current_step = 1;
        self.draft = F::Draft::default();
    }

    /// Check that the wizard may be submitted and hand out the draft.
    ///
    /// The wizard must be on its terminal step and every earlier step's
    /// predicate must still hold.
    ///
    /// # Errors
    ///
    /// Returns `WizardError::NotAtTerminalStep` before the last step and
    /// `WizardError::IncompleteStep` for the first step whose predicate
    /// fails.
    pub fn ready_for_submit(&self) -> Result<&F::Draft, WizardError> {
        if !self.is_terminal() {
            return Err(WizardError::NotAtTerminalStep {
                current: self.current_step,
                total: F::step_count(),
            });
        }

        for step in 1..F::step_count() {
            if !F::is_step_complete(step, &self.draft) {
                return Err(WizardError::IncompleteStep {
                    step,
                    name: F::STEPS
                        .get(usize::from(step - 1))
                        .copied()
                        .unwrap_or_default(),
                });
            }
        }

        Ok(&self.draft)
    }
}

impl<F: Flow> Default for Wizard<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: Flow> Clone for Wizard<F> {
    fn clone(&self) -> Self {
        Self {
            current_step: self.current_step,
            draft: self.draft.clone(),
            _flow: PhantomData,
        }
    }
}

impl<F: Flow> fmt::Debug for Wizard<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wizard")
            .field("flow", &F::NAME)
            .field("current_step", &self.current_step)
            .field("draft", &self.draft)
            .finish()
    }
}

/// True when `value` is present and has non-whitespace content.
pub(crate) fn filled(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}
