//! Generic linear stepper shared by every multi-step flow.
//!
//! RULES:
//!   - Steps advance one at a time and only when the current step is valid.
//!   - `next` on the last step starts a submission instead of moving.
//!   - While a submission is in flight, `next` is rejected. The in-flight
//!     state lives here, not in an out-of-band flag.
//!   - The terminal result is left only through `reset`.
//!   - Each submission gets a ticket; `reset` retires it, so a result
//!     for an earlier submission never lands on a later one.

use crate::{
    error::{PortalError, PortalResult},
    submission::{ProxyRequest, SubmissionOutcome},
};

#[derive(Debug, Clone, PartialEq)]
pub enum WizardPhase {
    Editing,
    Submitting,
    Finished(SubmissionOutcome),
}

/// Identifies one submission of one wizard. Returned with
/// `NextStep::Submit` and handed back with the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionTicket(u64);

/// Result of pressing "Next".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Moved to the given step index.
    Advanced(usize),
    /// The current step is not valid; nothing changed.
    Blocked,
    /// Last step confirmed; the caller must now send exactly one request
    /// and report its result with this ticket.
    Submit(SubmissionTicket),
    /// A submission is already running; this press is dropped.
    InFlight,
    /// The wizard already shows its result.
    Finished,
}

impl NextStep {
    pub fn is_submit(&self) -> bool {
        matches!(self, Self::Submit(_))
    }

    pub fn ticket(&self) -> Option<SubmissionTicket> {
        match self {
            Self::Submit(ticket) => Some(*ticket),
            _ => None,
        }
    }
}

/// Result of pressing "Back".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackStep {
    Moved(usize),
    /// Pressed on the first step: the owner should close the wizard.
    Cancel,
    Ignored,
}

#[derive(Debug, Clone)]
pub struct WizardController {
    steps: &'static [&'static str],
    index: usize,
    phase: WizardPhase,
    error: Option<String>,
    generation: u64,
}

impl WizardController {
    pub fn new(steps: &'static [&'static str]) -> Self {
        assert!(!steps.is_empty(), "a wizard needs at least one step");
        Self {
            steps,
            index: 0,
            phase: WizardPhase::Editing,
            error: None,
            generation: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    pub fn step_name(&self) -> &'static str {
        self.steps[self.index]
    }

    pub fn is_last_step(&self) -> bool {
        self.index + 1 == self.steps.len()
    }

    /// "Step x of N", one-based.
    pub fn progress(&self) -> (usize, usize) {
        (self.index + 1, self.steps.len())
    }

    pub fn progress_percent(&self) -> f64 {
        (self.index + 1) as f64 / self.steps.len() as f64 * 100.0
    }

    pub fn phase(&self) -> &WizardPhase {
        &self.phase
    }

    pub fn is_editing(&self) -> bool {
        matches!(self.phase, WizardPhase::Editing)
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.phase, WizardPhase::Submitting)
    }

    pub fn outcome(&self) -> Option<&SubmissionOutcome> {
        match &self.phase {
            WizardPhase::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn next(&mut self, current_step_valid: bool) -> NextStep {
        match self.phase {
            WizardPhase::Submitting => return NextStep::InFlight,
            WizardPhase::Finished(_) => return NextStep::Finished,
            WizardPhase::Editing => {}
        }
        if !current_step_valid {
            return NextStep::Blocked;
        }
        if self.is_last_step() {
            self.error = None;
            self.phase = WizardPhase::Submitting;
            log::debug!("wizard: submitting from step '{}'", self.step_name());
            return NextStep::Submit(SubmissionTicket(self.generation));
        }
        self.index += 1;
        NextStep::Advanced(self.index)
    }

    pub fn back(&mut self) -> BackStep {
        if !self.is_editing() {
            return BackStep::Ignored;
        }
        if self.index == 0 {
            return BackStep::Cancel;
        }
        self.index -= 1;
        self.error = None;
        BackStep::Moved(self.index)
    }

    /// Record the result of the submission `ticket` was issued for.
    pub fn finish(&mut self, ticket: SubmissionTicket, outcome: SubmissionOutcome) -> PortalResult<()> {
        if !self.is_submitting() || ticket.0 != self.generation {
            log::debug!("wizard: dropping result for retired submission {}", ticket.0);
            return Err(PortalError::WizardClosed);
        }
        if let SubmissionOutcome::Failed { message } = &outcome {
            self.error = Some(message.clone());
        }
        self.phase = WizardPhase::Finished(outcome);
        Ok(())
    }

    pub fn reset(&mut self) {
        self.generation += 1;
        self.index = 0;
        self.phase = WizardPhase::Editing;
        self.error = None;
    }
}

/// A concrete wizard: its own draft, step predicates and payload builder,
/// driven by a `WizardController`.
pub trait WizardFlow {
    fn controller(&self) -> &WizardController;

    fn controller_mut(&mut self) -> &mut WizardController;

    /// Why step `index` cannot be left yet, or `None` if it can.
    fn step_problem(&self, index: usize) -> Option<String>;

    /// The single outbound request for the final confirmation.
    fn build_request(&self) -> PortalResult<ProxyRequest>;

    fn step_valid(&self, index: usize) -> bool {
        self.step_problem(index).is_none()
    }

    fn can_proceed(&self) -> bool {
        self.controller().is_editing() && self.step_valid(self.controller().index())
    }

    fn next(&mut self) -> NextStep {
        let valid = self.step_valid(self.controller().index());
        self.controller_mut().next(valid)
    }

    fn back(&mut self) -> BackStep {
        self.controller_mut().back()
    }

    /// Feed back the outcome of the request `build_request` produced.
    /// Results for a submission the wizard has since reset are dropped.
    fn complete(&mut self, ticket: SubmissionTicket, outcome: SubmissionOutcome) -> PortalResult<()> {
        self.controller_mut().finish(ticket, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STEPS: &[&str] = &["One", "Two", "Three"];

    #[test]
    fn blocked_next_leaves_index_alone() {
        let mut w = WizardController::new(STEPS);
        assert_eq!(w.next(false), NextStep::Blocked);
        assert_eq!(w.index(), 0);
        assert!(w.is_editing());
    }

    #[test]
    fn last_step_submits_once() {
        let mut w = WizardController::new(STEPS);
        assert_eq!(w.next(true), NextStep::Advanced(1));
        assert_eq!(w.next(true), NextStep::Advanced(2));
        let ticket = w.next(true).ticket().unwrap();
        assert_eq!(w.next(true), NextStep::InFlight);
        assert_eq!(w.back(), BackStep::Ignored);
        w.finish(ticket, SubmissionOutcome::Succeeded { data: serde_json::Value::Null }).unwrap();
        assert_eq!(w.next(true), NextStep::Finished);
        assert!(w.outcome().is_some_and(|o| o.is_success()));
    }

    #[test]
    fn back_from_first_step_cancels_and_clears_error_otherwise() {
        let mut w = WizardController::new(STEPS);
        assert_eq!(w.back(), BackStep::Cancel);
        w.next(true);
        w.set_error("boom");
        assert_eq!(w.back(), BackStep::Moved(0));
        assert_eq!(w.error(), None);
    }

    #[test]
    fn finish_after_reset_is_rejected() {
        let mut w = WizardController::new(&["Only"]);
        let ticket = w.next(true).ticket().unwrap();
        w.reset();
        let late = w.finish(ticket, SubmissionOutcome::Failed { message: "late".into() });
        assert!(matches!(late, Err(PortalError::WizardClosed)));
        assert_eq!(w.index(), 0);
        assert!(w.is_editing());
    }

    #[test]
    fn result_of_earlier_submission_does_not_land_on_resubmission() {
        let mut w = WizardController::new(&["Only"]);
        let first = w.next(true).ticket().unwrap();
        w.reset();
        let second = w.next(true).ticket().unwrap();
        assert_ne!(first, second);

        let stale = w.finish(first, SubmissionOutcome::Failed { message: "first request timed out".into() });
        assert!(matches!(stale, Err(PortalError::WizardClosed)));
        assert!(w.is_submitting());
        assert_eq!(w.outcome(), None);
        assert_eq!(w.error(), None);

        w.finish(second, SubmissionOutcome::Succeeded { data: serde_json::Value::Null }).unwrap();
        assert!(w.outcome().is_some_and(|o| o.is_success()));
    }

    #[test]
    fn failed_outcome_surfaces_as_error() {
        let mut w = WizardController::new(&["Only"]);
        let ticket = w.next(true).ticket().unwrap();
        w.finish(ticket, SubmissionOutcome::Failed { message: "IBAN: invalid".into() }).unwrap();
        assert_eq!(w.error(), Some("IBAN: invalid"));
        assert_eq!(w.progress(), (1, 1));
    }
}
