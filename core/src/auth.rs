//! Session gate and second-factor state machine.
//!
//! RULE: the assurance level reported by the backend is the only ground
//! truth for "is MFA done". A verify call that errors may still have
//! upgraded the session, so the level is re-read after every attempt.
//!
//! RULE: the customer context is resolved once per successful sign-in,
//! on the transition into `Authenticated`, never on intermediate steps.

use crate::{
    backend::Backend,
    context::{self, CustomerContext},
    error::{PortalError, PortalResult},
    model::{select_factor, FactorStatus, MfaFactor, Session},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

const VERIFY_FAILED: &str = "Verification failed. Please try again with a new code.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthState {
    Anonymous,
    MfaPending {
        factors: Vec<MfaFactor>,
        selected: Option<MfaFactor>,
    },
    /// A challenge/verify round trip is in flight.
    Verifying,
    Authenticated,
    SignedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignInOutcome {
    pub needs_mfa: bool,
}

/// Signs the session out after a stretch with no user activity.
#[derive(Debug, Clone)]
pub struct InactivityTimer {
    timeout: Duration,
    deadline: Option<DateTime<Utc>>,
}

impl InactivityTimer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, deadline: None }
    }

    pub fn arm(&mut self, now: DateTime<Utc>) {
        self.deadline = Some(now + self.timeout);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.deadline
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| now >= d)
    }
}

#[derive(Debug, Clone)]
pub struct AuthMachine {
    state: AuthState,
    session: Option<Session>,
    context: Option<CustomerContext>,
    timer: InactivityTimer,
    code_length: usize,
}

/// Map a sign-in failure to what the login form shows.
pub fn normalize_sign_in_error(error: PortalError) -> PortalError {
    match error {
        PortalError::Auth(message)
            if message.contains("Invalid login") || message.contains("body stream") =>
        {
            PortalError::InvalidCredentials
        }
        PortalError::Auth(message) => PortalError::Auth(message),
        PortalError::Transport { .. } | PortalError::Other(_) => PortalError::InvalidCredentials,
        other => other,
    }
}

fn verified_factors(factors: Vec<MfaFactor>) -> Vec<MfaFactor> {
    factors
        .into_iter()
        .filter(|f| f.status == FactorStatus::Verified)
        .collect()
}

impl AuthMachine {
    pub fn new(session_timeout: Duration, code_length: usize) -> Self {
        Self {
            state: AuthState::Anonymous,
            session: None,
            context: None,
            timer: InactivityTimer::new(session_timeout),
            code_length,
        }
    }

    // ── Read-only state ────────────────────────────────────────────

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn context(&self) -> Option<&CustomerContext> {
        self.context.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    pub fn mfa_required(&self) -> bool {
        matches!(self.state, AuthState::MfaPending { .. } | AuthState::Verifying)
    }

    pub fn selected_factor(&self) -> Option<&MfaFactor> {
        match &self.state {
            AuthState::MfaPending { selected, .. } => selected.as_ref(),
            _ => None,
        }
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        self.timer.deadline()
    }

    // ── Transitions ───────────────────────────────────────────────

    pub fn sign_in<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> PortalResult<SignInOutcome> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(PortalError::InvalidCredentials);
        }
        let session = backend
            .sign_in_with_password(email.trim(), password)
            .map_err(normalize_sign_in_error)?;
        log::info!("password accepted for user {}", session.user_id);
        self.context = None;
        self.state = AuthState::Anonymous;
        self.session = Some(session);
        self.timer.arm(now);
        self.after_primary_auth(backend)
    }

    /// Pick up a session that already exists in the backend.
    pub fn restore_session<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        now: DateTime<Utc>,
    ) -> PortalResult<bool> {
        let Some(session) = backend.current_session()? else {
            self.state = AuthState::Anonymous;
            return Ok(false);
        };
        self.context = None;
        self.session = Some(session);
        self.timer.arm(now);
        self.after_primary_auth(backend)?;
        Ok(true)
    }

    fn after_primary_auth<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> PortalResult<SignInOutcome> {
        let assurance = backend.assurance_level()?;
        if !assurance.needs_second_factor() {
            self.enter_authenticated(backend);
            return Ok(SignInOutcome { needs_mfa: false });
        }

        let factors = verified_factors(backend.list_factors()?.collect());
        let selected = select_factor(&factors).cloned();
        log::info!(
            "second factor required: {} verified factor(s), selected {:?}",
            factors.len(),
            selected.as_ref().map(|f| f.factor_type)
        );
        self.state = AuthState::MfaPending { factors, selected };
        Ok(SignInOutcome { needs_mfa: true })
    }

    fn enter_authenticated<B: Backend + ?Sized>(&mut self, backend: &mut B) {
        self.context = self
            .session
            .as_ref()
            .and_then(|s| context::resolve(backend, &s.user_id));
        self.state = AuthState::Authenticated;
    }

    /// Submit a one-time code for the selected factor.
    pub fn verify_factor<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        code: &str,
        now: DateTime<Utc>,
    ) -> PortalResult<()> {
        let AuthState::MfaPending { selected, .. } = &self.state else {
            return Err(PortalError::MfaNotPending);
        };
        let code = code.trim();
        if code.len() != self.code_length || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(PortalError::Auth(format!(
                "Please enter the full {}-digit code",
                self.code_length
            )));
        }
        let Some(factor) = selected.clone() else {
            return Err(PortalError::NoMfaFactor);
        };

        let pending = std::mem::replace(&mut self.state, AuthState::Verifying);

        let attempt = backend
            .challenge_factor(&factor.id)
            .and_then(|challenge| backend.verify_factor(&factor.id, &challenge.id, code));
        if let Err(e) = &attempt {
            log::warn!("verify for factor {} reported: {e}", factor.id);
        }

        let assurance = match backend.assurance_level() {
            Ok(a) => a,
            Err(e) => {
                self.state = pending;
                return Err(e);
            }
        };

        if assurance.is_full() {
            if let Ok(Some(session)) = backend.current_session() {
                self.session = Some(session);
            }
            self.enter_authenticated(backend);
            self.timer.arm(now);
            log::info!("second factor accepted");
            return Ok(());
        }

        self.state = pending;
        let message = match attempt {
            Err(e) => e.to_string(),
            Ok(()) => VERIFY_FAILED.to_string(),
        };
        Err(PortalError::Auth(message))
    }

    pub fn record_activity(&mut self, now: DateTime<Utc>) {
        if self.session.is_some() {
            self.timer.arm(now);
        }
    }

    /// Sign out if the inactivity deadline has passed. Returns whether it did.
    pub fn check_inactivity<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        now: DateTime<Utc>,
    ) -> bool {
        if self.session.is_none() || !self.timer.is_expired(now) {
            return false;
        }
        log::info!("signing out after inactivity");
        self.sign_out(backend);
        true
    }

    /// Local state is cleared even when the backend call fails.
    pub fn sign_out<B: Backend + ?Sized>(&mut self, backend: &mut B) {
        if let Err(e) = backend.sign_out() {
            log::warn!("backend sign-out failed: {e}");
        }
        self.session = None;
        self.context = None;
        self.timer.cancel();
        self.state = AuthState::SignedOut;
    }

    pub fn reset_password<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        email: &str,
    ) -> PortalResult<()> {
        let email = email.trim();
        if email.is_empty() {
            return Err(PortalError::Validation {
                step: "Reset password".into(),
                reason: "Email is required".into(),
            });
        }
        backend.reset_password_for_email(email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_errors_are_normalized() {
        let e = normalize_sign_in_error(PortalError::Auth("Invalid login credentials".into()));
        assert!(matches!(e, PortalError::InvalidCredentials));
        let e = normalize_sign_in_error(PortalError::Auth("error reading body stream".into()));
        assert!(matches!(e, PortalError::InvalidCredentials));
        let e = normalize_sign_in_error(PortalError::Transport { message: "offline".into() });
        assert!(matches!(e, PortalError::InvalidCredentials));
        let e = normalize_sign_in_error(PortalError::Auth("Email not confirmed".into()));
        assert_eq!(e.to_string(), "Email not confirmed");
    }

    #[test]
    fn timer_expires_at_deadline() {
        let start = DateTime::<Utc>::default();
        let mut t = InactivityTimer::new(Duration::seconds(60));
        assert!(!t.is_expired(start), "unarmed timer never expires");
        t.arm(start);
        assert!(!t.is_expired(start + Duration::seconds(59)));
        assert!(t.is_expired(start + Duration::seconds(60)));
        t.cancel();
        assert!(!t.is_expired(start + Duration::seconds(600)));
    }
}
