//! The portal root: the one owner of the backend handle, the clock and
//! the auth state machine.
//!
//! RULES:
//!   - Every page-level operation goes through `Portal`.
//!   - Data operations require an authenticated session with a resolved
//!     customer context; without one they fail with `NoCustomerContext`.
//!   - Each submission produces exactly one outbound request and one
//!     journaled outcome.

use crate::{
    auth::{AuthMachine, SignInOutcome},
    backend::Backend,
    clock::Clock,
    config::PortalConfig,
    context::CustomerContext,
    counterparty::CounterpartyWizard,
    error::{PortalError, PortalResult},
    event::{EventJournal, JournalEntry, PortalEvent, SignOutReason, SubmissionKind},
    ledger::{merge_recent, AccountBook, TransactionPager},
    model::{OrgRole, Payee, Transaction},
    payee::{filter_payees, PayeeSheet},
    payment::PaymentWizard,
    provider::Provider,
    submission::{self, dispatch, Pressed, ProxyRequest, SubmissionOutcome},
    team::{self, InviteForm, UserStatusAction},
    wizard::{NextStep, WizardFlow},
};
use chrono::Duration;
use std::rc::Rc;

pub struct Portal<B: Backend> {
    backend: B,
    config: PortalConfig,
    clock: Rc<dyn Clock>,
    auth: AuthMachine,
    journal: EventJournal,
}

impl<B: Backend> Portal<B> {
    pub fn new(backend: B, config: PortalConfig, clock: Rc<dyn Clock>) -> Self {
        let auth = AuthMachine::new(
            Duration::seconds(config.session_timeout_secs),
            config.mfa_code_length,
        );
        Self { backend, config, clock, auth, journal: EventJournal::default() }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthMachine {
        &self.auth
    }

    pub fn events(&self) -> &[JournalEntry] {
        self.journal.entries()
    }

    pub fn journal(&self) -> &EventJournal {
        &self.journal
    }

    fn record(&mut self, event: PortalEvent) {
        self.journal.record(self.clock.now(), event);
    }

    fn record_context(&mut self) {
        let event = match self.auth.context() {
            Some(ctx) => PortalEvent::ContextResolved {
                customer_id: ctx.customer.id.clone(),
                owner: ctx.is_owner(),
                providers: ctx.enabled_providers(),
            },
            None => PortalEvent::ContextMissing {
                user_id: self.auth.session().map(|s| s.user_id.clone()).unwrap_or_default(),
            },
        };
        self.record(event);
    }

    // ── Session ───────────────────────────────────────────────────

    pub fn sign_in(&mut self, email: &str, password: &str) -> PortalResult<SignInOutcome> {
        let now = self.clock.now();
        match self.auth.sign_in(&mut self.backend, email, password, now) {
            Ok(outcome) => {
                let user_id = self.auth.session().map(|s| s.user_id.clone()).unwrap_or_default();
                self.record(PortalEvent::SignedIn { user_id, needs_mfa: outcome.needs_mfa });
                if self.auth.is_authenticated() {
                    self.record_context();
                }
                Ok(outcome)
            }
            Err(e) => {
                self.record(PortalEvent::SignInRejected { reason: e.to_string() });
                Err(e)
            }
        }
    }

    pub fn verify_mfa(&mut self, code: &str) -> PortalResult<()> {
        let now = self.clock.now();
        match self.auth.verify_factor(&mut self.backend, code, now) {
            Ok(()) => {
                let user_id = self.auth.session().map(|s| s.user_id.clone()).unwrap_or_default();
                self.record(PortalEvent::MfaVerified { user_id });
                self.record_context();
                Ok(())
            }
            Err(e) => {
                self.record(PortalEvent::MfaRejected { reason: e.to_string() });
                Err(e)
            }
        }
    }

    /// Resume a session the backend still holds.
    pub fn restore_session(&mut self) -> PortalResult<bool> {
        let now = self.clock.now();
        let restored = self.auth.restore_session(&mut self.backend, now)?;
        if restored && self.auth.is_authenticated() {
            self.record_context();
        }
        Ok(restored)
    }

    pub fn sign_out(&mut self) {
        self.auth.sign_out(&mut self.backend);
        self.record(PortalEvent::SignedOut { reason: SignOutReason::User });
    }

    pub fn reset_password(&mut self, email: &str) -> PortalResult<()> {
        self.auth.reset_password(&mut self.backend, email)
    }

    /// User activity: pushes the inactivity deadline out.
    pub fn touch(&mut self) {
        self.auth.record_activity(self.clock.now());
    }

    /// Sign out if the inactivity deadline has passed.
    pub fn tick_inactivity(&mut self) -> bool {
        let now = self.clock.now();
        let expired = self.auth.check_inactivity(&mut self.backend, now);
        if expired {
            self.record(PortalEvent::SignedOut { reason: SignOutReason::Inactivity });
        }
        expired
    }

    // ── Context ───────────────────────────────────────────────────

    pub fn context(&self) -> PortalResult<&CustomerContext> {
        if !self.auth.is_authenticated() {
            return Err(PortalError::NoCustomerContext);
        }
        self.auth.context().ok_or(PortalError::NoCustomerContext)
    }

    fn customer_and_providers(&self) -> PortalResult<(String, Vec<Provider>)> {
        let ctx = self.context()?;
        Ok((ctx.customer.id.clone(), ctx.enabled_providers()))
    }

    fn require_provider(&self, provider: Provider) -> PortalResult<String> {
        let ctx = self.context()?;
        if !ctx.has_provider(provider) {
            return Err(PortalError::Business {
                message: format!("{} is not enabled for this customer", provider.label()),
            });
        }
        Ok(ctx.customer.id.clone())
    }

    // ── Reads ─────────────────────────────────────────────────────

    pub fn accounts(&mut self) -> PortalResult<AccountBook> {
        let (customer_id, providers) = self.customer_and_providers()?;
        AccountBook::load(&mut self.backend, &customer_id, &providers)
    }

    pub fn payees(&mut self) -> PortalResult<Vec<Payee>> {
        let (customer_id, providers) = self.customer_and_providers()?;
        let mut payees = self.backend.payees(&customer_id)?;
        payees.retain(|p| providers.contains(&p.provider));
        Ok(payees)
    }

    pub fn search_payees(&mut self, query: &str) -> PortalResult<Vec<Payee>> {
        let payees = self.payees()?;
        Ok(filter_payees(&payees, query).into_iter().cloned().collect())
    }

    /// Newest activity across both rails, for the dashboard.
    pub fn recent_transactions(&mut self) -> PortalResult<Vec<Transaction>> {
        let (customer_id, providers) = self.customer_and_providers()?;
        let limit = self.config.recent_transactions_limit;
        let mut eu = Vec::new();
        let mut us = Vec::new();
        for provider in providers {
            let rows = self.backend.transactions(&customer_id, provider, 0, limit)?;
            match provider {
                Provider::EuRail => eu = rows,
                Provider::UsRail => us = rows,
            }
        }
        Ok(merge_recent(eu, us, limit))
    }

    /// A fresh pager over the customer's transactions.
    pub fn transactions_pager(&self) -> PortalResult<TransactionPager> {
        let (_, providers) = self.customer_and_providers()?;
        Ok(TransactionPager::new(self.config.transactions_page_size, &providers))
    }

    /// Load the next page into `pager`. Returns how many rows arrived.
    pub fn transactions_page(&mut self, pager: &mut TransactionPager) -> PortalResult<usize> {
        let (customer_id, _) = self.customer_and_providers()?;
        pager.load_more(&mut self.backend, &customer_id)
    }

    pub fn team_members(&mut self) -> PortalResult<Vec<OrgRole>> {
        let (customer_id, _) = self.customer_and_providers()?;
        Ok(team::sorted_members(self.backend.org_roles_for_customer(&customer_id)?))
    }

    // ── Wizards ───────────────────────────────────────────────────

    pub fn open_payment_wizard(&self) -> PortalResult<PaymentWizard> {
        Ok(PaymentWizard::open(self.context()?.customer.id.clone()))
    }

    pub fn open_payment_for_payee(&self, payee: Payee) -> PortalResult<PaymentWizard> {
        Ok(PaymentWizard::open_for_payee(self.context()?.customer.id.clone(), payee))
    }

    pub fn open_counterparty_wizard(&self) -> PortalResult<CounterpartyWizard> {
        Ok(CounterpartyWizard::new(self.require_provider(Provider::UsRail)?))
    }

    pub fn open_payee_sheet(&self) -> PortalResult<PayeeSheet> {
        Ok(PayeeSheet::new(self.require_provider(Provider::EuRail)?))
    }

    /// Press "Next" on the payment wizard.
    pub fn submit_payment(&mut self, wizard: &mut PaymentWizard) -> PortalResult<NextStep> {
        self.context()?;
        let had_fee = wizard.draft().fee.is_some();
        let pressed = wizard.advance(&mut self.backend)?;
        if let (false, Some(quote)) = (had_fee, wizard.draft().fee.as_ref()) {
            let fee = quote.fee;
            self.record(PortalEvent::FeeQuoted { fee });
        }
        self.record_step(SubmissionKind::Payment, pressed, wizard);
        Ok(pressed.step)
    }

    /// Press "Next" on the counterparty wizard.
    pub fn create_counterparty(&mut self, wizard: &mut CounterpartyWizard) -> PortalResult<NextStep> {
        self.require_provider(Provider::UsRail)?;
        let pressed = submission::submit_step(wizard, &mut self.backend)?;
        self.record_step(SubmissionKind::Counterparty, pressed, wizard);
        Ok(pressed.step)
    }

    /// Confirm the payee sheet.
    pub fn create_payee(&mut self, sheet: &mut PayeeSheet) -> PortalResult<NextStep> {
        self.require_provider(Provider::EuRail)?;
        let pressed = submission::submit_step(sheet, &mut self.backend)?;
        self.record_step(SubmissionKind::Payee, pressed, sheet);
        Ok(pressed.step)
    }

    fn record_step<W: WizardFlow + ?Sized>(&mut self, kind: SubmissionKind, pressed: Pressed, wizard: &W) {
        if !pressed.step.is_submit() {
            return;
        }
        if let Some(function) = pressed.sent {
            let function = function.name().to_string();
            self.record(PortalEvent::SubmissionSent { kind, function });
        }
        if let Some(outcome) = wizard.controller().outcome().cloned() {
            self.record_outcome(kind, &outcome);
        }
    }

    fn record_outcome(&mut self, kind: SubmissionKind, outcome: &SubmissionOutcome) {
        let event = match outcome {
            SubmissionOutcome::Succeeded { .. } => PortalEvent::SubmissionSucceeded { kind },
            SubmissionOutcome::Failed { message } => {
                PortalEvent::SubmissionFailed { kind, message: message.clone() }
            }
        };
        self.record(event);
    }

    // ── Team ──────────────────────────────────────────────────────

    fn require_team_admin(&self) -> PortalResult<String> {
        let ctx = self.context()?;
        if !ctx.can_manage_team() {
            return Err(PortalError::Auth(
                "Only the account owner or an org admin can manage the team".into(),
            ));
        }
        Ok(ctx.customer.id.clone())
    }

    fn send(&mut self, kind: SubmissionKind, request: &ProxyRequest) -> SubmissionOutcome {
        self.record(PortalEvent::SubmissionSent { kind, function: request.function.name().to_string() });
        let outcome = dispatch(&mut self.backend, request);
        self.record_outcome(kind, &outcome);
        outcome
    }

    pub fn invite_member(&mut self, form: &InviteForm) -> PortalResult<SubmissionOutcome> {
        let customer_id = self.require_team_admin()?;
        let request = form.invite_request(&customer_id)?;
        Ok(self.send(SubmissionKind::Invite, &request))
    }

    pub fn toggle_member_status(
        &mut self,
        user_id: &str,
        action: UserStatusAction,
    ) -> PortalResult<SubmissionOutcome> {
        self.require_team_admin()?;
        if self.auth.session().is_some_and(|s| s.user_id == user_id) {
            return Err(PortalError::Business { message: "You cannot change your own status".into() });
        }
        let request = team::toggle_status_request(user_id, action);
        Ok(self.send(SubmissionKind::MemberStatus, &request))
    }
}
