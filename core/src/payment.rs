//! The send-money wizard: pick a payee, pick a funding account and an
//! amount, review, confirm.
//!
//! RULE: the funding account always matches the payee's currency and
//! provider. Selecting a payee that breaks the match drops the account.
//!
//! RULE: the payload builder is chosen by the funding account's provider.
//! The two rails name the same concepts differently and never share a
//! builder.

use crate::{
    backend::Backend,
    error::{PortalError, PortalResult},
    model::{Account, Payee},
    provider::Provider,
    rails::{default_rail, payment_scheme},
    submission::{self, quote_fee, FeeQuote, HttpMethod, Pressed, ProxyFunction, ProxyRequest},
    types::CustomerId,
    validation::{format_amount_for_api, is_positive_amount, is_reference_valid, parse_amount, reference_hint},
    wizard::{NextStep, WizardController, WizardFlow},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const STEPS: &[&str] = &["Select Payee", "Amount", "Review"];

pub const EU_PAYMENTS_ENDPOINT: &str = "/api/v1/payments";
pub const US_WITHDRAWALS_ENDPOINT: &str = "/withdrawals";

const STEP_PAYEE: usize = 0;
const STEP_AMOUNT: usize = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentDraft {
    pub payee: Option<Payee>,
    pub account: Option<Account>,
    pub amount: String,
    pub reference: String,
    pub purpose: String,
    pub memo: String,
    pub fee: Option<FeeQuote>,
}

impl PaymentDraft {
    pub fn amount_value(&self) -> Option<f64> {
        parse_amount(&self.amount)
    }

    /// Amount plus the quoted fee, when both are known.
    pub fn total_with_fee(&self) -> Option<f64> {
        let amount = self.amount_value()?;
        Some(amount + self.fee.as_ref().map_or(0.0, |q| q.fee))
    }
}

/// Accounts able to fund a payment to `payee`.
pub fn matching_accounts<'a>(accounts: &'a [Account], payee: &Payee) -> Vec<&'a Account> {
    accounts
        .iter()
        .filter(|a| a.currency == payee.currency && a.provider == payee.provider)
        .collect()
}

fn non_blank_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    let value = value.trim();
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

fn eu_payment_body(account: &Account, payee: &Payee, draft: &PaymentDraft) -> Value {
    json!({
        "fromId": account.rail_id(),
        "toId": payee.rail_id(),
        "type": "PAYEE",
        "amount": format_amount_for_api(&draft.amount),
        "currency": account.currency.as_str(),
        "reference": draft.reference.trim(),
        "paymentScheme": payment_scheme(&account.currency),
    })
}

fn us_withdrawal_body(account: &Account, payee: &Payee, draft: &PaymentDraft) -> Value {
    let reference = draft.reference.trim();
    let rail = payee.rail.unwrap_or_else(|| default_rail(&account.currency));
    json!({
        "source_account_id": account.rail_id(),
        "destination_counterparty_id": payee.rail_id(),
        "amount": format_amount_for_api(&draft.amount),
        "currency": account.currency.as_str(),
        "rail": rail.code(),
        "reference": reference,
        "purpose": non_blank_or(&draft.purpose, reference),
        "memo": non_blank_or(&draft.memo, reference),
    })
}

#[derive(Debug, Clone)]
pub struct PaymentWizard {
    customer_id: CustomerId,
    draft: PaymentDraft,
    controller: WizardController,
}

impl PaymentWizard {
    pub fn open(customer_id: impl Into<CustomerId>) -> Self {
        Self {
            customer_id: customer_id.into(),
            draft: PaymentDraft::default(),
            controller: WizardController::new(STEPS),
        }
    }

    /// The "Send" shortcut from a payee row: payee chosen, on the amount step.
    pub fn open_for_payee(customer_id: impl Into<CustomerId>, payee: Payee) -> Self {
        let mut wizard = Self::open(customer_id);
        wizard.select_payee(payee);
        wizard.controller.next(true);
        wizard
    }

    pub fn draft(&self) -> &PaymentDraft {
        &self.draft
    }

    pub fn reset(&mut self) {
        self.draft = PaymentDraft::default();
        self.controller.reset();
    }

    pub fn select_payee(&mut self, payee: Payee) {
        let still_matches = self
            .draft
            .account
            .as_ref()
            .is_some_and(|a| a.currency == payee.currency && a.provider == payee.provider);
        if !still_matches {
            self.draft.account = None;
            self.draft.fee = None;
        }
        self.draft.payee = Some(payee);
    }

    pub fn select_account(&mut self, account: Account) -> PortalResult<()> {
        if let Some(payee) = &self.draft.payee {
            if account.currency != payee.currency || account.provider != payee.provider {
                return Err(PortalError::Validation {
                    step: STEPS[STEP_AMOUNT].to_string(),
                    reason: format!(
                        "{} account cannot pay a {} payee on {}",
                        account.currency,
                        payee.currency,
                        payee.provider.label()
                    ),
                });
            }
        }
        self.draft.account = Some(account);
        self.draft.fee = None;
        Ok(())
    }

    pub fn set_amount(&mut self, amount: &str) {
        self.draft.amount = amount.trim().to_string();
        self.draft.fee = None;
    }

    pub fn set_reference(&mut self, reference: &str) {
        self.draft.reference = reference.to_string();
    }

    pub fn set_purpose(&mut self, purpose: &str) {
        self.draft.purpose = purpose.to_string();
    }

    pub fn set_memo(&mut self, memo: &str) {
        self.draft.memo = memo.to_string();
    }

    pub fn reference_hint(&self) -> Option<&'static str> {
        self.draft.payee.as_ref().and_then(|p| reference_hint(&p.currency))
    }

    pub fn total_with_fee(&self) -> Option<f64> {
        self.draft.total_with_fee()
    }

    /// The advisory fee-quote request for the current account and amount.
    pub fn fee_request(&self) -> Option<ProxyRequest> {
        let account = self.draft.account.as_ref()?;
        if !is_positive_amount(&self.draft.amount) {
            return None;
        }
        Some(ProxyRequest::direct(
            ProxyFunction::CalculateFee,
            json!({
                "customer_id": self.customer_id,
                "transaction_type": "PAYMENT",
                "currency": account.currency.as_str(),
                "amount": format_amount_for_api(&self.draft.amount),
                "provider": account.provider.key(),
            }),
        ))
    }

    /// Press "Next". Leaving the amount step fetches a fee quote; leaving
    /// the review step sends the payment.
    pub fn advance<B: Backend + ?Sized>(&mut self, backend: &mut B) -> PortalResult<Pressed> {
        let leaving_amount = self.controller.is_editing() && self.controller.index() == STEP_AMOUNT;
        let pressed = submission::submit_step(self, backend)?;
        if leaving_amount && matches!(pressed.step, NextStep::Advanced(_)) {
            self.draft.fee = self.fee_request().and_then(|r| quote_fee(backend, &r));
        }
        Ok(pressed)
    }
}

impl WizardFlow for PaymentWizard {
    fn controller(&self) -> &WizardController {
        &self.controller
    }

    fn controller_mut(&mut self) -> &mut WizardController {
        &mut self.controller
    }

    fn step_problem(&self, index: usize) -> Option<String> {
        let d = &self.draft;
        match index {
            STEP_PAYEE => d.payee.is_none().then(|| "Choose a payee".to_string()),
            STEP_AMOUNT => {
                let Some(payee) = d.payee.as_ref() else {
                    return Some("Choose a payee".into());
                };
                if d.account.is_none() {
                    return Some("Choose an account to pay from".into());
                }
                if !is_positive_amount(&d.amount) {
                    return Some("Enter an amount greater than zero".into());
                }
                if !is_reference_valid(&d.reference, &payee.currency) {
                    return Some(
                        reference_hint(&payee.currency)
                            .map(|h| format!("Invalid reference. {h}"))
                            .unwrap_or_else(|| "Reference is required".into()),
                    );
                }
                None
            }
            2 => None,
            _ => Some("No such step".into()),
        }
    }

    fn build_request(&self) -> PortalResult<ProxyRequest> {
        if let Some((index, reason)) =
            (0..STEPS.len()).find_map(|i| self.step_problem(i).map(|r| (i, r)))
        {
            return Err(PortalError::Validation { step: STEPS[index].to_string(), reason });
        }
        let (Some(account), Some(payee)) = (&self.draft.account, &self.draft.payee) else {
            return Err(PortalError::Validation {
                step: STEPS[STEP_AMOUNT].to_string(),
                reason: "Payee and account are required".into(),
            });
        };
        let (endpoint, body) = match account.provider {
            Provider::EuRail => (EU_PAYMENTS_ENDPOINT, eu_payment_body(account, payee, &self.draft)),
            Provider::UsRail => (US_WITHDRAWALS_ENDPOINT, us_withdrawal_body(account, payee, &self.draft)),
        };
        Ok(ProxyRequest::proxied(
            account.provider,
            endpoint,
            HttpMethod::Post,
            &self.customer_id,
            body,
        ))
    }
}
