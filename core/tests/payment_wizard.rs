//! Payment wizard end to end: one request per confirmation, per-rail
//! payloads, fee quotes and failure surfacing.

use dualrail_core::{
    clock::ManualClock,
    config::{PortalConfig, SandboxFixtures},
    error::PortalError,
    model::{Account, Payee},
    payment::PaymentWizard,
    portal::Portal,
    sandbox::SandboxBackend,
    submission::{dispatch, SubmissionOutcome},
    wizard::{NextStep, WizardFlow},
};
use serde_json::Value;
use std::rc::Rc;

type SandboxPortal = Portal<SandboxBackend>;

fn signed_in() -> SandboxPortal {
    let clock = Rc::new(ManualClock::at_epoch());
    let sandbox = SandboxBackend::seeded(&SandboxFixtures::default_test(), clock.clone()).unwrap();
    let mut portal = Portal::new(sandbox, PortalConfig::default_test(), clock);
    portal.sign_in("owner@example.com", "correct-horse").unwrap();
    portal.verify_mfa("123456").unwrap();
    portal
}

fn payee(portal: &mut SandboxPortal, id: &str) -> Payee {
    portal.payees().unwrap().into_iter().find(|p| p.id == id).unwrap()
}

fn account(portal: &mut SandboxPortal, id: &str) -> Account {
    portal.accounts().unwrap().find(id).cloned().unwrap()
}

/// Wizard on the review step, ready to confirm.
fn ready(portal: &mut SandboxPortal, payee_id: &str, account_id: &str, amount: &str, reference: &str) -> PaymentWizard {
    let p = payee(portal, payee_id);
    let a = account(portal, account_id);
    let mut wizard = portal.open_payment_for_payee(p).unwrap();
    wizard.select_account(a).unwrap();
    wizard.set_amount(amount);
    wizard.set_reference(reference);
    assert_eq!(portal.submit_payment(&mut wizard).unwrap(), NextStep::Advanced(2));
    wizard
}

fn last_body(portal: &SandboxPortal, function: &str) -> Value {
    let call = portal
        .backend()
        .proxy_calls()
        .unwrap()
        .into_iter()
        .filter(|c| c.function_name == function)
        .last()
        .unwrap_or_else(|| panic!("no {function} call journaled"));
    serde_json::from_str(&call.body).unwrap()
}

#[test]
fn repeated_confirm_sends_one_payment() {
    let mut portal = signed_in();
    let mut wizard = ready(&mut portal, "payee-eur", "acc-eur", "500", "Invoice 42");

    assert!(portal.submit_payment(&mut wizard).unwrap().is_submit());
    assert_eq!(portal.submit_payment(&mut wizard).unwrap(), NextStep::Finished);
    assert_eq!(portal.submit_payment(&mut wizard).unwrap(), NextStep::Finished);

    assert_eq!(
        portal.backend().proxy_call_count("fr-proxy", Some("/api/v1/payments")).unwrap(),
        1,
        "exactly one payment request per confirmation"
    );
    assert_eq!(portal.journal().count("submission_succeeded"), 1);
}

#[test]
fn confirm_while_in_flight_is_dropped() {
    let mut portal = signed_in();
    let mut wizard = ready(&mut portal, "payee-eur", "acc-eur", "500", "Invoice 42");

    // First press has started the submission but no answer has come back.
    assert!(wizard.next().is_submit());
    assert!(wizard.controller().is_submitting());

    assert_eq!(portal.submit_payment(&mut wizard).unwrap(), NextStep::InFlight);
    assert_eq!(portal.backend().proxy_call_count("fr-proxy", None).unwrap(), 0);
    assert_eq!(portal.journal().count("submission_sent"), 0);
}

#[test]
fn eu_payment_uses_camel_case_payload() {
    let mut portal = signed_in();
    let mut wizard = ready(&mut portal, "payee-eur", "acc-eur", "500", "Invoice 42");
    portal.submit_payment(&mut wizard).unwrap();
    assert!(wizard.controller().outcome().is_some_and(|o| o.is_success()));

    let envelope = last_body(&portal, "fr-proxy");
    assert_eq!(envelope["endpoint"], "/api/v1/payments");
    assert_eq!(envelope["method"], "POST");
    assert_eq!(envelope["customerId"], "cust-1");
    let body = &envelope["body"];
    assert_eq!(body["fromId"], "acc-eur");
    assert_eq!(body["toId"], "payee-eur");
    assert_eq!(body["type"], "PAYEE");
    assert_eq!(body["amount"], "500.00", "amounts travel as two-decimal strings");
    assert_eq!(body["currency"], "EUR");
    assert_eq!(body["paymentScheme"], "SCT");
    assert!(body.get("source_account_id").is_none());

    let balance = account(&mut portal, "acc-eur").balance;
    assert!((balance - 4_500.0).abs() < 1e-9, "balance should be debited, got {balance}");
    let recent = portal.recent_transactions().unwrap();
    assert_eq!(recent[0].transaction_type, "PAYMENT");
    assert_eq!(recent[0].status, "PENDING");
}

#[test]
fn us_withdrawal_uses_snake_case_payload() {
    let mut portal = signed_in();
    let mut wizard = ready(&mut portal, "cp-usd", "acc-usd", "1250.5", "INV2024001");
    portal.submit_payment(&mut wizard).unwrap();
    assert!(wizard.controller().outcome().is_some_and(|o| o.is_success()));

    let envelope = last_body(&portal, "rail-proxy");
    assert_eq!(envelope["endpoint"], "/withdrawals");
    let body = &envelope["body"];
    assert_eq!(body["source_account_id"], "acc-usd");
    assert_eq!(body["destination_counterparty_id"], "cp-usd");
    assert_eq!(body["amount"], "1250.50");
    assert_eq!(body["rail"], "ACH");
    assert_eq!(body["purpose"], "INV2024001", "purpose defaults to the reference");
    assert_eq!(body["memo"], "INV2024001");
    assert!(body.get("fromId").is_none());
    assert_eq!(portal.backend().proxy_call_count("fr-proxy", None).unwrap(), 0);
}

#[test]
fn insufficient_funds_surfaces_warning_text() {
    let mut portal = signed_in();
    let mut wizard = ready(&mut portal, "payee-eur", "acc-eur", "6000", "Too much");
    assert!(portal.submit_payment(&mut wizard).unwrap().is_submit());

    let message = wizard.controller().outcome().and_then(|o| o.message()).unwrap();
    assert_eq!(message, "amount: exceeds available balance of 5000.00 EUR");
    assert_eq!(wizard.controller().error(), Some(message));
    assert_eq!(portal.journal().count("submission_failed"), 1);

    let balance = account(&mut portal, "acc-eur").balance;
    assert!((balance - 5_000.0).abs() < 1e-9, "nothing should be booked");
}

#[test]
fn leaving_amount_step_quotes_fee() {
    let mut portal = signed_in();
    let wizard = ready(&mut portal, "payee-eur", "acc-eur", "500", "Invoice 42");

    let fee = wizard.draft().fee.as_ref().map(|q| q.fee).unwrap();
    assert!((fee - 0.5).abs() < 1e-9, "0.1% of 500, got {fee}");
    assert_eq!(wizard.total_with_fee(), Some(500.5));
    assert_eq!(portal.backend().proxy_call_count("calculate-fee", None).unwrap(), 1);
    assert_eq!(portal.journal().count("fee_quoted"), 1);
}

#[test]
fn fee_failure_does_not_block_the_payment() {
    let mut portal = signed_in();
    let p = payee(&mut portal, "payee-eur");
    let a = account(&mut portal, "acc-eur");
    let mut wizard = portal.open_payment_for_payee(p).unwrap();
    wizard.select_account(a).unwrap();
    wizard.set_amount("20");
    wizard.set_reference("Lunch");

    portal.backend_mut().fail_next_invoke("Failed to fetch");
    assert_eq!(portal.submit_payment(&mut wizard).unwrap(), NextStep::Advanced(2));
    assert!(wizard.draft().fee.is_none());
    assert!(portal.submit_payment(&mut wizard).unwrap().is_submit());
    assert!(wizard.controller().outcome().is_some_and(|o| o.is_success()));
}

#[test]
fn transport_failure_is_one_attempt_and_a_message() {
    let mut portal = signed_in();
    let mut wizard = ready(&mut portal, "cp-usd", "acc-usd", "10", "PAYREF01");

    portal
        .backend_mut()
        .fail_next_invoke("Failed to send a request to the Edge Function");
    assert!(portal.submit_payment(&mut wizard).unwrap().is_submit());
    assert_eq!(
        wizard.controller().error(),
        Some("Failed to send a request to the Edge Function")
    );
    assert_eq!(portal.submit_payment(&mut wizard).unwrap(), NextStep::Finished);
    assert_eq!(portal.backend().proxy_call_count("rail-proxy", None).unwrap(), 1);

    wizard.reset();
    assert_eq!(wizard.controller().index(), 0);
    assert!(wizard.controller().is_editing());
    assert!(wizard.draft().payee.is_none());
}

#[test]
fn result_arriving_after_reset_is_dropped() {
    let mut portal = signed_in();
    let mut wizard = ready(&mut portal, "payee-eur", "acc-eur", "500", "Invoice 42");

    let ticket = wizard.next().ticket().unwrap();
    let request = wizard.build_request().unwrap();
    wizard.reset();
    let outcome = dispatch(portal.backend_mut(), &request);

    let late = wizard.complete(ticket, outcome);
    assert!(matches!(late, Err(PortalError::WizardClosed)), "got {late:?}");
    assert!(wizard.controller().outcome().is_none());
    assert_eq!(wizard.controller().error(), None);
}

#[test]
fn stale_result_is_not_taken_for_a_resubmission() {
    let mut portal = signed_in();
    let mut wizard = ready(&mut portal, "payee-eur", "acc-eur", "500", "Invoice 42");

    let first = wizard.next().ticket().unwrap();
    wizard.reset();

    wizard.select_payee(payee(&mut portal, "payee-eur"));
    wizard.select_account(account(&mut portal, "acc-eur")).unwrap();
    wizard.set_amount("250");
    wizard.set_reference("Invoice 43");
    assert_eq!(wizard.next(), NextStep::Advanced(1));
    assert_eq!(wizard.next(), NextStep::Advanced(2));
    let second = wizard.next().ticket().unwrap();
    assert_ne!(first, second);

    let stale = SubmissionOutcome::Failed { message: "Request timed out".into() };
    let late = wizard.complete(first, stale);
    assert!(matches!(late, Err(PortalError::WizardClosed)), "got {late:?}");
    assert!(wizard.controller().is_submitting());
    assert_eq!(wizard.controller().error(), None);

    let request = wizard.build_request().unwrap();
    let outcome = dispatch(portal.backend_mut(), &request);
    wizard.complete(second, outcome).unwrap();
    assert!(wizard.controller().outcome().is_some_and(|o| o.is_success()));
    assert_eq!(last_body(&portal, "fr-proxy")["body"]["amount"], "250.00");
}

#[test]
fn account_must_match_payee() {
    let mut portal = signed_in();
    let p = payee(&mut portal, "payee-eur");
    let usd = account(&mut portal, "acc-usd");
    let mut wizard = portal.open_payment_for_payee(p).unwrap();

    let err = wizard.select_account(usd).unwrap_err();
    assert!(matches!(err, PortalError::Validation { .. }), "got {err:?}");
    assert!(wizard.draft().account.is_none());
}

#[test]
fn invalid_steps_block_without_requests() {
    let mut portal = signed_in();
    let p = payee(&mut portal, "cp-usd");
    let a = account(&mut portal, "acc-usd");
    let mut wizard = portal.open_payment_for_payee(p).unwrap();
    wizard.select_account(a).unwrap();

    wizard.set_amount("0");
    wizard.set_reference("PAYREF01");
    assert_eq!(portal.submit_payment(&mut wizard).unwrap(), NextStep::Blocked);
    assert_eq!(wizard.step_problem(1).as_deref(), Some("Enter an amount greater than zero"));

    wizard.set_amount("10");
    wizard.set_reference("AAAAAA");
    assert_eq!(portal.submit_payment(&mut wizard).unwrap(), NextStep::Blocked);
    assert!(wizard.step_problem(1).unwrap().starts_with("Invalid reference."));

    assert!(portal.backend().proxy_calls().unwrap().is_empty());
}

#[test]
fn sub_cent_amount_blocks_the_amount_step() {
    let mut portal = signed_in();
    let p = payee(&mut portal, "payee-eur");
    let a = account(&mut portal, "acc-eur");
    let mut wizard = portal.open_payment_for_payee(p).unwrap();
    wizard.select_account(a).unwrap();
    wizard.set_reference("Invoice 42");

    wizard.set_amount("0.004");
    assert_eq!(portal.submit_payment(&mut wizard).unwrap(), NextStep::Blocked);
    assert_eq!(wizard.step_problem(1).as_deref(), Some("Enter an amount greater than zero"));
    assert_eq!(wizard.controller().index(), 1);
    assert!(portal.backend().proxy_calls().unwrap().is_empty());

    wizard.set_amount("0.01");
    assert_eq!(portal.submit_payment(&mut wizard).unwrap(), NextStep::Advanced(2));
}

#[test]
fn draft_broken_on_review_fails_without_sending() {
    let mut portal = signed_in();
    let mut wizard = ready(&mut portal, "payee-eur", "acc-eur", "500", "Invoice 42");
    wizard.set_amount("0");

    assert!(portal.submit_payment(&mut wizard).unwrap().is_submit());
    assert_eq!(portal.backend().proxy_call_count("fr-proxy", None).unwrap(), 0);
    assert_eq!(portal.journal().count("submission_sent"), 0);
    assert_eq!(portal.journal().count("submission_failed"), 1);
    assert!(wizard.controller().outcome().is_some_and(|o| !o.is_success()));
}

#[test]
fn payments_need_a_signed_in_customer() {
    let clock = Rc::new(ManualClock::at_epoch());
    let sandbox = SandboxBackend::seeded(&SandboxFixtures::default_test(), clock.clone()).unwrap();
    let portal = Portal::new(sandbox, PortalConfig::default_test(), clock);
    assert!(matches!(portal.open_payment_wizard(), Err(PortalError::NoCustomerContext)));
}
