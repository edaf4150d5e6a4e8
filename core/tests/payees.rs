//! Saved payees on the EU rail: creation, server rejections, search.

use dualrail_core::{
    clock::ManualClock,
    config::{PortalConfig, SandboxFixtures},
    portal::Portal,
    provider::Provider,
    sandbox::SandboxBackend,
    submission::{dispatch, HttpMethod, ProxyRequest, SubmissionOutcome},
    wizard::{NextStep, WizardFlow},
};
use serde_json::{json, Value};
use std::rc::Rc;

type SandboxPortal = Portal<SandboxBackend>;

fn signed_in_with(fixtures: SandboxFixtures) -> SandboxPortal {
    let clock = Rc::new(ManualClock::at_epoch());
    let sandbox = SandboxBackend::seeded(&fixtures, clock.clone()).unwrap();
    let mut portal = Portal::new(sandbox, PortalConfig::default_test(), clock);
    portal.sign_in("owner@example.com", "correct-horse").unwrap();
    portal.verify_mfa("123456").unwrap();
    portal
}

fn signed_in() -> SandboxPortal {
    signed_in_with(SandboxFixtures::default_test())
}

fn last_envelope(portal: &SandboxPortal) -> Value {
    let call = portal.backend().proxy_calls().unwrap().pop().unwrap();
    serde_json::from_str(&call.body).unwrap()
}

#[test]
fn euro_payee_is_created_and_searchable() {
    let mut portal = signed_in();
    let mut sheet = portal.open_payee_sheet().unwrap();
    sheet.set_name("Lyon Textiles SARL");
    sheet.set_iban("fr76 3000 6000 0112 3456 7890 189");

    assert!(portal.create_payee(&mut sheet).unwrap().is_submit());
    assert!(sheet.controller().outcome().is_some_and(|o| o.is_success()));

    let envelope = last_envelope(&portal);
    assert_eq!(envelope["endpoint"], "/api/v1/payees");
    let body = &envelope["body"];
    assert_eq!(body["bankDetails"]["iban"], "FR7630006000011234567890189");
    assert_eq!(body["address"]["addressLine1"], "N/A", "blank address gets placeholders");
    assert_eq!(body["address"]["country"], "GB");

    let found = portal.search_payees("lyon").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].provider, Provider::EuRail);
}

#[test]
fn sterling_payee_sends_sort_code_and_account_number() {
    let mut portal = signed_in();
    let mut sheet = portal.open_payee_sheet().unwrap();
    sheet.set_currency("GBP");
    sheet.set_name("Leeds Logistics");
    sheet.set_sort_code("20-00-00");
    sheet.set_account_number("5544 3322");

    assert!(portal.create_payee(&mut sheet).unwrap().is_submit());
    let bank = last_envelope(&portal)["body"]["bankDetails"].clone();
    assert_eq!(bank, json!({ "accountNumber": "55443322", "sortCode": "200000" }));
}

#[test]
fn switching_currency_drops_bank_details() {
    let portal = signed_in();
    let mut sheet = portal.open_payee_sheet().unwrap();
    sheet.set_iban("DE89370400440532013000");
    sheet.set_currency("USD");
    assert!(sheet.form().bank.iban.is_empty());
    sheet.set_name("Anyone");
    assert_eq!(sheet.step_problem(0).as_deref(), Some("Account number is required"));
}

#[test]
fn missing_iban_blocks_locally() {
    let mut portal = signed_in();
    let mut sheet = portal.open_payee_sheet().unwrap();
    sheet.set_name("No Bank Yet");

    assert_eq!(portal.create_payee(&mut sheet).unwrap(), NextStep::Blocked);
    assert_eq!(sheet.step_problem(0).as_deref(), Some("IBAN is required"));
    assert!(portal.backend().proxy_calls().unwrap().is_empty());
}

#[test]
fn server_rejection_names_the_field() {
    let mut portal = signed_in();
    let request = ProxyRequest::proxied(
        Provider::EuRail,
        "/api/v1/payees",
        HttpMethod::Post,
        "cust-1",
        json!({ "name": "Half Filled", "currency": "EUR", "bankDetails": {} }),
    );

    let outcome = dispatch(portal.backend_mut(), &request);
    assert_eq!(
        outcome,
        SubmissionOutcome::Failed { message: "bankDetails.iban: must not be blank".into() }
    );
}

#[test]
fn search_covers_name_bank_and_account_number() {
    let mut portal = signed_in();
    assert_eq!(portal.search_payees("").unwrap().len(), 2);
    assert_eq!(portal.search_payees("COMMERZ").unwrap()[0].id, "payee-eur");
    assert_eq!(portal.search_payees("123456789").unwrap()[0].id, "cp-usd");
    assert!(portal.search_payees("nothing like this").unwrap().is_empty());
}

#[test]
fn payees_follow_enabled_providers() {
    let mut fixtures = SandboxFixtures::default_test();
    fixtures.customers[0].providers = vec![Provider::EuRail];
    let mut portal = signed_in_with(fixtures);

    let payees = portal.payees().unwrap();
    assert_eq!(payees.len(), 1);
    assert_eq!(payees[0].id, "payee-eur");
}
