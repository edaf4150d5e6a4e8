//! Counterparty registration on the US rail.

use dualrail_core::{
    clock::ManualClock,
    config::{PortalConfig, SandboxFixtures},
    counterparty::{CounterpartyWizard, ProfileType},
    error::PortalError,
    portal::Portal,
    provider::Provider,
    rails::PaymentRail,
    sandbox::SandboxBackend,
    wizard::{BackStep, NextStep, WizardFlow},
};
use serde_json::Value;
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

fn fill(w: &mut CounterpartyWizard) {
    w.set_profile_type(ProfileType::Business);
    w.set_name("Denver Freight Co");
    w.set_email("billing@denverfreight.example");
    w.set_phone("+13035550123");
    {
        let a = w.address_mut();
        a.line1 = "1700 Lincoln Street, Suite 2400, Attn Accounts Payable".into();
        a.city = "Denver".into();
        a.state = "CO".into();
        a.postal_code = "80203".into();
    }
    w.set_account_number("000987654321");
    w.set_routing_number("102000021");
    w.set_institution_name("US Bank");
    let a = w.institution_address_mut();
    a.line1 = "425 Walnut Street".into();
    a.city = "Cincinnati".into();
}

fn press_through(portal: &mut SandboxPortal, w: &mut CounterpartyWizard) -> NextStep {
    let mut last = NextStep::Blocked;
    for _ in 0..w.controller().step_count() {
        last = portal.create_counterparty(w).unwrap();
    }
    last
}

#[test]
fn five_steps_then_one_request() {
    let mut portal = signed_in();
    let mut w = portal.open_counterparty_wizard().unwrap();
    fill(&mut w);

    assert_eq!(portal.create_counterparty(&mut w).unwrap(), NextStep::Advanced(1));
    assert_eq!(w.controller().step_name(), "Profile");
    assert_eq!(w.controller().progress(), (2, 5));
    for expected in 2..5 {
        assert_eq!(portal.create_counterparty(&mut w).unwrap(), NextStep::Advanced(expected));
    }
    assert_eq!(w.controller().step_name(), "Institution");
    assert!(portal.create_counterparty(&mut w).unwrap().is_submit());
    assert!(w.controller().outcome().is_some_and(|o| o.is_success()));
    assert_eq!(
        portal.backend().proxy_call_count("rail-proxy", Some("/counterparties")).unwrap(),
        1
    );
}

#[test]
fn long_address_line_is_cut_to_35_characters() {
    let mut portal = signed_in();
    let mut w = portal.open_counterparty_wizard().unwrap();
    fill(&mut w);
    assert!(press_through(&mut portal, &mut w).is_submit());

    let call = portal.backend().proxy_calls().unwrap().pop().unwrap();
    let envelope: Value = serde_json::from_str(&call.body).unwrap();
    let body = &envelope["body"];
    let line1 = body["address"]["line1"].as_str().unwrap();
    assert_eq!(line1.chars().count(), 35, "line1 was {line1:?}");
    assert_eq!(line1, "1700 Lincoln Street, Suite 2400, At");
    assert_eq!(body["profile"]["profile_type"], "BUSINESS");
    assert_eq!(body["account_information"]["routing_number"], "102000021");
    assert_eq!(body["institution"]["name"], "US Bank");
}

#[test]
fn created_counterparty_becomes_payable() {
    let mut portal = signed_in();
    let mut w = portal.open_counterparty_wizard().unwrap();
    fill(&mut w);
    press_through(&mut portal, &mut w);

    let created = portal.search_payees("denver").unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].provider, Provider::UsRail);
    assert_eq!(created[0].rail, Some(PaymentRail::Ach));
    assert_eq!(created[0].bank_name.as_deref(), Some("US Bank"));
}

#[test]
fn incomplete_profile_blocks_on_its_step() {
    let mut portal = signed_in();
    let mut w = portal.open_counterparty_wizard().unwrap();
    fill(&mut w);
    w.set_phone("303 555 0123");

    assert_eq!(portal.create_counterparty(&mut w).unwrap(), NextStep::Advanced(1));
    assert_eq!(portal.create_counterparty(&mut w).unwrap(), NextStep::Blocked);
    assert_eq!(w.controller().index(), 1);
    assert!(w.step_problem(1).unwrap().contains("international format"));
    assert!(portal.backend().proxy_calls().unwrap().is_empty());
}

#[test]
fn euro_swift_counterparty_needs_iban_and_bic() {
    let mut portal = signed_in();
    let mut w = portal.open_counterparty_wizard().unwrap();
    fill(&mut w);
    w.set_currency("EUR");
    w.set_rail(PaymentRail::Swift);
    w.set_iban("DE89 3704 0044 0532 0130 00");
    assert!(w.step_problem(3).is_some(), "BIC is mandatory for EUR over SWIFT");

    w.set_bic("cobadeffxxx");
    assert_eq!(w.step_problem(3), None);
    assert!(press_through(&mut portal, &mut w).is_submit());

    let call = portal.backend().proxy_calls().unwrap().pop().unwrap();
    let envelope: Value = serde_json::from_str(&call.body).unwrap();
    let info = &envelope["body"]["account_information"];
    assert_eq!(info["iban"], "DE89370400440532013000");
    assert_eq!(info["swift_bic"], "COBADEFFXXX");
    assert_eq!(envelope["body"]["supported_rails"][0], "SWIFT");
}

#[test]
fn back_from_first_step_cancels() {
    let portal = signed_in();
    let mut w = portal.open_counterparty_wizard().unwrap();
    assert_eq!(w.back(), BackStep::Cancel);
}

#[test]
fn us_rail_must_be_enabled() {
    let mut fixtures = SandboxFixtures::default_test();
    fixtures.customers[0].providers = vec![Provider::EuRail];
    let portal = signed_in_with(fixtures);

    let err = portal.open_counterparty_wizard().unwrap_err();
    assert!(matches!(err, PortalError::Business { .. }), "got {err:?}");
    assert!(portal.open_payee_sheet().is_ok());
}
