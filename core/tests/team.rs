//! Team management: invites and enabling/disabling members.

use dualrail_core::{
    clock::ManualClock,
    config::{PortalConfig, SandboxFixtures},
    error::PortalError,
    model::OrgRoleKind,
    portal::Portal,
    sandbox::SandboxBackend,
    team::{InviteForm, UserStatusAction},
};
use std::rc::Rc;

type SandboxPortal = Portal<SandboxBackend>;

fn portal_for(email: &str, password: &str, code: Option<&str>) -> SandboxPortal {
    let clock = Rc::new(ManualClock::at_epoch());
    let sandbox = SandboxBackend::seeded(&SandboxFixtures::default_test(), clock.clone()).unwrap();
    let mut portal = Portal::new(sandbox, PortalConfig::default_test(), clock);
    portal.sign_in(email, password).unwrap();
    if let Some(code) = code {
        portal.verify_mfa(code).unwrap();
    }
    portal
}

fn owner() -> SandboxPortal {
    portal_for("owner@example.com", "correct-horse", Some("123456"))
}

#[test]
fn owner_invites_a_member() {
    let mut portal = owner();
    let mut form = InviteForm::new("new.hire@example.com", OrgRoleKind::Editor);
    form.first_name = "New".into();
    form.last_name = "Hire".into();

    let outcome = portal.invite_member(&form).unwrap();
    assert!(outcome.is_success(), "invite failed: {outcome:?}");

    let members = portal.team_members().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].role, OrgRoleKind::Editor, "editors sort before viewers");
    assert_eq!(members[0].email.as_deref(), Some("new.hire@example.com"));
    assert_eq!(portal.backend().proxy_call_count("create-platform-user", None).unwrap(), 1);
}

#[test]
fn duplicate_invite_reports_backend_error() {
    let mut portal = owner();
    let form = InviteForm::new("member@example.com", OrgRoleKind::Viewer);
    let outcome = portal.invite_member(&form).unwrap();
    assert_eq!(outcome.message(), Some("A user with this email already exists"));
    assert_eq!(portal.journal().count("submission_failed"), 1);
}

#[test]
fn invalid_email_never_leaves_the_portal() {
    let mut portal = owner();
    let err = portal.invite_member(&InviteForm::new("not-an-email", OrgRoleKind::Viewer)).unwrap_err();
    assert!(matches!(err, PortalError::Validation { .. }), "got {err:?}");
    assert!(portal.backend().proxy_calls().unwrap().is_empty());
}

#[test]
fn owner_disables_and_re_enables_a_member() {
    let mut portal = owner();
    let status = |portal: &mut SandboxPortal| {
        portal
            .team_members()
            .unwrap()
            .into_iter()
            .find(|m| m.user_id == "user-member")
            .map(|m| m.status)
            .unwrap()
    };

    let action = UserStatusAction::for_status(&status(&mut portal));
    assert_eq!(action, UserStatusAction::Disable);
    assert!(portal.toggle_member_status("user-member", action).unwrap().is_success());
    assert_eq!(status(&mut portal), "disabled");

    let action = UserStatusAction::for_status(&status(&mut portal));
    assert!(portal.toggle_member_status("user-member", action).unwrap().is_success());
    assert_eq!(status(&mut portal), "active");
}

#[test]
fn nobody_toggles_themselves() {
    let mut portal = owner();
    let err = portal.toggle_member_status("user-owner", UserStatusAction::Disable).unwrap_err();
    assert!(matches!(err, PortalError::Business { .. }), "got {err:?}");
}

#[test]
fn viewers_cannot_manage_the_team() {
    let mut portal = portal_for("member@example.com", "battery-staple", None);
    let err = portal
        .invite_member(&InviteForm::new("x@example.com", OrgRoleKind::Viewer))
        .unwrap_err();
    assert!(matches!(err, PortalError::Auth(_)), "got {err:?}");
    assert!(portal.team_members().is_ok(), "viewers can still see the list");
}
