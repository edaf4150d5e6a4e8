//! Inviting org members and enabling/disabling them.

use crate::{
    error::{PortalError, PortalResult},
    model::{OrgRole, OrgRoleKind},
    submission::{ProxyFunction, ProxyRequest},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InviteForm {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: OrgRoleKind,
}

impl Default for InviteForm {
    fn default() -> Self {
        Self {
            email: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            role: OrgRoleKind::Viewer,
        }
    }
}

impl InviteForm {
    pub fn new(email: &str, role: OrgRoleKind) -> Self {
        Self { email: email.trim().to_string(), role, ..Self::default() }
    }

    pub fn is_valid(&self) -> bool {
        let email = self.email.trim();
        !email.is_empty() && email.contains('@')
    }

    pub fn invite_request(&self, customer_id: &str) -> PortalResult<ProxyRequest> {
        if !self.is_valid() {
            return Err(PortalError::Validation {
                step: "Invite".into(),
                reason: "A valid email is required".into(),
            });
        }
        Ok(ProxyRequest::direct(
            ProxyFunction::CreatePlatformUser,
            json!({
                "email": self.email.trim(),
                "firstName": self.first_name.trim(),
                "lastName": self.last_name.trim(),
                "role": self.role.key(),
                "customerId": customer_id,
            }),
        ))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserStatusAction {
    Enable,
    Disable,
}

impl UserStatusAction {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
        }
    }

    /// The action the member list offers for a member in `status`.
    pub fn for_status(status: &str) -> Self {
        if status.eq_ignore_ascii_case("disabled") {
            Self::Enable
        } else {
            Self::Disable
        }
    }
}

pub fn toggle_status_request(user_id: &str, action: UserStatusAction) -> ProxyRequest {
    ProxyRequest::direct(
        ProxyFunction::ToggleUserStatus,
        json!({ "userId": user_id, "action": action.code() }),
    )
}

/// Members sorted admins first, then by email.
pub fn sorted_members(mut members: Vec<OrgRole>) -> Vec<OrgRole> {
    let rank = |r: OrgRoleKind| match r {
        OrgRoleKind::OrgAdmin => 0,
        OrgRoleKind::Approver => 1,
        OrgRoleKind::Editor => 2,
        OrgRoleKind::Viewer => 3,
    };
    members.sort_by(|a, b| {
        rank(a.role)
            .cmp(&rank(b.role))
            .then_with(|| a.email.cmp(&b.email))
    });
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_needs_email() {
        let form = InviteForm::default();
        assert!(form.invite_request("c1").is_err());
        let mut form = InviteForm::new("new@example.com", OrgRoleKind::Editor);
        form.first_name = "New".into();
        let req = form.invite_request("c1").unwrap();
        assert_eq!(req.function, ProxyFunction::CreatePlatformUser);
        assert_eq!(req.body["role"], "editor");
        assert_eq!(req.body["customerId"], "c1");
    }

    #[test]
    fn toggle_offers_opposite_of_status() {
        assert_eq!(UserStatusAction::for_status("disabled"), UserStatusAction::Enable);
        assert_eq!(UserStatusAction::for_status("active"), UserStatusAction::Disable);
        let req = toggle_status_request("u1", UserStatusAction::Disable);
        assert_eq!(req.body, json!({ "userId": "u1", "action": "disable" }));
    }
}
