//! Who the signed-in user acts for.
//!
//! RULE: a user is either the account owner of exactly one customer, or
//! an org member of one. Owner wins when both lookups would match.

use crate::{
    backend::Backend,
    model::{Customer, OrgRoleKind},
    provider::{Provider, ProviderConfiguration},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "role", rename_all = "snake_case")]
pub enum Membership {
    Owner,
    Member(OrgRoleKind),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerContext {
    pub customer: Customer,
    pub membership: Membership,
    pub providers: Vec<ProviderConfiguration>,
}

impl CustomerContext {
    pub fn customer_id(&self) -> &str {
        &self.customer.id
    }

    pub fn is_owner(&self) -> bool {
        self.membership == Membership::Owner
    }

    pub fn org_role(&self) -> Option<OrgRoleKind> {
        match self.membership {
            Membership::Owner => None,
            Membership::Member(role) => Some(role),
        }
    }

    pub fn enabled_providers(&self) -> Vec<Provider> {
        self.providers
            .iter()
            .filter(|p| p.is_enabled)
            .map(|p| p.provider)
            .collect()
    }

    pub fn has_provider(&self, provider: Provider) -> bool {
        self.providers
            .iter()
            .any(|p| p.provider == provider && p.is_enabled)
    }

    pub fn can_manage_team(&self) -> bool {
        self.is_owner() || self.org_role() == Some(OrgRoleKind::OrgAdmin)
    }
}

/// Resolve the customer `user_id` acts for. Lookup failures are logged
/// and treated as "no context"; they never abort a sign-in.
pub fn resolve<B: Backend + ?Sized>(backend: &mut B, user_id: &str) -> Option<CustomerContext> {
    let (customer, membership) = match lookup_customer(backend, user_id) {
        Ok(Some(found)) => found,
        Ok(None) => {
            log::warn!("no customer record for user {user_id}");
            return None;
        }
        Err(e) => {
            log::error!("customer lookup failed for user {user_id}: {e}");
            return None;
        }
    };

    let providers = match backend.provider_configurations(&customer.id) {
        Ok(p) => p,
        Err(e) => {
            log::error!("provider lookup failed for customer {}: {e}", customer.id);
            Vec::new()
        }
    };

    log::debug!(
        "resolved customer {} ({:?}) with {} provider(s)",
        customer.id,
        membership,
        providers.len()
    );
    Some(CustomerContext { customer, membership, providers })
}

fn lookup_customer<B: Backend + ?Sized>(
    backend: &mut B,
    user_id: &str,
) -> crate::error::PortalResult<Option<(Customer, Membership)>> {
    if let Some(customer) = backend.customer_by_user(user_id)? {
        return Ok(Some((customer, Membership::Owner)));
    }
    let Some(role) = backend.org_role_by_user(user_id)? else {
        return Ok(None);
    };
    Ok(backend
        .customer_by_id(&role.customer_id)?
        .map(|customer| (customer, Membership::Member(role.role))))
}
