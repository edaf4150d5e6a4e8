use super::{SandboxStore, UserRow};
use crate::{
    error::PortalResult,
    model::{Customer, FactorStatus, FactorType, MfaFactor, OrgRole, OrgRoleKind},
    provider::{Provider, ProviderConfiguration},
};
use rusqlite::{params, OptionalExtension, Row};

fn factor_type_from(s: &str) -> FactorType {
    match s {
        "totp" => FactorType::Totp,
        "phone" => FactorType::Phone,
        _ => FactorType::Other,
    }
}

fn factor_status_from(s: &str) -> FactorStatus {
    if s == "verified" {
        FactorStatus::Verified
    } else {
        FactorStatus::Unverified
    }
}

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        user_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        company_name: row.get(4)?,
        customer_type: row.get(5)?,
        country: row.get(6)?,
    })
}

fn org_role_from_row(row: &Row<'_>) -> rusqlite::Result<OrgRole> {
    let role: String = row.get(2)?;
    Ok(OrgRole {
        user_id: row.get(0)?,
        customer_id: row.get(1)?,
        role: OrgRoleKind::from_key(&role).unwrap_or(OrgRoleKind::Viewer),
        email: row.get(3)?,
        status: row.get(4)?,
    })
}

const CUSTOMER_COLUMNS: &str =
    "customer_id, user_id, first_name, last_name, company_name, customer_type, country";

impl SandboxStore {
    // ── Users ─────────────────────────────────────────────────────

    pub fn insert_user(
        &self,
        user_id: &str,
        email: &str,
        password: &str,
        mfa_code: Option<&str>,
    ) -> PortalResult<()> {
        self.conn.execute(
            "INSERT INTO app_user (user_id, email, password, mfa_code) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, email, password, mfa_code],
        )?;
        Ok(())
    }

    pub fn user_by_email(&self, email: &str) -> PortalResult<Option<UserRow>> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, email, password, mfa_code FROM app_user WHERE email = ?1",
                params![email],
                |row| {
                    Ok(UserRow {
                        user_id: row.get(0)?,
                        email: row.get(1)?,
                        password: row.get(2)?,
                        mfa_code: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn mfa_code_for_user(&self, user_id: &str) -> PortalResult<Option<String>> {
        let code = self
            .conn
            .query_row(
                "SELECT mfa_code FROM app_user WHERE user_id = ?1",
                params![user_id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?;
        Ok(code.flatten())
    }

    // ── Factors ───────────────────────────────────────────────────

    pub fn insert_factor(&self, user_id: &str, factor: &MfaFactor) -> PortalResult<()> {
        let factor_type = match factor.factor_type {
            FactorType::Totp => "totp",
            FactorType::Phone => "phone",
            FactorType::Other => "other",
        };
        let status = match factor.status {
            FactorStatus::Verified => "verified",
            FactorStatus::Unverified => "unverified",
        };
        self.conn.execute(
            "INSERT INTO mfa_factor (factor_id, user_id, factor_type, status, friendly_name)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![factor.id, user_id, factor_type, status, factor.friendly_name],
        )?;
        Ok(())
    }

    pub fn factors_for_user(&self, user_id: &str) -> PortalResult<Vec<MfaFactor>> {
        let mut stmt = self.conn.prepare(
            "SELECT factor_id, factor_type, status, friendly_name
             FROM mfa_factor WHERE user_id = ?1 ORDER BY factor_id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            let factor_type: String = row.get(1)?;
            let status: String = row.get(2)?;
            Ok(MfaFactor {
                id: row.get(0)?,
                factor_type: factor_type_from(&factor_type),
                status: factor_status_from(&status),
                friendly_name: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Customers ─────────────────────────────────────────────────

    pub fn insert_customer(&self, customer: &Customer) -> PortalResult<()> {
        self.conn.execute(
            "INSERT INTO customer (customer_id, user_id, first_name, last_name, company_name, customer_type, country)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                customer.id,
                customer.user_id,
                customer.first_name,
                customer.last_name,
                customer.company_name,
                customer.customer_type,
                customer.country,
            ],
        )?;
        Ok(())
    }

    pub fn customer_by_user(&self, user_id: &str) -> PortalResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE user_id = ?1");
        Ok(self.conn.query_row(&sql, params![user_id], customer_from_row).optional()?)
    }

    pub fn customer_by_id(&self, customer_id: &str) -> PortalResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE customer_id = ?1");
        Ok(self.conn.query_row(&sql, params![customer_id], customer_from_row).optional()?)
    }

    // ── Org roles ─────────────────────────────────────────────────

    pub fn upsert_org_role(&self, role: &OrgRole) -> PortalResult<()> {
        self.conn.execute(
            "INSERT INTO org_role (user_id, customer_id, role, email, status)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(user_id) DO UPDATE SET
                customer_id = excluded.customer_id,
                role = excluded.role,
                email = excluded.email,
                status = excluded.status",
            params![role.user_id, role.customer_id, role.role.key(), role.email, role.status],
        )?;
        Ok(())
    }

    pub fn org_role_by_user(&self, user_id: &str) -> PortalResult<Option<OrgRole>> {
        Ok(self
            .conn
            .query_row(
                "SELECT user_id, customer_id, role, email, status FROM org_role WHERE user_id = ?1",
                params![user_id],
                org_role_from_row,
            )
            .optional()?)
    }

    pub fn org_roles_for_customer(&self, customer_id: &str) -> PortalResult<Vec<OrgRole>> {
        let mut stmt = self.conn.prepare(
            "SELECT user_id, customer_id, role, email, status
             FROM org_role WHERE customer_id = ?1 ORDER BY email",
        )?;
        let rows = stmt.query_map(params![customer_id], org_role_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Returns whether a member row was updated.
    pub fn set_org_role_status(&self, user_id: &str, status: &str) -> PortalResult<bool> {
        let changed = self.conn.execute(
            "UPDATE org_role SET status = ?1 WHERE user_id = ?2",
            params![status, user_id],
        )?;
        Ok(changed > 0)
    }

    // ── Providers ─────────────────────────────────────────────────

    pub fn set_provider(&self, customer_id: &str, provider: Provider, enabled: bool) -> PortalResult<()> {
        self.conn.execute(
            "INSERT INTO provider_configuration (customer_id, provider, is_enabled)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(customer_id, provider) DO UPDATE SET is_enabled = excluded.is_enabled",
            params![customer_id, provider.key(), enabled as i32],
        )?;
        Ok(())
    }

    pub fn provider_configurations(&self, customer_id: &str) -> PortalResult<Vec<ProviderConfiguration>> {
        let mut stmt = self.conn.prepare(
            "SELECT provider, is_enabled FROM provider_configuration
             WHERE customer_id = ?1 ORDER BY provider",
        )?;
        let rows = stmt.query_map(params![customer_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i32>(1)? != 0))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (key, is_enabled) = row?;
            match Provider::from_key(&key) {
                Some(provider) => out.push(ProviderConfiguration { provider, is_enabled }),
                None => log::warn!("ignoring unknown provider '{key}' for {customer_id}"),
            }
        }
        Ok(out)
    }
}
