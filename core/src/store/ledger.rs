use super::{from_millis, to_millis, SandboxStore};
use crate::{
    error::{PortalError, PortalResult},
    model::{Account, Payee, Transaction},
    provider::Provider,
    rails::PaymentRail,
    types::CurrencyCode,
};
use rusqlite::{params, types::Type, OptionalExtension, Row};

fn provider_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Provider> {
    let key: String = row.get(idx)?;
    Provider::from_key(&key).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown provider '{key}'").into(),
        )
    })
}

fn currency_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<CurrencyCode> {
    Ok(CurrencyCode::from(row.get::<_, String>(idx)?))
}

const ACCOUNT_COLUMNS: &str = "account_id, provider_account_id, provider, currency, balance,
    pending_balance, label, iban, account_number, routing_number, sort_code, status";

fn account_from_row(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        provider_account_id: row.get(1)?,
        provider: provider_column(row, 2)?,
        currency: currency_column(row, 3)?,
        balance: row.get(4)?,
        pending_balance: row.get(5)?,
        label: row.get(6)?,
        iban: row.get(7)?,
        account_number: row.get(8)?,
        routing_number: row.get(9)?,
        sort_code: row.get(10)?,
        status: row.get(11)?,
    })
}

const PAYEE_COLUMNS: &str = "payee_id, provider_payee_id, provider, display_name, currency, rail,
    iban, bic, account_number, sort_code, routing_number, bank_name, status";

fn payee_from_row(row: &Row<'_>) -> rusqlite::Result<Payee> {
    let rail: Option<String> = row.get(5)?;
    Ok(Payee {
        id: row.get(0)?,
        provider_payee_id: row.get(1)?,
        provider: provider_column(row, 2)?,
        display_name: row.get(3)?,
        currency: currency_column(row, 4)?,
        rail: rail.as_deref().and_then(PaymentRail::from_code),
        iban: row.get(6)?,
        bic: row.get(7)?,
        account_number: row.get(8)?,
        sort_code: row.get(9)?,
        routing_number: row.get(10)?,
        bank_name: row.get(11)?,
        status: row.get(12)?,
    })
}

impl SandboxStore {
    // ── Accounts ──────────────────────────────────────────────────

    pub fn insert_account(&self, customer_id: &str, account: &Account) -> PortalResult<()> {
        self.conn.execute(
            "INSERT INTO account (account_id, provider_account_id, customer_id, provider, currency,
                balance, pending_balance, label, iban, account_number, routing_number, sort_code, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                account.id,
                account.provider_account_id,
                customer_id,
                account.provider.key(),
                account.currency.as_str(),
                account.balance,
                account.pending_balance,
                account.label,
                account.iban,
                account.account_number,
                account.routing_number,
                account.sort_code,
                account.status,
            ],
        )?;
        Ok(())
    }

    pub fn accounts(&self, customer_id: &str, provider: Provider) -> PortalResult<Vec<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account
             WHERE customer_id = ?1 AND provider = ?2 ORDER BY rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![customer_id, provider.key()], account_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Look an account up by the id a rail would use for it.
    pub fn account_by_rail_id(
        &self,
        customer_id: &str,
        provider: Provider,
        rail_id: &str,
    ) -> PortalResult<Option<Account>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account
             WHERE customer_id = ?1 AND provider = ?2
               AND (account_id = ?3 OR provider_account_id = ?3)"
        );
        Ok(self
            .conn
            .query_row(&sql, params![customer_id, provider.key(), rail_id], account_from_row)
            .optional()?)
    }

    pub fn adjust_balance(&self, account_id: &str, delta: f64) -> PortalResult<()> {
        let changed = self.conn.execute(
            "UPDATE account SET balance = balance + ?1 WHERE account_id = ?2",
            params![delta, account_id],
        )?;
        if changed == 0 {
            return Err(PortalError::UnknownEntity { kind: "account", id: account_id.to_string() });
        }
        Ok(())
    }

    // ── Payees ────────────────────────────────────────────────────

    pub fn insert_payee(&self, customer_id: &str, payee: &Payee) -> PortalResult<()> {
        self.conn.execute(
            "INSERT INTO payee (payee_id, provider_payee_id, customer_id, provider, display_name,
                currency, rail, iban, bic, account_number, sort_code, routing_number, bank_name, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                payee.id,
                payee.provider_payee_id,
                customer_id,
                payee.provider.key(),
                payee.display_name,
                payee.currency.as_str(),
                payee.rail.map(|r| r.code()),
                payee.iban,
                payee.bic,
                payee.account_number,
                payee.sort_code,
                payee.routing_number,
                payee.bank_name,
                payee.status,
            ],
        )?;
        Ok(())
    }

    pub fn payees(&self, customer_id: &str) -> PortalResult<Vec<Payee>> {
        let sql = format!("SELECT {PAYEE_COLUMNS} FROM payee WHERE customer_id = ?1 ORDER BY rowid");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![customer_id], payee_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn payee_by_rail_id(
        &self,
        customer_id: &str,
        provider: Provider,
        rail_id: &str,
    ) -> PortalResult<Option<Payee>> {
        let sql = format!(
            "SELECT {PAYEE_COLUMNS} FROM payee
             WHERE customer_id = ?1 AND provider = ?2
               AND (payee_id = ?3 OR provider_payee_id = ?3)"
        );
        Ok(self
            .conn
            .query_row(&sql, params![customer_id, provider.key(), rail_id], payee_from_row)
            .optional()?)
    }

    // ── Transactions ──────────────────────────────────────────────

    pub fn insert_transaction(&self, customer_id: &str, tx: &Transaction) -> PortalResult<()> {
        self.conn.execute(
            "INSERT INTO ledger_transaction (transaction_id, customer_id, provider, transaction_type,
                status, amount, currency, counterparty_name, description, reference, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                tx.id,
                customer_id,
                tx.provider.key(),
                tx.transaction_type,
                tx.status,
                tx.amount,
                tx.currency.as_str(),
                tx.counterparty_name,
                tx.description,
                tx.reference,
                to_millis(tx.created_at),
            ],
        )?;
        Ok(())
    }

    /// Newest first.
    pub fn transactions(
        &self,
        customer_id: &str,
        provider: Provider,
        offset: usize,
        limit: usize,
    ) -> PortalResult<Vec<Transaction>> {
        let mut stmt = self.conn.prepare(
            "SELECT transaction_id, provider, transaction_type, status, amount, currency,
                    counterparty_name, description, reference, created_at_ms
             FROM ledger_transaction
             WHERE customer_id = ?1 AND provider = ?2
             ORDER BY created_at_ms DESC, rowid DESC
             LIMIT ?3 OFFSET ?4",
        )?;
        let rows = stmt.query_map(
            params![customer_id, provider.key(), limit as i64, offset as i64],
            |row| {
                Ok(Transaction {
                    id: row.get(0)?,
                    provider: provider_column(row, 1)?,
                    transaction_type: row.get(2)?,
                    status: row.get(3)?,
                    amount: row.get(4)?,
                    currency: currency_column(row, 5)?,
                    counterparty_name: row.get(6)?,
                    description: row.get(7)?,
                    reference: row.get(8)?,
                    created_at: from_millis(row.get(9)?),
                })
            },
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
