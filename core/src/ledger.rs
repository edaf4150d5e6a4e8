//! Read-side views over accounts and transactions from both rails.

use crate::{
    backend::Backend,
    error::PortalResult,
    format::normalize_status,
    model::{Account, Transaction},
    provider::Provider,
    types::CurrencyCode,
};
use std::collections::BTreeMap;

const FALLBACK_CURRENCY: &str = "EUR";

/// Accounts across providers, in the order they were loaded.
#[derive(Debug, Clone, Default)]
pub struct AccountBook {
    accounts: Vec<Account>,
}

impl AccountBook {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }

    /// Load every enabled provider's accounts for `customer_id`.
    pub fn load<B: Backend + ?Sized>(
        backend: &mut B,
        customer_id: &str,
        providers: &[Provider],
    ) -> PortalResult<Self> {
        let mut accounts = Vec::new();
        for provider in providers {
            accounts.extend(backend.accounts(customer_id, *provider)?);
        }
        Ok(Self { accounts })
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    pub fn for_provider(&self, provider: Provider) -> impl Iterator<Item = &Account> {
        self.accounts.iter().filter(move |a| a.provider == provider)
    }

    pub fn find(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id == id)
    }

    pub fn balance_by_currency(&self) -> BTreeMap<CurrencyCode, f64> {
        let mut totals = BTreeMap::new();
        for a in &self.accounts {
            let balance = if a.balance.is_finite() { a.balance } else { 0.0 };
            *totals.entry(a.currency.clone()).or_insert(0.0) += balance;
        }
        totals
    }

    /// Currency of the first account loaded.
    pub fn primary_currency(&self) -> CurrencyCode {
        self.accounts
            .first()
            .map(|a| a.currency.clone())
            .unwrap_or_else(|| CurrencyCode::new(FALLBACK_CURRENCY))
    }

    /// Sum across currencies, unconverted. Headline figure only.
    pub fn total_balance(&self) -> f64 {
        self.balance_by_currency().values().sum()
    }
}

fn newest_first(txs: &mut [Transaction]) {
    txs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

/// Newest `limit` transactions across both rails.
pub fn merge_recent(eu: Vec<Transaction>, us: Vec<Transaction>, limit: usize) -> Vec<Transaction> {
    let mut all: Vec<Transaction> = eu.into_iter().chain(us).collect();
    newest_first(&mut all);
    all.truncate(limit);
    all
}

/// Direction from the transaction type, falling back to the description
/// for transfers. Unknown types count as outgoing.
pub fn is_incoming(tx: &Transaction) -> bool {
    match tx.transaction_type.to_uppercase().as_str() {
        "DEPOSIT" | "CREDIT" | "INBOUND" => true,
        "WITHDRAWAL" | "PAYMENT" | "DEBIT" | "OUTBOUND" => false,
        "TRANSFER" => {
            let desc = tx.description.as_deref().unwrap_or_default().to_lowercase();
            desc.starts_with("from:") || desc.contains("received")
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    /// Lowercase status to keep; `None` keeps all.
    pub status: Option<String>,
    pub provider: Option<Provider>,
    pub search: String,
}

impl TransactionFilter {
    pub fn matches(&self, tx: &Transaction) -> bool {
        if let Some(status) = &self.status {
            if normalize_status(Some(&tx.status)) != status.to_lowercase() {
                return false;
            }
        }
        if self.provider.is_some_and(|p| p != tx.provider) {
            return false;
        }
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        [
            tx.counterparty_name.as_deref(),
            tx.description.as_deref(),
            tx.reference.as_deref(),
            Some(tx.transaction_type.as_str()),
        ]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&needle))
    }

    pub fn apply<'a>(&self, txs: &'a [Transaction]) -> Vec<&'a Transaction> {
        txs.iter().filter(|tx| self.matches(tx)).collect()
    }
}

/// "Load more" paging over both rails. Each provider keeps its own offset.
#[derive(Debug, Clone)]
pub struct TransactionPager {
    page_size: usize,
    offsets: Vec<(Provider, usize)>,
    loaded: Vec<Transaction>,
    has_more: bool,
}

impl TransactionPager {
    pub fn new(page_size: usize, providers: &[Provider]) -> Self {
        Self {
            page_size: page_size.max(1),
            offsets: providers.iter().map(|p| (*p, 0)).collect(),
            loaded: Vec::new(),
            has_more: true,
        }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.loaded
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Fetch the next page from every provider. Returns how many rows
    /// were added.
    pub fn load_more<B: Backend + ?Sized>(
        &mut self,
        backend: &mut B,
        customer_id: &str,
    ) -> PortalResult<usize> {
        if !self.has_more {
            return Ok(0);
        }
        let mut any_full = false;
        let mut added = 0;
        for (provider, offset) in self.offsets.iter_mut() {
            let page = backend.transactions(customer_id, *provider, *offset, self.page_size)?;
            any_full |= page.len() >= self.page_size;
            *offset += page.len();
            added += page.len();
            self.loaded.extend(page);
        }
        newest_first(&mut self.loaded);
        self.has_more = any_full;
        log::debug!("loaded {added} transaction(s), more available: {}", self.has_more);
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    fn tx(id: &str, provider: Provider, kind: &str, minutes: i64) -> Transaction {
        Transaction {
            id: id.into(),
            provider,
            transaction_type: kind.into(),
            status: "COMPLETED".into(),
            amount: 10.0,
            currency: CurrencyCode::new("EUR"),
            counterparty_name: None,
            description: None,
            reference: None,
            created_at: DateTime::<Utc>::default() + Duration::minutes(minutes),
        }
    }

    #[test]
    fn recent_merges_newest_first() {
        let eu = vec![tx("e1", Provider::EuRail, "PAYMENT", 1), tx("e2", Provider::EuRail, "PAYMENT", 5)];
        let us = vec![tx("u1", Provider::UsRail, "DEPOSIT", 3)];
        let ids: Vec<String> = merge_recent(eu, us, 2).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["e2", "u1"]);
    }

    #[test]
    fn transfer_direction_reads_description() {
        let mut t = tx("t", Provider::EuRail, "TRANSFER", 0);
        t.description = Some("From: savings".into());
        assert!(is_incoming(&t));
        t.description = Some("To: savings".into());
        assert!(!is_incoming(&t));
        t.description = None;
        assert!(!is_incoming(&t), "unknown transfer defaults to outgoing");
        assert!(is_incoming(&tx("d", Provider::UsRail, "deposit", 0)));
    }

    #[test]
    fn filter_combines_status_provider_and_search() {
        let mut a = tx("a", Provider::EuRail, "PAYMENT", 0);
        a.reference = Some("INV-2024-7".into());
        let b = tx("b", Provider::UsRail, "PAYMENT", 0);
        let all = vec![a, b];
        let f = TransactionFilter {
            status: Some("completed".into()),
            provider: Some(Provider::EuRail),
            search: "inv-2024".into(),
        };
        let hits: Vec<&str> = f.apply(&all).iter().map(|t| t.id.as_str()).collect();
        assert_eq!(hits, vec!["a"]);
    }

    #[test]
    fn balances_group_by_currency() {
        let mk = |cur: &str, bal: f64| Account {
            id: cur.into(),
            provider_account_id: None,
            provider: Provider::EuRail,
            currency: CurrencyCode::new(cur),
            balance: bal,
            pending_balance: 0.0,
            label: None,
            iban: None,
            account_number: None,
            routing_number: None,
            sort_code: None,
            status: "active".into(),
        };
        let book = AccountBook::new(vec![mk("USD", 10.0), mk("EUR", 5.0), mk("USD", 2.5)]);
        assert_eq!(book.balance_by_currency().get(&CurrencyCode::new("USD")), Some(&12.5));
        assert!(book.primary_currency().is("USD"));
        assert_eq!(book.total_balance(), 17.5);
        assert!(AccountBook::default().primary_currency().is("EUR"));
    }
}
