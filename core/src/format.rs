//! Display helpers shared by every view.

use crate::{model::Payee, model::Transaction, types::CurrencyCode};
use chrono::{DateTime, Datelike, Utc};

/// "EUR 1,234.56". Non-finite amounts render as zero.
pub fn format_currency(amount: f64, currency: &CurrencyCode) -> String {
    let amount = if amount.is_finite() { amount } else { 0.0 };
    let fixed = format!("{:.2}", amount.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let sign = if amount < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{currency} {sign}{grouped}.{cents}")
}

/// "DE89 **** 3000". Short values are shown as-is.
pub fn mask_iban(iban: &str) -> String {
    let chars: Vec<char> = iban.chars().collect();
    if chars.len() <= 8 {
        return iban.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head} **** {tail}")
}

pub fn initials(name: &str) -> String {
    let out: String = name
        .split(' ')
        .filter_map(|w| w.chars().next())
        .flat_map(char::to_uppercase)
        .take(2)
        .collect();
    if out.is_empty() {
        "??".to_string()
    } else {
        out
    }
}

pub fn normalize_status(status: Option<&str>) -> String {
    match status {
        Some(s) if !s.is_empty() => s.to_lowercase(),
        _ => "unknown".to_string(),
    }
}

/// "WITHDRAWAL" -> "Withdrawal".
pub fn format_tx_type(tx_type: &str) -> String {
    let mut chars = tx_type.chars();
    match chars.next() {
        None => "Transaction".to_string(),
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
    }
}

pub fn payee_display_name(payee: &Payee) -> &str {
    let name = payee.display_name.trim();
    if name.is_empty() {
        "Unknown Payee"
    } else {
        name
    }
}

pub fn tx_display_name(tx: &Transaction) -> &str {
    [tx.counterparty_name.as_deref(), tx.description.as_deref()]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .unwrap_or(if tx.transaction_type.is_empty() { "Transaction" } else { tx.transaction_type.as_str() })
}

/// "Just now", "5m ago", "3h ago", "2d ago", else "4 Mar" (with the year
/// when it differs from `now`'s).
pub fn format_relative(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now - at;
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();
    if minutes < 1 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else if days < 7 {
        format!("{days}d ago")
    } else if at.year() != now.year() {
        at.format("%-d %b %Y").to_string()
    } else {
        at.format("%-d %b").to_string()
    }
}
