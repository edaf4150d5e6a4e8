//! Field-level sanitizers and validators shared by every wizard.
//!
//! Sanitizers mirror what the input widgets do while typing (strip,
//! uppercase, cap). Validators answer "may this field leave its step".

use crate::types::CurrencyCode;

/// Wire messages cap a postal address line at this many characters.
pub const ADDRESS_LINE_MAX: usize = 35;

/// Longest domestic (ACH / Faster Payments) reference accepted.
pub const DOMESTIC_REFERENCE_MAX: usize = 17;

/// Minimum alphanumeric content of a domestic reference.
pub const DOMESTIC_REFERENCE_MIN_ALNUM: usize = 6;

/// Longest free-text (SEPA and other) reference accepted.
pub const FREE_REFERENCE_MAX: usize = 140;

/// Separators a domestic reference may contain besides letters and digits.
const REFERENCE_SEPARATORS: [char; 4] = ['-', '.', '&', '/'];

/// Uppercase and strip all whitespace.
pub fn normalize_iban(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Keep ASCII digits only, capped at `max` of them.
pub fn digits_only(raw: &str, max: usize) -> String {
    raw.chars().filter(char::is_ascii_digit).take(max).collect()
}

pub fn sanitize_sort_code(raw: &str) -> String {
    digits_only(raw, 6)
}

pub fn sanitize_uk_account_number(raw: &str) -> String {
    digits_only(raw, 8)
}

pub fn sanitize_routing_number(raw: &str) -> String {
    digits_only(raw, 9)
}

/// Uppercase, drop whitespace, cap at 11 characters.
pub fn normalize_bic(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .take(11)
        .collect()
}

/// 8 or 11 alphanumerics.
pub fn is_valid_bic(bic: &str) -> bool {
    matches!(bic.len(), 8 | 11) && bic.chars().all(|c| c.is_ascii_alphanumeric())
}

pub fn is_valid_sort_code(sort_code: &str) -> bool {
    sort_code.len() == 6 && sort_code.chars().all(|c| c.is_ascii_digit())
}

pub fn is_valid_uk_account_number(account_number: &str) -> bool {
    (1..=8).contains(&account_number.len()) && account_number.chars().all(|c| c.is_ascii_digit())
}

pub fn is_valid_routing_number(routing: &str) -> bool {
    routing.len() == 9 && routing.chars().all(|c| c.is_ascii_digit())
}

/// `+` followed by 8 to 15 digits.
pub fn is_e164_phone(phone: &str) -> bool {
    match phone.strip_prefix('+') {
        Some(rest) => (8..=15).contains(&rest.len()) && rest.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Cut an address line to the wire limit without splitting a character.
pub fn truncate_line1(line: &str) -> String {
    line.chars().take(ADDRESS_LINE_MAX).collect()
}

pub fn not_blank(value: &str) -> bool {
    !value.trim().is_empty()
}

fn uses_domestic_reference_rules(currency: &CurrencyCode) -> bool {
    currency.is("USD") || currency.is("GBP")
}

/// Whether `reference` is acceptable for a payment in `currency`.
///
/// USD/GBP references travel over ACH / Faster Payments and must carry at
/// least six alphanumerics, at most 17 characters in total, more than one
/// distinct character, and nothing outside letters, digits, whitespace and
/// `- . & /`. Everything else takes free text up to 140 characters.
pub fn is_reference_valid(reference: &str, currency: &CurrencyCode) -> bool {
    if reference.trim().is_empty() {
        return false;
    }

    if !uses_domestic_reference_rules(currency) {
        return reference.chars().count() <= FREE_REFERENCE_MAX;
    }

    let is_separator = |c: char| c.is_whitespace() || REFERENCE_SEPARATORS.contains(&c);
    let alnum: Vec<char> = reference.chars().filter(|c| !is_separator(*c)).collect();

    if alnum.len() < DOMESTIC_REFERENCE_MIN_ALNUM {
        return false;
    }
    if reference.chars().count() > DOMESTIC_REFERENCE_MAX {
        return false;
    }

    let first = alnum[0].to_ascii_lowercase();
    if alnum.iter().all(|c| c.to_ascii_lowercase() == first) {
        return false;
    }

    reference
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || is_separator(c))
}

/// Input hint shown under the reference field.
pub fn reference_hint(currency: &CurrencyCode) -> Option<&'static str> {
    if uses_domestic_reference_rules(currency) {
        Some("Min 6 alphanumeric chars, max 17. Not all the same character.")
    } else if currency.is("EUR") {
        Some("Max 140 characters")
    } else {
        None
    }
}

pub fn reference_max_len(currency: &CurrencyCode) -> usize {
    if uses_domestic_reference_rules(currency) {
        DOMESTIC_REFERENCE_MAX
    } else {
        FREE_REFERENCE_MAX
    }
}

/// Render a user-typed amount as a two-decimal string ("500" -> "500.00").
/// Anything unparsable becomes "0.00".
pub fn format_amount_for_api(raw: &str) -> String {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => format!("{v:.2}"),
        _ => "0.00".to_string(),
    }
}

pub fn parse_amount(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// At least one cent once rounded the way `format_amount_for_api` sends it.
pub fn is_positive_amount(raw: &str) -> bool {
    parse_amount(raw).is_some()
        && format_amount_for_api(raw)
            .parse::<f64>()
            .is_ok_and(|sent| sent >= 0.01)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd() -> CurrencyCode {
        CurrencyCode::new("USD")
    }

    #[test]
    fn domestic_reference_rules() {
        assert!(is_reference_valid("PayRef01", &usd()));
        assert!(is_reference_valid("INV-2024/07", &usd()));
        assert!(!is_reference_valid("aaaaaa", &usd()), "all-same must fail");
        assert!(!is_reference_valid("aA-aA-aA", &usd()), "same char ignoring case must fail");
        assert!(!is_reference_valid("ab1", &usd()), "too short must fail");
        assert!(!is_reference_valid("this-is-way-too-long-ref", &usd()), ">17 must fail");
        assert!(!is_reference_valid("Invoice #42", &usd()), "# is not allowed");
        assert!(!is_reference_valid("   ", &usd()));
        assert!(is_reference_valid("Rent 2024", &CurrencyCode::new("gbp")));
    }

    #[test]
    fn free_text_reference_rules() {
        let eur = CurrencyCode::new("EUR");
        assert!(is_reference_valid("Invoice #42", &eur));
        assert!(is_reference_valid("x", &eur));
        assert!(!is_reference_valid("", &eur));
        assert!(!is_reference_valid(&"r".repeat(141), &eur));
        assert!(is_reference_valid(&"r".repeat(140), &eur));
    }

    #[test]
    fn iban_is_uppercased_and_compacted() {
        assert_eq!(normalize_iban("de89 3704 0044 0532 0130 00"), "DE89370400440532013000");
    }

    #[test]
    fn line1_truncates_to_35_chars() {
        let line = "x".repeat(50);
        assert_eq!(truncate_line1(&line).chars().count(), 35);
        assert_eq!(truncate_line1("12 Short St"), "12 Short St");
        let accented = "é".repeat(40);
        assert_eq!(truncate_line1(&accented).chars().count(), 35);
    }

    #[test]
    fn digit_sanitizers_strip_and_cap() {
        assert_eq!(sanitize_sort_code("04-00-04"), "040004");
        assert_eq!(sanitize_uk_account_number("1234 5678 9"), "12345678");
        assert_eq!(sanitize_routing_number("021-000-021-99"), "021000021");
    }

    #[test]
    fn bic_and_phone_formats() {
        assert!(is_valid_bic("COBADEFF"));
        assert!(is_valid_bic("COBADEFFXXX"));
        assert!(!is_valid_bic("COBADEF"));
        assert_eq!(normalize_bic("chas us33 xxx"), "CHASUS33XXX");
        assert!(is_e164_phone("+14155551234"));
        assert!(!is_e164_phone("14155551234"));
        assert!(!is_e164_phone("+1 415"));
        assert!(!is_e164_phone("+1234567"));
        assert!(is_e164_phone("+12345678"));
        assert!(!is_e164_phone("+1234567890123456"));
    }

    #[test]
    fn amounts_format_to_two_decimals() {
        assert_eq!(format_amount_for_api("500"), "500.00");
        assert_eq!(format_amount_for_api("12.5"), "12.50");
        assert_eq!(format_amount_for_api("abc"), "0.00");
        assert!(is_positive_amount("0.01"));
        assert!(!is_positive_amount("0"));
        assert!(!is_positive_amount("-3"));
        assert!(!is_positive_amount("0.004"), "rounds to 0.00 on the wire");
        assert!(is_positive_amount("0.006"));
    }
}
