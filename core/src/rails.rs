//! Payment rails and the bank-detail rules table.
//!
//! RULE: the shape of a bank-details block is decided here and only here,
//! from (currency, rail). Wizards look their rules up; they never branch
//! on currency strings themselves.

use crate::{
    types::CurrencyCode,
    validation::{
        is_valid_bic, is_valid_routing_number, is_valid_sort_code, is_valid_uk_account_number,
        not_blank,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentRail {
    Ach,
    Fedwire,
    Swift,
    SepaCt,
    Fps,
    Chaps,
}

impl PaymentRail {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ach => "ACH",
            Self::Fedwire => "FEDWIRE",
            Self::Swift => "SWIFT",
            Self::SepaCt => "SEPA_CT",
            Self::Fps => "FPS",
            Self::Chaps => "CHAPS",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "ACH" => Some(Self::Ach),
            "FEDWIRE" => Some(Self::Fedwire),
            "SWIFT" => Some(Self::Swift),
            "SEPA_CT" => Some(Self::SepaCt),
            "FPS" => Some(Self::Fps),
            "CHAPS" => Some(Self::Chaps),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Ach => "ACH (Standard)",
            Self::Fedwire => "Fedwire (Same-day)",
            Self::Swift => "SWIFT (International)",
            Self::SepaCt => "SEPA Credit Transfer",
            Self::Fps => "Faster Payments",
            Self::Chaps => "CHAPS",
        }
    }

    pub fn is_swift(&self) -> bool {
        matches!(self, Self::Swift)
    }
}

impl fmt::Display for PaymentRail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

const USD_RAILS: [PaymentRail; 3] = [PaymentRail::Ach, PaymentRail::Fedwire, PaymentRail::Swift];
const EUR_RAILS: [PaymentRail; 2] = [PaymentRail::SepaCt, PaymentRail::Swift];
const GBP_RAILS: [PaymentRail; 3] = [PaymentRail::Fps, PaymentRail::Chaps, PaymentRail::Swift];

/// Currencies a counterparty can be registered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RailCurrency {
    Usd,
    Eur,
    Gbp,
}

impl RailCurrency {
    pub const ALL: [Self; 3] = [Self::Usd, Self::Eur, Self::Gbp];

    pub fn from_code(currency: &CurrencyCode) -> Option<Self> {
        match currency.as_str() {
            "USD" => Some(Self::Usd),
            "EUR" => Some(Self::Eur),
            "GBP" => Some(Self::Gbp),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
        }
    }

    pub fn rails(&self) -> &'static [PaymentRail] {
        match self {
            Self::Usd => &USD_RAILS,
            Self::Eur => &EUR_RAILS,
            Self::Gbp => &GBP_RAILS,
        }
    }
}

/// Rails offered for a currency. The first entry is the default; other
/// currencies get the USD set.
pub fn available_rails(currency: &CurrencyCode) -> &'static [PaymentRail] {
    RailCurrency::from_code(currency).unwrap_or(RailCurrency::Usd).rails()
}

pub fn default_rail(currency: &CurrencyCode) -> PaymentRail {
    available_rails(currency)[0]
}

pub fn rail_supported(currency: &CurrencyCode, rail: PaymentRail) -> bool {
    available_rails(currency).contains(&rail)
}

/// Scheme the EU rail should use for a payment in `currency`.
pub fn payment_scheme(currency: &CurrencyCode) -> &'static str {
    match currency.as_str() {
        "EUR" => "SCT",
        "GBP" => "FPS",
        "USD" => "ACH",
        "AUD" => "NPP",
        "CAD" => "EMT_EAGLE_NET",
        _ => "SWIFT",
    }
}

// ── Bank details ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BankAccountType {
    #[default]
    Checking,
    Savings,
}

impl BankAccountType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Checking => "CHECKING",
            Self::Savings => "SAVINGS",
        }
    }
}

/// Every bank field any rail might ask for. Which ones count is decided
/// by the rules entry, not by which happen to be filled in.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BankDetails {
    pub iban: String,
    pub bic: String,
    pub account_number: String,
    pub routing_number: String,
    pub sort_code: String,
    pub account_type: BankAccountType,
}

impl BankDetails {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BankField {
    Iban,
    Bic,
    AccountNumber,
    RoutingNumber,
    SortCode,
    AccountType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BankShape {
    /// EUR over SEPA: IBAN, BIC optional.
    Sepa,
    /// EUR over SWIFT: IBAN and BIC.
    SepaSwift,
    /// GBP over Faster Payments / CHAPS: sort code and account number.
    UkDomestic,
    /// USD over ACH / Fedwire (and the fallback for other currencies).
    UsDomestic,
    /// Non-EUR over SWIFT: account number and BIC.
    Swift,
}

/// One row of the rules table.
pub struct RailRules {
    pub shape: BankShape,
    pub required: &'static [BankField],
    pub optional: &'static [BankField],
    pub validate: fn(&BankDetails) -> Result<(), String>,
    /// US-rail `account_information` block (snake_case keys).
    pub account_information: fn(&BankDetails) -> Value,
    /// EU-rail `bankDetails` block (camelCase keys).
    pub bank_details: fn(&BankDetails) -> Value,
}

impl fmt::Debug for RailRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RailRules")
            .field("shape", &self.shape)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .finish()
    }
}

impl RailRules {
    pub fn is_satisfied(&self, details: &BankDetails) -> bool {
        (self.validate)(details).is_ok()
    }
}

fn require(ok: bool, reason: &str) -> Result<(), String> {
    if ok {
        Ok(())
    } else {
        Err(reason.to_string())
    }
}

pub(crate) fn insert_if_present(map: &mut Map<String, Value>, key: &str, value: &str) {
    if !value.is_empty() {
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
}

// Sepa

fn validate_sepa(d: &BankDetails) -> Result<(), String> {
    require(not_blank(&d.iban), "IBAN is required")?;
    if !d.bic.is_empty() {
        require(is_valid_bic(&d.bic), "BIC must be 8 or 11 characters")?;
    }
    Ok(())
}

fn sepa_account_information(d: &BankDetails) -> Value {
    let mut m = Map::new();
    m.insert("iban".into(), json!(d.iban));
    insert_if_present(&mut m, "swift_bic", &d.bic);
    Value::Object(m)
}

fn sepa_bank_details(d: &BankDetails) -> Value {
    let mut m = Map::new();
    m.insert("iban".into(), json!(d.iban));
    insert_if_present(&mut m, "bic", &d.bic);
    Value::Object(m)
}

// SepaSwift

fn validate_sepa_swift(d: &BankDetails) -> Result<(), String> {
    require(not_blank(&d.iban), "IBAN is required")?;
    require(is_valid_bic(&d.bic), "BIC must be 8 or 11 characters")
}

fn sepa_swift_account_information(d: &BankDetails) -> Value {
    json!({ "iban": d.iban, "swift_bic": d.bic })
}

fn sepa_swift_bank_details(d: &BankDetails) -> Value {
    json!({ "iban": d.iban, "bic": d.bic })
}

// UkDomestic

fn validate_uk(d: &BankDetails) -> Result<(), String> {
    require(is_valid_sort_code(&d.sort_code), "Sort code must be 6 digits")?;
    require(
        is_valid_uk_account_number(&d.account_number),
        "Account number must be up to 8 digits",
    )
}

fn uk_account_information(d: &BankDetails) -> Value {
    json!({ "sort_code": d.sort_code, "account_number": d.account_number })
}

fn uk_bank_details(d: &BankDetails) -> Value {
    json!({ "accountNumber": d.account_number, "sortCode": d.sort_code })
}

// UsDomestic

fn validate_us(d: &BankDetails) -> Result<(), String> {
    require(not_blank(&d.account_number), "Account number is required")?;
    require(is_valid_routing_number(&d.routing_number), "Routing number must be 9 digits")
}

fn us_account_information(d: &BankDetails) -> Value {
    json!({
        "account_number": d.account_number,
        "routing_number": d.routing_number,
        "account_type": d.account_type.code(),
    })
}

fn us_bank_details(d: &BankDetails) -> Value {
    json!({ "accountNumber": d.account_number, "routingNumber": d.routing_number })
}

// Swift

fn validate_swift(d: &BankDetails) -> Result<(), String> {
    require(not_blank(&d.account_number), "Account number is required")?;
    require(is_valid_bic(&d.bic), "BIC must be 8 or 11 characters")?;
    if !d.routing_number.is_empty() {
        require(is_valid_routing_number(&d.routing_number), "Routing number must be 9 digits")?;
    }
    Ok(())
}

fn swift_account_information(d: &BankDetails) -> Value {
    let mut m = Map::new();
    m.insert("account_number".into(), json!(d.account_number));
    m.insert("swift_bic".into(), json!(d.bic));
    insert_if_present(&mut m, "routing_number", &d.routing_number);
    Value::Object(m)
}

fn swift_bank_details(d: &BankDetails) -> Value {
    let mut m = Map::new();
    m.insert("accountNumber".into(), json!(d.account_number));
    m.insert("bic".into(), json!(d.bic));
    insert_if_present(&mut m, "routingNumber", &d.routing_number);
    Value::Object(m)
}

static RULES: [RailRules; 5] = [
    RailRules {
        shape: BankShape::Sepa,
        required: &[BankField::Iban],
        optional: &[BankField::Bic],
        validate: validate_sepa,
        account_information: sepa_account_information,
        bank_details: sepa_bank_details,
    },
    RailRules {
        shape: BankShape::SepaSwift,
        required: &[BankField::Iban, BankField::Bic],
        optional: &[],
        validate: validate_sepa_swift,
        account_information: sepa_swift_account_information,
        bank_details: sepa_swift_bank_details,
    },
    RailRules {
        shape: BankShape::UkDomestic,
        required: &[BankField::SortCode, BankField::AccountNumber],
        optional: &[],
        validate: validate_uk,
        account_information: uk_account_information,
        bank_details: uk_bank_details,
    },
    RailRules {
        shape: BankShape::UsDomestic,
        required: &[BankField::AccountNumber, BankField::RoutingNumber],
        optional: &[BankField::AccountType],
        validate: validate_us,
        account_information: us_account_information,
        bank_details: us_bank_details,
    },
    RailRules {
        shape: BankShape::Swift,
        required: &[BankField::AccountNumber, BankField::Bic],
        optional: &[BankField::RoutingNumber],
        validate: validate_swift,
        account_information: swift_account_information,
        bank_details: swift_bank_details,
    },
];

/// The bank-detail shape fully determined by currency and whether SWIFT
/// was chosen.
pub fn shape_for(currency: &CurrencyCode, swift: bool) -> BankShape {
    match (currency.as_str(), swift) {
        ("EUR", false) => BankShape::Sepa,
        ("EUR", true) => BankShape::SepaSwift,
        ("GBP", false) => BankShape::UkDomestic,
        (_, true) => BankShape::Swift,
        (_, false) => BankShape::UsDomestic,
    }
}

pub fn rules_for_shape(shape: BankShape) -> &'static RailRules {
    // The table is indexed in BankShape declaration order.
    let rules = match shape {
        BankShape::Sepa => &RULES[0],
        BankShape::SepaSwift => &RULES[1],
        BankShape::UkDomestic => &RULES[2],
        BankShape::UsDomestic => &RULES[3],
        BankShape::Swift => &RULES[4],
    };
    debug_assert_eq!(rules.shape, shape);
    rules
}

/// Look up the rules for a counterparty registered on `rail` in `currency`.
pub fn rules_for(currency: &CurrencyCode, rail: PaymentRail) -> &'static RailRules {
    rules_for_shape(shape_for(currency, rail.is_swift()))
}

/// Rules for a payee on the EU rail, which has no rail selector.
pub fn rules_for_currency(currency: &CurrencyCode) -> &'static RailRules {
    rules_for_shape(shape_for(currency, false))
}
