//! Payee creation on the EU rail, plus the saved-payee search.

use crate::{
    error::{PortalError, PortalResult},
    model::Payee,
    provider::Provider,
    rails::{rules_for_currency, BankDetails},
    submission::{HttpMethod, ProxyRequest},
    types::{CurrencyCode, CustomerId},
    validation::{
        normalize_bic, normalize_iban, not_blank, sanitize_routing_number, sanitize_sort_code,
        sanitize_uk_account_number, truncate_line1,
    },
    wizard::{WizardController, WizardFlow},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const STEPS: &[&str] = &["Payee Details"];

pub const ENDPOINT: &str = "/api/v1/payees";

const ADDRESS_PLACEHOLDER: &str = "N/A";
const DEFAULT_COUNTRY: &str = "GB";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayeeType {
    #[default]
    Individual,
    Business,
}

impl PayeeType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Individual => "INDIVIDUAL",
            Self::Business => "BUSINESS",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayeeForm {
    pub name: String,
    pub currency: CurrencyCode,
    pub payee_type: PayeeType,
    pub bank: BankDetails,
    pub address_line1: String,
    pub city: String,
    pub country: String,
    pub postal_code: String,
}

impl Default for PayeeForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            currency: CurrencyCode::new("EUR"),
            payee_type: PayeeType::Individual,
            bank: BankDetails::default(),
            address_line1: String::new(),
            city: String::new(),
            country: String::new(),
            postal_code: String::new(),
        }
    }
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

impl PayeeForm {
    pub fn payload(&self) -> Value {
        let rules = rules_for_currency(&self.currency);
        json!({
            "name": self.name.trim(),
            "currency": self.currency.as_str(),
            "type": self.payee_type.code(),
            "address": {
                "addressLine1": truncate_line1(&or_placeholder(&self.address_line1, ADDRESS_PLACEHOLDER)),
                "city": or_placeholder(&self.city, ADDRESS_PLACEHOLDER),
                "country": or_placeholder(&self.country, DEFAULT_COUNTRY),
                "postalCode": or_placeholder(&self.postal_code, ADDRESS_PLACEHOLDER),
            },
            "bankDetails": (rules.bank_details)(&self.bank),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PayeeSheet {
    customer_id: CustomerId,
    form: PayeeForm,
    controller: WizardController,
}

impl PayeeSheet {
    pub fn new(customer_id: impl Into<CustomerId>) -> Self {
        Self {
            customer_id: customer_id.into(),
            form: PayeeForm::default(),
            controller: WizardController::new(STEPS),
        }
    }

    pub fn form(&self) -> &PayeeForm {
        &self.form
    }

    pub fn reset(&mut self) {
        self.form = PayeeForm::default();
        self.controller.reset();
    }

    pub fn set_name(&mut self, name: &str) {
        self.form.name = name.to_string();
    }

    pub fn set_payee_type(&mut self, payee_type: PayeeType) {
        self.form.payee_type = payee_type;
    }

    /// Bank details typed for another currency no longer apply.
    pub fn set_currency(&mut self, currency: impl Into<CurrencyCode>) {
        let currency = currency.into();
        if currency != self.form.currency {
            self.form.currency = currency;
            self.form.bank.clear();
        }
    }

    pub fn set_iban(&mut self, iban: &str) {
        self.form.bank.iban = normalize_iban(iban);
    }

    pub fn set_bic(&mut self, bic: &str) {
        self.form.bank.bic = normalize_bic(bic);
    }

    pub fn set_account_number(&mut self, account_number: &str) {
        self.form.bank.account_number = if self.form.currency.is("GBP") {
            sanitize_uk_account_number(account_number)
        } else {
            account_number.trim().to_string()
        };
    }

    pub fn set_sort_code(&mut self, sort_code: &str) {
        self.form.bank.sort_code = sanitize_sort_code(sort_code);
    }

    pub fn set_routing_number(&mut self, routing: &str) {
        self.form.bank.routing_number = sanitize_routing_number(routing);
    }

    pub fn set_address(&mut self, line1: &str, city: &str, country: &str, postal_code: &str) {
        self.form.address_line1 = line1.to_string();
        self.form.city = city.to_string();
        self.form.country = country.trim().to_uppercase();
        self.form.postal_code = postal_code.to_string();
    }
}

impl WizardFlow for PayeeSheet {
    fn controller(&self) -> &WizardController {
        &self.controller
    }

    fn controller_mut(&mut self) -> &mut WizardController {
        &mut self.controller
    }

    fn step_problem(&self, index: usize) -> Option<String> {
        if index != 0 {
            return Some("No such step".into());
        }
        if !not_blank(&self.form.name) {
            return Some("Name is required".into());
        }
        (rules_for_currency(&self.form.currency).validate)(&self.form.bank).err()
    }

    fn build_request(&self) -> PortalResult<ProxyRequest> {
        if let Some(reason) = self.step_problem(0) {
            return Err(PortalError::Validation { step: STEPS[0].to_string(), reason });
        }
        Ok(ProxyRequest::proxied(
            Provider::EuRail,
            ENDPOINT,
            HttpMethod::Post,
            &self.customer_id,
            self.form.payload(),
        ))
    }
}

/// Case-insensitive match on name, bank name or account number.
/// An empty query keeps everything.
pub fn filter_payees<'a>(payees: &'a [Payee], query: &str) -> Vec<&'a Payee> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return payees.iter().collect();
    }
    let hit = |field: Option<&str>| field.is_some_and(|v| v.to_lowercase().contains(&query));
    payees
        .iter()
        .filter(|p| {
            hit(Some(p.display_name.as_str())) || hit(p.bank_name.as_deref()) || hit(p.account_number.as_deref())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eur_payee_needs_name_and_iban() {
        let mut sheet = PayeeSheet::new("cust-1");
        sheet.set_iban("de89 3704 0044 0532 0130 00");
        assert_eq!(sheet.step_problem(0).as_deref(), Some("Name is required"));
        sheet.set_name("Berlin Supplies GmbH");
        assert!(sheet.step_problem(0).is_none());
        assert_eq!(sheet.form().bank.iban, "DE89370400440532013000");
    }

    #[test]
    fn address_defaults_fill_blanks() {
        let mut sheet = PayeeSheet::new("cust-1");
        sheet.set_name("Jane");
        sheet.set_iban("DE89370400440532013000");
        let body = sheet.form().payload();
        assert_eq!(body["address"]["addressLine1"], "N/A");
        assert_eq!(body["address"]["country"], "GB");
        assert_eq!(body["bankDetails"]["iban"], "DE89370400440532013000");
        assert!(body["bankDetails"].get("bic").is_none());
    }

    #[test]
    fn gbp_payee_uses_camel_case_uk_fields() {
        let mut sheet = PayeeSheet::new("cust-1");
        sheet.set_currency("GBP");
        sheet.set_name("London Ltd");
        sheet.set_sort_code("20-00-00");
        sheet.set_account_number("55779911");
        assert!(sheet.step_problem(0).is_none());
        let body = sheet.form().payload();
        assert_eq!(body["bankDetails"], json!({ "accountNumber": "55779911", "sortCode": "200000" }));
    }
}
