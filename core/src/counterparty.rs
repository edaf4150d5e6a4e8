//! Five-step wizard registering a counterparty on the US rail.
//!
//! RULE: fields downstream of a shape-determining choice are cleared when
//! that choice changes. Currency drives rail and bank details; rail
//! drives bank details.

use crate::{
    error::{PortalError, PortalResult},
    provider::Provider,
    rails::{
        self, available_rails, default_rail, insert_if_present, rail_supported,
        BankAccountType, BankDetails, PaymentRail, RailCurrency,
    },
    submission::{HttpMethod, ProxyRequest},
    types::{CurrencyCode, CustomerId},
    validation::{
        is_e164_phone, normalize_bic, normalize_iban, not_blank, sanitize_routing_number,
        sanitize_sort_code, sanitize_uk_account_number, truncate_line1,
    },
    wizard::{WizardController, WizardFlow},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const STEPS: &[&str] = &["Account", "Profile", "Address", "Bank Details", "Institution"];

pub const ENDPOINT: &str = "/counterparties";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProfileType {
    #[default]
    Individual,
    Business,
}

impl ProfileType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Individual => "INDIVIDUAL",
            Self::Business => "BUSINESS",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Relationship {
    Employee,
    #[default]
    Customer,
    Supplier,
    Contractor,
    Partner,
    Other,
}

impl Relationship {
    pub const ALL: [Relationship; 6] = [
        Self::Employee,
        Self::Customer,
        Self::Supplier,
        Self::Contractor,
        Self::Partner,
        Self::Other,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Employee => "EMPLOYEE",
            Self::Customer => "CUSTOMER",
            Self::Supplier => "SUPPLIER",
            Self::Contractor => "CONTRACTOR",
            Self::Partner => "PARTNER",
            Self::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PostalAddress {
    pub country: String,
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
}

impl PostalAddress {
    fn in_country(country: &str) -> Self {
        Self { country: country.to_string(), ..Self::default() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CounterpartyForm {
    // Account
    pub currency: CurrencyCode,
    pub rail: PaymentRail,
    pub description: String,
    // Profile
    pub name: String,
    pub profile_type: ProfileType,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub relationship: Relationship,
    // Address
    pub address: PostalAddress,
    // Bank
    pub bank: BankDetails,
    // Institution
    pub institution_name: String,
    pub institution_address: PostalAddress,
}

impl Default for CounterpartyForm {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::new("USD"),
            rail: PaymentRail::Ach,
            description: String::new(),
            name: String::new(),
            profile_type: ProfileType::Individual,
            email: String::new(),
            phone: String::new(),
            date_of_birth: String::new(),
            relationship: Relationship::Customer,
            address: PostalAddress::in_country("US"),
            bank: BankDetails { account_type: BankAccountType::Checking, ..BankDetails::default() },
            institution_name: String::new(),
            institution_address: PostalAddress::in_country("US"),
        }
    }
}

impl CounterpartyForm {
    pub fn rules(&self) -> &'static rails::RailRules {
        rails::rules_for(&self.currency, self.rail)
    }

    pub fn available_rails(&self) -> &'static [PaymentRail] {
        available_rails(&self.currency)
    }

    fn profile_block(&self) -> Value {
        let mut profile = Map::new();
        profile.insert("name".into(), json!(self.name.trim()));
        profile.insert("profile_type".into(), json!(self.profile_type.code()));
        profile.insert("email".into(), json!(self.email.trim()));
        profile.insert("phone".into(), json!(self.phone.trim()));
        profile.insert("relationship".into(), json!(self.relationship.code()));
        insert_if_present(&mut profile, "date_of_birth", self.date_of_birth.trim());
        Value::Object(profile)
    }

    fn address_block(&self) -> Value {
        let a = &self.address;
        let mut address = Map::new();
        address.insert("country".into(), json!(a.country));
        address.insert("line1".into(), json!(truncate_line1(a.line1.trim())));
        insert_if_present(&mut address, "line2", a.line2.trim());
        address.insert("city".into(), json!(a.city.trim()));
        insert_if_present(&mut address, "state", a.state.trim());
        address.insert("postal_code".into(), json!(a.postal_code.trim()));
        Value::Object(address)
    }

    fn institution_block(&self) -> Value {
        let a = &self.institution_address;
        let mut address = Map::new();
        address.insert("line1".into(), json!(truncate_line1(a.line1.trim())));
        address.insert("city".into(), json!(a.city.trim()));
        insert_if_present(&mut address, "state", a.state.trim());
        insert_if_present(&mut address, "postal_code", a.postal_code.trim());
        json!({
            "name": self.institution_name.trim(),
            "country": a.country,
            "address": Value::Object(address),
        })
    }

    /// The `/counterparties` request body.
    pub fn payload(&self) -> Value {
        let mut body = Map::new();
        body.insert("profile".into(), self.profile_block());
        body.insert(
            "account_information".into(),
            (self.rules().account_information)(&self.bank),
        );
        body.insert("address".into(), self.address_block());
        body.insert("supported_rails".into(), json!([self.rail.code()]));
        body.insert("currency".into(), json!(self.currency.as_str()));
        insert_if_present(&mut body, "description", self.description.trim());
        body.insert("institution".into(), self.institution_block());
        Value::Object(body)
    }
}

#[derive(Debug, Clone)]
pub struct CounterpartyWizard {
    customer_id: CustomerId,
    form: CounterpartyForm,
    controller: WizardController,
}

impl CounterpartyWizard {
    pub fn new(customer_id: impl Into<CustomerId>) -> Self {
        Self {
            customer_id: customer_id.into(),
            form: CounterpartyForm::default(),
            controller: WizardController::new(STEPS),
        }
    }

    pub fn form(&self) -> &CounterpartyForm {
        &self.form
    }

    /// Discard everything typed so far and return to the first step.
    pub fn reset(&mut self) {
        self.form = CounterpartyForm::default();
        self.controller.reset();
    }

    // ── Account ────────────────────────────────────────────────────

    pub fn set_currency(&mut self, currency: impl Into<CurrencyCode>) {
        let currency = currency.into();
        if currency == self.form.currency {
            return;
        }
        self.form.rail = default_rail(&currency);
        self.form.currency = currency;
        self.form.bank.clear();
    }

    pub fn set_rail(&mut self, rail: PaymentRail) {
        if !rail_supported(&self.form.currency, rail) {
            log::debug!("rail {rail} not offered for {}", self.form.currency);
            return;
        }
        let before = self.form.rules().shape;
        self.form.rail = rail;
        if self.form.rules().shape != before {
            self.form.bank.clear();
        }
    }

    pub fn set_description(&mut self, description: &str) {
        self.form.description = description.to_string();
    }

    // ── Profile ────────────────────────────────────────────────────

    pub fn set_name(&mut self, name: &str) {
        self.form.name = name.to_string();
    }

    pub fn set_profile_type(&mut self, profile_type: ProfileType) {
        self.form.profile_type = profile_type;
        if profile_type == ProfileType::Business {
            self.form.date_of_birth.clear();
        }
    }

    pub fn set_email(&mut self, email: &str) {
        self.form.email = email.to_string();
    }

    pub fn set_phone(&mut self, phone: &str) {
        self.form.phone = phone.trim().to_string();
    }

    pub fn set_date_of_birth(&mut self, dob: &str) {
        self.form.date_of_birth = dob.to_string();
    }

    pub fn set_relationship(&mut self, relationship: Relationship) {
        self.form.relationship = relationship;
    }

    // ── Address ────────────────────────────────────────────────────

    pub fn address_mut(&mut self) -> &mut PostalAddress {
        &mut self.form.address
    }

    // ── Bank details ───────────────────────────────────────────────

    pub fn set_iban(&mut self, iban: &str) {
        self.form.bank.iban = normalize_iban(iban);
    }

    pub fn set_bic(&mut self, bic: &str) {
        self.form.bank.bic = normalize_bic(bic);
    }

    pub fn set_account_number(&mut self, account_number: &str) {
        self.form.bank.account_number = if self.form.currency.is("GBP") && !self.form.rail.is_swift() {
            sanitize_uk_account_number(account_number)
        } else {
            account_number.trim().to_string()
        };
    }

    pub fn set_routing_number(&mut self, routing: &str) {
        self.form.bank.routing_number = sanitize_routing_number(routing);
    }

    pub fn set_sort_code(&mut self, sort_code: &str) {
        self.form.bank.sort_code = sanitize_sort_code(sort_code);
    }

    pub fn set_account_type(&mut self, account_type: BankAccountType) {
        self.form.bank.account_type = account_type;
    }

    // ── Institution ────────────────────────────────────────────────

    pub fn set_institution_name(&mut self, name: &str) {
        self.form.institution_name = name.to_string();
    }

    pub fn institution_address_mut(&mut self) -> &mut PostalAddress {
        &mut self.form.institution_address
    }
}

impl WizardFlow for CounterpartyWizard {
    fn controller(&self) -> &WizardController {
        &self.controller
    }

    fn controller_mut(&mut self) -> &mut WizardController {
        &mut self.controller
    }

    fn step_problem(&self, index: usize) -> Option<String> {
        let f = &self.form;
        let missing = |label: &str| Some(format!("{label} is required"));
        match index {
            0 => {
                if !not_blank(f.currency.as_str()) {
                    return missing("Currency");
                }
                if RailCurrency::from_code(&f.currency).is_none() {
                    return Some(format!("{} is not supported for counterparties", f.currency));
                }
                if !rail_supported(&f.currency, f.rail) {
                    return Some(format!("{} is not available for {}", f.rail.label(), f.currency));
                }
                None
            }
            1 => {
                if !not_blank(&f.name) {
                    return missing("Name");
                }
                if !not_blank(&f.email) {
                    return missing("Email");
                }
                if !not_blank(&f.phone) {
                    return missing("Phone");
                }
                if !is_e164_phone(&f.phone) {
                    return Some("Phone must be in international format, e.g. +14155550100".into());
                }
                None
            }
            2 => {
                let a = &f.address;
                [("Country", &a.country), ("Address line 1", &a.line1), ("City", &a.city), ("Postal code", &a.postal_code)]
                    .into_iter()
                    .find(|(_, v)| !not_blank(v))
                    .and_then(|(label, _)| missing(label))
            }
            3 => (f.rules().validate)(&f.bank).err(),
            4 => {
                let a = &f.institution_address;
                [("Institution name", &f.institution_name), ("Institution country", &a.country), ("Institution address", &a.line1), ("Institution city", &a.city)]
                    .into_iter()
                    .find(|(_, v)| !not_blank(v))
                    .and_then(|(label, _)| missing(label))
            }
            _ => Some("No such step".into()),
        }
    }

    fn build_request(&self) -> PortalResult<ProxyRequest> {
        if let Some((index, reason)) =
            (0..STEPS.len()).find_map(|i| self.step_problem(i).map(|r| (i, r)))
        {
            return Err(PortalError::Validation { step: STEPS[index].to_string(), reason });
        }
        Ok(ProxyRequest::proxied(
            Provider::UsRail,
            ENDPOINT,
            HttpMethod::Post,
            &self.customer_id,
            self.form.payload(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::NextStep;

    fn filled() -> CounterpartyWizard {
        let mut w = CounterpartyWizard::new("cust-1");
        w.set_name("Austin Parts LLC");
        w.set_email("ap@austinparts.example");
        w.set_phone("+15125550100");
        {
            let a = w.address_mut();
            a.line1 = "1 Congress Ave".into();
            a.city = "Austin".into();
            a.postal_code = "78701".into();
        }
        w.set_account_number("123456789");
        w.set_routing_number("021000021");
        w.set_institution_name("JPMorgan Chase");
        {
            let a = w.institution_address_mut();
            a.line1 = "383 Madison Ave".into();
            a.city = "New York".into();
        }
        w
    }

    #[test]
    fn defaults_are_usd_ach_individual_customer() {
        let f = CounterpartyForm::default();
        assert!(f.currency.is("USD"));
        assert_eq!(f.rail, PaymentRail::Ach);
        assert_eq!(f.profile_type, ProfileType::Individual);
        assert_eq!(f.relationship, Relationship::Customer);
        assert_eq!(f.address.country, "US");
        assert_eq!(f.bank.account_type, BankAccountType::Checking);
    }

    #[test]
    fn changing_currency_resets_rail_and_bank_details() {
        let mut w = filled();
        w.set_rail(PaymentRail::Fedwire);
        w.set_currency("EUR");
        assert_eq!(w.form().rail, PaymentRail::SepaCt);
        assert!(w.form().bank.account_number.is_empty(), "bank details must be cleared");
        assert!(w.form().bank.routing_number.is_empty());
    }

    #[test]
    fn switching_between_same_shape_rails_keeps_bank_details() {
        let mut w = filled();
        w.set_rail(PaymentRail::Fedwire);
        assert_eq!(w.form().bank.routing_number, "021000021");
        w.set_rail(PaymentRail::Swift);
        assert!(w.form().bank.routing_number.is_empty(), "shape changed, details cleared");
    }

    #[test]
    fn unsupported_currency_blocks_the_account_step() {
        let mut w = CounterpartyWizard::new("cust-1");
        w.set_currency("MXN");
        assert_eq!(w.step_problem(0).as_deref(), Some("MXN is not supported for counterparties"));
        assert_eq!(w.next(), NextStep::Blocked);
        assert_eq!(w.controller().index(), 0);

        w.set_currency("GBP");
        assert_eq!(w.form().rail, PaymentRail::Fps);
        assert_eq!(w.step_problem(0), None);
    }

    #[test]
    fn phone_must_be_international() {
        let mut w = filled();
        w.set_phone("5125550100");
        assert!(w.step_problem(1).is_some());
        w.set_phone("+15125550100");
        assert!(w.step_problem(1).is_none());
    }

    #[test]
    fn payload_uses_us_rail_field_names_and_truncates_line1() {
        let mut w = filled();
        w.address_mut().line1 = "x".repeat(50);
        let body = w.form().payload();
        assert_eq!(body["address"]["line1"].as_str().map(str::len), Some(35));
        assert_eq!(body["account_information"]["routing_number"], "021000021");
        assert_eq!(body["account_information"]["account_type"], "CHECKING");
        assert_eq!(body["supported_rails"], json!(["ACH"]));
        assert!(body.get("description").is_none(), "blank description omitted");
        assert!(body["profile"].get("date_of_birth").is_none());
    }
}
