//! An in-process stand-in for the hosted backend.
//!
//! Rows live in SQLite through `SandboxStore`. The proxy functions are
//! emulated closely enough to exercise every success and failure path
//! the portal distinguishes: transport errors with a response body,
//! business errors inside a 200 response, and spurious MFA errors.
//!
//! RULE: every `invoke` is journaled before anything else happens, so
//! the journal is an exact count of outbound attempts.

use crate::{
    backend::{Backend, Challenge, InvokeResponse},
    clock::{Clock, SystemClock},
    config::{SandboxConfig, SandboxFixtures},
    error::{PortalError, PortalResult},
    model::{
        Account, AssuranceLevel, AssuranceStatus, Customer, FactorListing, FactorStatus,
        FactorType, MfaFactor, OrgRole, OrgRoleKind, Payee, Session, Transaction,
    },
    provider::{Provider, ProviderConfiguration},
    rails::PaymentRail,
    rng::{FaultRng, FaultSlot},
    store::{ProxyCallRow, SandboxStore},
    submission::ProxyEnvelope,
    types::CurrencyCode,
};
use serde_json::{json, Value};
use std::{collections::BTreeMap, rc::Rc};
use uuid::Uuid;

const NON_2XX: &str = "Edge Function returned a non-2xx status code";

fn new_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4())
}

fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).map(str::trim).unwrap_or("")
}

fn opt_field(value: &Value, key: &str) -> Option<String> {
    Some(str_field(value, key)).filter(|s| !s.is_empty()).map(str::to_string)
}

fn amount_field(value: &Value, key: &str) -> Option<f64> {
    let amount: Option<f64> = match value.get(key)? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    amount.filter(|v| v.is_finite())
}

/// A rejected request, the way the rail APIs word it.
fn rejection(message: &str, position: &str, issue: &str) -> Value {
    json!({
        "message": message,
        "warnings": [{ "position": position, "issue": issue }],
    })
}

fn rejected(message: &str, position: &str, issue: &str) -> InvokeResponse {
    InvokeResponse::failed(NON_2XX, Some(rejection(message, position, issue)))
}

fn insufficient_funds(balance: f64, currency: &CurrencyCode) -> InvokeResponse {
    InvokeResponse::ok(json!({
        "errorCode": "INSUFFICIENT_FUNDS",
        "message": "Insufficient balance",
        "warnings": [{
            "position": "amount",
            "issue": format!("exceeds available balance of {balance:.2} {currency}"),
        }],
    }))
}

fn factor_type_from(s: &str) -> FactorType {
    match s.to_ascii_lowercase().as_str() {
        "totp" => FactorType::Totp,
        "phone" => FactorType::Phone,
        _ => FactorType::Other,
    }
}

pub struct SandboxBackend {
    store: SandboxStore,
    clock: Rc<dyn Clock>,
    config: SandboxConfig,
    session: Option<Session>,
    assurance: AssuranceStatus,
    challenges: Vec<Challenge>,
    verify_rng: FaultRng,
    invoke_rng: FaultRng,
    force_spurious_verify_error: bool,
    fail_next_invoke: Option<String>,
    lookups: BTreeMap<&'static str, usize>,
}

const SIGNED_OUT: AssuranceStatus = AssuranceStatus {
    current: AssuranceLevel::Aal1,
    next: AssuranceLevel::Aal1,
};

impl SandboxBackend {
    pub fn new(store: SandboxStore, config: SandboxConfig, clock: Rc<dyn Clock>) -> PortalResult<Self> {
        store.migrate()?;
        Ok(Self {
            verify_rng: FaultRng::new(config.seed, FaultSlot::SpuriousVerifyError),
            invoke_rng: FaultRng::new(config.seed, FaultSlot::InvokeTransport),
            store,
            clock,
            config,
            session: None,
            assurance: SIGNED_OUT,
            challenges: Vec::new(),
            force_spurious_verify_error: false,
            fail_next_invoke: None,
            lookups: BTreeMap::new(),
        })
    }

    /// Empty in-memory sandbox on the system clock.
    pub fn in_memory() -> PortalResult<Self> {
        Self::new(SandboxStore::in_memory()?, SandboxConfig::default(), Rc::new(SystemClock))
    }

    /// In-memory sandbox seeded with `fixtures`, reading time from `clock`.
    pub fn seeded(fixtures: &SandboxFixtures, clock: Rc<dyn Clock>) -> PortalResult<Self> {
        let mut sandbox = Self::new(SandboxStore::in_memory()?, SandboxConfig::default(), clock)?;
        sandbox.seed(fixtures)?;
        Ok(sandbox)
    }

    pub fn store(&self) -> &SandboxStore {
        &self.store
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn seed(&mut self, fixtures: &SandboxFixtures) -> PortalResult<()> {
        for user in &fixtures.users {
            self.store
                .insert_user(&user.user_id, &user.email, &user.password, user.mfa_code.as_deref())?;
            for f in &user.factors {
                let status = if f.status.eq_ignore_ascii_case("verified") {
                    FactorStatus::Verified
                } else {
                    FactorStatus::Unverified
                };
                let factor = MfaFactor {
                    id: f.id.clone(),
                    factor_type: factor_type_from(&f.factor_type),
                    status,
                    friendly_name: f.friendly_name.clone(),
                };
                self.store.insert_factor(&user.user_id, &factor)?;
            }
        }
        for c in &fixtures.customers {
            self.store.insert_customer(&Customer {
                id: c.id.clone(),
                user_id: c.user_id.clone(),
                first_name: c.first_name.clone(),
                last_name: c.last_name.clone(),
                company_name: c.company_name.clone(),
                customer_type: c.customer_type.clone(),
                country: c.country.clone(),
            })?;
            for provider in &c.providers {
                self.store.set_provider(&c.id, *provider, true)?;
            }
        }
        for m in &fixtures.members {
            self.store.upsert_org_role(&OrgRole {
                user_id: m.user_id.clone(),
                customer_id: m.customer_id.clone(),
                role: m.role,
                email: m.email.clone(),
                status: "active".into(),
            })?;
        }
        for a in &fixtures.accounts {
            self.store.insert_account(
                &a.customer_id,
                &Account {
                    id: a.id.clone(),
                    provider_account_id: None,
                    provider: a.provider,
                    currency: a.currency.clone(),
                    balance: a.balance,
                    pending_balance: 0.0,
                    label: a.label.clone(),
                    iban: a.iban.clone(),
                    account_number: a.account_number.clone(),
                    routing_number: None,
                    sort_code: None,
                    status: "active".into(),
                },
            )?;
        }
        for p in &fixtures.payees {
            self.store.insert_payee(
                &p.customer_id,
                &Payee {
                    id: p.id.clone(),
                    provider_payee_id: None,
                    provider: p.provider,
                    display_name: p.display_name.clone(),
                    currency: p.currency.clone(),
                    rail: p.rail,
                    iban: p.iban.clone(),
                    bic: None,
                    account_number: p.account_number.clone(),
                    sort_code: None,
                    routing_number: None,
                    bank_name: p.bank_name.clone(),
                    status: "active".into(),
                },
            )?;
        }
        log::info!(
            "sandbox seeded: {} user(s), {} customer(s), {} account(s), {} payee(s)",
            fixtures.users.len(),
            fixtures.customers.len(),
            fixtures.accounts.len(),
            fixtures.payees.len()
        );
        Ok(())
    }

    pub fn record_transaction(&self, customer_id: &str, tx: &Transaction) -> PortalResult<()> {
        self.store.insert_transaction(customer_id, tx)
    }

    // ── Fault injection ───────────────────────────────────────────

    /// The next successful verify upgrades the session but still reports
    /// a transport error.
    pub fn force_spurious_verify_error(&mut self) {
        self.force_spurious_verify_error = true;
    }

    /// The next `invoke` is journaled and then fails in transport.
    pub fn fail_next_invoke(&mut self, message: impl Into<String>) {
        self.fail_next_invoke = Some(message.into());
    }

    // ── Observation ───────────────────────────────────────────────

    pub fn proxy_calls(&self) -> PortalResult<Vec<ProxyCallRow>> {
        self.store.proxy_calls()
    }

    pub fn proxy_call_count(&self, function: &str, endpoint: Option<&str>) -> PortalResult<usize> {
        self.store.count_proxy_calls(function, endpoint)
    }

    /// How many times a row query named `query` was served.
    pub fn lookups(&self, query: &str) -> usize {
        self.lookups.get(query).copied().unwrap_or(0)
    }

    fn count(&mut self, query: &'static str) {
        *self.lookups.entry(query).or_insert(0) += 1;
    }

    fn require_session(&self) -> PortalResult<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| PortalError::Auth("Auth session missing!".into()))
    }

    // ── Function routes ───────────────────────────────────────────

    fn route(&mut self, function: &str, body: &Value) -> PortalResult<InvokeResponse> {
        match function {
            "fr-proxy" | "rail-proxy" => {
                let envelope: ProxyEnvelope = match serde_json::from_value(body.clone()) {
                    Ok(env) => env,
                    Err(e) => {
                        return Ok(InvokeResponse::failed(
                            NON_2XX,
                            Some(json!({ "error": format!("Malformed proxy request: {e}") })),
                        ))
                    }
                };
                if self.store.customer_by_id(&envelope.customer_id)?.is_none() {
                    return Ok(InvokeResponse::failed(NON_2XX, Some(json!({ "error": "Customer not found" }))));
                }
                match (function, envelope.endpoint.as_str()) {
                    ("fr-proxy", "/api/v1/payments") => self.fr_payment(&envelope),
                    ("fr-proxy", "/api/v1/payees") => self.fr_payee(&envelope),
                    ("rail-proxy", "/withdrawals") => self.rail_withdrawal(&envelope),
                    ("rail-proxy", "/counterparties") => self.rail_counterparty(&envelope),
                    (_, endpoint) => Ok(InvokeResponse::failed(
                        NON_2XX,
                        Some(json!({ "error": format!("No route for {endpoint}") })),
                    )),
                }
            }
            "calculate-fee" => Ok(self.calculate_fee(body)),
            "create-platform-user" => self.create_platform_user(body),
            "toggle-user-status" => self.toggle_user_status(body),
            other => Ok(InvokeResponse::failed(format!("Function {other} not found"), None)),
        }
    }

    fn pay_out(
        &mut self,
        provider: Provider,
        customer_id: &str,
        source_id: &str,
        destination_id: &str,
        body: &Value,
        fields: (&str, &str),
    ) -> PortalResult<Result<(Account, Payee, f64), InvokeResponse>> {
        let (source_key, destination_key) = fields;
        let Some(account) = self.store.account_by_rail_id(customer_id, provider, source_id)? else {
            return Ok(Err(rejected("Account not found", source_key, "unknown account")));
        };
        let Some(payee) = self.store.payee_by_rail_id(customer_id, provider, destination_id)? else {
            return Ok(Err(rejected("Payee not found", destination_key, "unknown payee")));
        };
        let Some(amount) = amount_field(body, "amount").filter(|a| *a > 0.0) else {
            return Ok(Err(rejected("Invalid amount", "amount", "must be a positive decimal")));
        };
        if !account.currency.is(str_field(body, "currency")) {
            return Ok(Err(rejected(
                "Currency mismatch",
                "currency",
                &format!("account holds {}", account.currency),
            )));
        }
        if amount > account.balance {
            return Ok(Err(insufficient_funds(account.balance, &account.currency)));
        }
        Ok(Ok((account, payee, amount)))
    }

    fn book_payment(
        &mut self,
        customer_id: &str,
        account: &Account,
        payee: &Payee,
        amount: f64,
        reference: Option<String>,
    ) -> PortalResult<Value> {
        self.store.adjust_balance(&account.id, -amount)?;
        let tx = Transaction {
            id: new_id("tx"),
            provider: account.provider,
            transaction_type: if account.provider == Provider::EuRail { "PAYMENT" } else { "WITHDRAWAL" }.into(),
            status: "PENDING".into(),
            amount,
            currency: account.currency.clone(),
            counterparty_name: Some(payee.display_name.clone()),
            description: Some(format!("To: {}", payee.display_name)),
            reference,
            created_at: self.clock.now(),
        };
        self.store.insert_transaction(customer_id, &tx)?;
        log::info!("sandbox booked {} {amount:.2} {} to {}", tx.transaction_type, tx.currency, payee.id);
        Ok(json!({
            "id": tx.id,
            "status": tx.status,
            "amount": format!("{amount:.2}"),
            "currency": tx.currency.as_str(),
        }))
    }

    fn fr_payment(&mut self, env: &ProxyEnvelope) -> PortalResult<InvokeResponse> {
        let b = &env.body;
        if str_field(b, "type") != "PAYEE" {
            return Ok(rejected("Unsupported payment type", "type", "must be PAYEE"));
        }
        if str_field(b, "paymentScheme").is_empty() {
            return Ok(rejected("Payment scheme required", "paymentScheme", "must not be blank"));
        }
        let checked = self.pay_out(
            Provider::EuRail,
            &env.customer_id,
            str_field(b, "fromId"),
            str_field(b, "toId"),
            b,
            ("fromId", "toId"),
        )?;
        let (account, payee, amount) = match checked {
            Ok(found) => found,
            Err(response) => return Ok(response),
        };
        let data = self.book_payment(&env.customer_id, &account, &payee, amount, opt_field(b, "reference"))?;
        Ok(InvokeResponse::ok(data))
    }

    fn rail_withdrawal(&mut self, env: &ProxyEnvelope) -> PortalResult<InvokeResponse> {
        let b = &env.body;
        if PaymentRail::from_code(str_field(b, "rail")).is_none() {
            return Ok(InvokeResponse::ok(json!({
                "error": "invalid_rail",
                "message": format!("Unknown rail '{}'", str_field(b, "rail")),
            })));
        }
        let checked = self.pay_out(
            Provider::UsRail,
            &env.customer_id,
            str_field(b, "source_account_id"),
            str_field(b, "destination_counterparty_id"),
            b,
            ("source_account_id", "destination_counterparty_id"),
        )?;
        let (account, payee, amount) = match checked {
            Ok(found) => found,
            Err(response) => return Ok(response),
        };
        let data = self.book_payment(&env.customer_id, &account, &payee, amount, opt_field(b, "reference"))?;
        Ok(InvokeResponse::ok(data))
    }

    fn fr_payee(&mut self, env: &ProxyEnvelope) -> PortalResult<InvokeResponse> {
        let b = &env.body;
        let name = str_field(b, "name");
        if name.is_empty() {
            return Ok(rejected("Validation failed", "name", "must not be blank"));
        }
        let currency = CurrencyCode::new(str_field(b, "currency"));
        let bank = b.get("bankDetails").cloned().unwrap_or(Value::Null);
        let missing = if currency.is("EUR") {
            ["iban"].as_slice()
        } else if currency.is("GBP") {
            ["sortCode", "accountNumber"].as_slice()
        } else {
            ["accountNumber", "routingNumber"].as_slice()
        }
        .iter()
        .find(|k| str_field(&bank, k).is_empty());
        if let Some(key) = missing {
            return Ok(rejected("Validation failed", &format!("bankDetails.{key}"), "must not be blank"));
        }

        let payee = Payee {
            id: new_id("payee"),
            provider_payee_id: None,
            provider: Provider::EuRail,
            display_name: name.to_string(),
            currency,
            rail: None,
            iban: opt_field(&bank, "iban"),
            bic: opt_field(&bank, "bic"),
            account_number: opt_field(&bank, "accountNumber"),
            sort_code: opt_field(&bank, "sortCode"),
            routing_number: opt_field(&bank, "routingNumber"),
            bank_name: None,
            status: "active".into(),
        };
        self.store.insert_payee(&env.customer_id, &payee)?;
        Ok(InvokeResponse::ok(json!({ "id": payee.id, "name": payee.display_name, "status": "ACTIVE" })))
    }

    fn rail_counterparty(&mut self, env: &ProxyEnvelope) -> PortalResult<InvokeResponse> {
        let b = &env.body;
        let profile = b.get("profile").cloned().unwrap_or(Value::Null);
        let name = str_field(&profile, "name");
        if name.is_empty() {
            return Ok(InvokeResponse::ok(json!({
                "errorCode": "VALIDATION_ERROR",
                "message": "profile.name is required",
            })));
        }
        let info = b.get("account_information").cloned().unwrap_or(Value::Null);
        if str_field(&info, "account_number").is_empty() && str_field(&info, "iban").is_empty() {
            return Ok(InvokeResponse::ok(json!({
                "errorCode": "VALIDATION_ERROR",
                "message": "account_information needs an account number or IBAN",
            })));
        }
        let line1 = b
            .pointer("/address/line1")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if line1.chars().count() > 35 {
            return Ok(rejected("Validation failed", "address.line1", "must be at most 35 characters"));
        }
        let rail = b
            .get("supported_rails")
            .and_then(Value::as_array)
            .and_then(|rails| rails.first())
            .and_then(Value::as_str)
            .and_then(PaymentRail::from_code);

        let payee = Payee {
            id: new_id("cp"),
            provider_payee_id: None,
            provider: Provider::UsRail,
            display_name: name.to_string(),
            currency: CurrencyCode::new(str_field(b, "currency")),
            rail,
            iban: opt_field(&info, "iban"),
            bic: opt_field(&info, "swift_bic"),
            account_number: opt_field(&info, "account_number"),
            sort_code: opt_field(&info, "sort_code"),
            routing_number: opt_field(&info, "routing_number"),
            bank_name: b.get("institution").and_then(|i| opt_field(i, "name")),
            status: "active".into(),
        };
        self.store.insert_payee(&env.customer_id, &payee)?;
        Ok(InvokeResponse::ok(json!({ "id": payee.id, "status": "ACTIVE" })))
    }

    fn calculate_fee(&mut self, body: &Value) -> InvokeResponse {
        let Some(amount) = amount_field(body, "amount").filter(|a| *a > 0.0) else {
            return InvokeResponse::ok(json!({ "error": "amount must be positive" }));
        };
        let fee = (amount * self.config.fee_rate * 100.0).round() / 100.0;
        InvokeResponse::ok(json!({
            "fee": fee,
            "feeCurrency": str_field(body, "currency"),
            "total": amount + fee,
        }))
    }

    fn create_platform_user(&mut self, body: &Value) -> PortalResult<InvokeResponse> {
        let email = str_field(body, "email");
        if email.is_empty() {
            return Ok(InvokeResponse::ok(json!({ "error": "Email is required" })));
        }
        if self.store.user_by_email(email)?.is_some() {
            return Ok(InvokeResponse::ok(json!({ "error": "A user with this email already exists" })));
        }
        let customer_id = str_field(body, "customerId");
        if self.store.customer_by_id(customer_id)?.is_none() {
            return Ok(InvokeResponse::ok(json!({ "error": "Customer not found" })));
        }
        let role = OrgRoleKind::from_key(str_field(body, "role")).unwrap_or(OrgRoleKind::Viewer);
        let user_id = new_id("user");
        self.store
            .insert_user(&user_id, email, &Uuid::new_v4().to_string(), None)?;
        self.store.upsert_org_role(&OrgRole {
            user_id: user_id.clone(),
            customer_id: customer_id.to_string(),
            role,
            email: Some(email.to_string()),
            status: "active".into(),
        })?;
        log::info!("sandbox invited {email} as {}", role.key());
        Ok(InvokeResponse::ok(json!({ "userId": user_id, "email": email })))
    }

    fn toggle_user_status(&mut self, body: &Value) -> PortalResult<InvokeResponse> {
        let status = match str_field(body, "action") {
            "enable" => "active",
            "disable" => "disabled",
            other => {
                return Ok(InvokeResponse::ok(json!({ "error": format!("Unknown action '{other}'") })));
            }
        };
        if !self.store.set_org_role_status(str_field(body, "userId"), status)? {
            return Ok(InvokeResponse::ok(json!({ "error": "User not found" })));
        }
        Ok(InvokeResponse::ok(json!({ "success": true, "status": status })))
    }
}

impl Backend for SandboxBackend {
    fn sign_in_with_password(&mut self, email: &str, password: &str) -> PortalResult<Session> {
        let user = match self.store.user_by_email(email)? {
            Some(u) if u.password == password => u,
            _ => return Err(PortalError::Auth("Invalid login credentials".into())),
        };
        let has_factor = self
            .store
            .factors_for_user(&user.user_id)?
            .iter()
            .any(|f| f.status == FactorStatus::Verified);
        self.assurance = AssuranceStatus {
            current: AssuranceLevel::Aal1,
            next: if has_factor { AssuranceLevel::Aal2 } else { AssuranceLevel::Aal1 },
        };
        let session = Session {
            access_token: Uuid::new_v4().to_string(),
            user_id: user.user_id,
            email: user.email,
        };
        self.session = Some(session.clone());
        Ok(session)
    }

    fn current_session(&mut self) -> PortalResult<Option<Session>> {
        Ok(self.session.clone())
    }

    fn assurance_level(&mut self) -> PortalResult<AssuranceStatus> {
        self.require_session()?;
        Ok(self.assurance)
    }

    fn list_factors(&mut self) -> PortalResult<FactorListing> {
        let user_id = self.require_session()?.user_id.clone();
        let all = self.store.factors_for_user(&user_id)?;
        let of = |t: FactorType| -> Vec<MfaFactor> {
            all.iter().filter(|f| f.factor_type == t).cloned().collect()
        };
        Ok(FactorListing { totp: of(FactorType::Totp), phone: of(FactorType::Phone), all: all.clone() })
    }

    fn challenge_factor(&mut self, factor_id: &str) -> PortalResult<Challenge> {
        let user_id = self.require_session()?.user_id.clone();
        if !self.store.factors_for_user(&user_id)?.iter().any(|f| f.id == factor_id) {
            return Err(PortalError::Auth(format!("Factor {factor_id} not found")));
        }
        let challenge = Challenge { id: new_id("challenge"), factor_id: factor_id.to_string() };
        self.challenges.push(challenge.clone());
        Ok(challenge)
    }

    fn verify_factor(&mut self, factor_id: &str, challenge_id: &str, code: &str) -> PortalResult<()> {
        let user_id = self.require_session()?.user_id.clone();
        let Some(pos) = self
            .challenges
            .iter()
            .position(|c| c.id == challenge_id && c.factor_id == factor_id)
        else {
            return Err(PortalError::Auth("Challenge not found or expired".into()));
        };
        self.challenges.remove(pos);

        if self.store.mfa_code_for_user(&user_id)?.as_deref() != Some(code) {
            return Err(PortalError::Auth("Invalid TOTP code entered".into()));
        }
        self.assurance = AssuranceStatus { current: AssuranceLevel::Aal2, next: AssuranceLevel::Aal2 };

        let spurious = std::mem::take(&mut self.force_spurious_verify_error)
            || self.verify_rng.chance(self.config.spurious_verify_error_rate);
        if spurious {
            log::debug!("sandbox: spurious verify error after upgrade");
            return Err(PortalError::Transport { message: "Failed to fetch".into() });
        }
        Ok(())
    }

    fn sign_out(&mut self) -> PortalResult<()> {
        self.session = None;
        self.assurance = SIGNED_OUT;
        self.challenges.clear();
        Ok(())
    }

    fn reset_password_for_email(&mut self, email: &str) -> PortalResult<()> {
        self.count("reset_password");
        // Unknown emails succeed too, so the form never reveals which accounts exist.
        if self.store.user_by_email(email)?.is_some() {
            log::info!("sandbox: password reset mail queued");
        }
        Ok(())
    }

    fn customer_by_user(&mut self, user_id: &str) -> PortalResult<Option<Customer>> {
        self.count("customer_by_user");
        self.store.customer_by_user(user_id)
    }

    fn customer_by_id(&mut self, customer_id: &str) -> PortalResult<Option<Customer>> {
        self.count("customer_by_id");
        self.store.customer_by_id(customer_id)
    }

    fn org_role_by_user(&mut self, user_id: &str) -> PortalResult<Option<OrgRole>> {
        self.count("org_role_by_user");
        self.store.org_role_by_user(user_id)
    }

    fn org_roles_for_customer(&mut self, customer_id: &str) -> PortalResult<Vec<OrgRole>> {
        self.count("org_roles_for_customer");
        self.store.org_roles_for_customer(customer_id)
    }

    fn provider_configurations(&mut self, customer_id: &str) -> PortalResult<Vec<ProviderConfiguration>> {
        self.count("provider_configurations");
        self.store.provider_configurations(customer_id)
    }

    fn accounts(&mut self, customer_id: &str, provider: Provider) -> PortalResult<Vec<Account>> {
        self.count("accounts");
        self.store.accounts(customer_id, provider)
    }

    fn payees(&mut self, customer_id: &str) -> PortalResult<Vec<Payee>> {
        self.count("payees");
        self.store.payees(customer_id)
    }

    fn transactions(
        &mut self,
        customer_id: &str,
        provider: Provider,
        offset: usize,
        limit: usize,
    ) -> PortalResult<Vec<Transaction>> {
        self.count("transactions");
        self.store.transactions(customer_id, provider, offset, limit)
    }

    fn invoke(&mut self, function: &str, body: &Value) -> PortalResult<InvokeResponse> {
        let endpoint = body.get("endpoint").and_then(Value::as_str);
        self.store
            .append_proxy_call(function, endpoint, &body.to_string(), self.clock.now())?;

        if let Some(message) = self.fail_next_invoke.take() {
            return Err(PortalError::Transport { message });
        }
        if self.invoke_rng.chance(self.config.invoke_failure_rate) {
            return Err(PortalError::Transport {
                message: "Failed to send a request to the Edge Function".into(),
            });
        }
        if self.session.is_none() {
            return Ok(InvokeResponse::failed(NON_2XX, Some(json!({ "error": "Unauthorized" }))));
        }
        self.route(function, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> SandboxBackend {
        SandboxBackend::seeded(&SandboxFixtures::default_test(), Rc::new(SystemClock)).unwrap()
    }

    #[test]
    fn wrong_password_reports_invalid_login() {
        let mut s = sandbox();
        let err = s.sign_in_with_password("owner@example.com", "nope").unwrap_err();
        assert!(err.to_string().contains("Invalid login"));
    }

    #[test]
    fn enrolled_user_needs_second_factor() {
        let mut s = sandbox();
        s.sign_in_with_password("owner@example.com", "correct-horse").unwrap();
        assert!(s.assurance_level().unwrap().needs_second_factor());
        s.sign_out().unwrap();
        s.sign_in_with_password("member@example.com", "battery-staple").unwrap();
        assert!(!s.assurance_level().unwrap().needs_second_factor());
    }

    #[test]
    fn invoke_is_journaled_even_when_it_fails() {
        let mut s = sandbox();
        s.fail_next_invoke("offline");
        let result = s.invoke("calculate-fee", &json!({ "amount": "10.00" }));
        assert!(matches!(result, Err(PortalError::Transport { .. })));
        assert_eq!(s.proxy_call_count("calculate-fee", None).unwrap(), 1);
    }
}
