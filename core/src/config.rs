use crate::{
    model::OrgRoleKind,
    provider::Provider,
    rails::PaymentRail,
    types::CurrencyCode,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    /// Idle time after which the session is force-signed-out.
    pub session_timeout_secs: i64,
    /// Digits in a one-time MFA code.
    pub mfa_code_length: usize,
    /// Rows per provider per transactions page.
    pub transactions_page_size: usize,
    /// Rows shown on the dashboard's recent activity list.
    pub recent_transactions_limit: usize,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Master seed for the sandbox's fault-injection stream.
    pub seed: u64,
    /// Probability that a successful MFA verify still reports a
    /// transport error.
    pub spurious_verify_error_rate: f64,
    /// Probability that any function invocation fails in transport.
    #[serde(default)]
    pub invoke_failure_rate: f64,
    /// Fee the sandbox quotes, as a fraction of the amount.
    pub fee_rate: f64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            spurious_verify_error_rate: 0.0,
            invoke_failure_rate: 0.0,
            fee_rate: 0.001,
        }
    }
}

impl PortalConfig {
    /// Load from `{data_dir}/portal.json`.
    /// In tests, use PortalConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/portal.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PortalConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        if config.session_timeout_secs <= 0 {
            anyhow::bail!("{path}: session_timeout_secs must be positive");
        }
        if config.mfa_code_length == 0 || config.transactions_page_size == 0 {
            anyhow::bail!("{path}: mfa_code_length and transactions_page_size must be non-zero");
        }
        Ok(config)
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self {
            session_timeout_secs: 30 * 60,
            mfa_code_length: 6,
            transactions_page_size: 20,
            recent_transactions_limit: 5,
            sandbox: SandboxConfig::default(),
        }
    }
}

// ── Sandbox fixtures ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureUser {
    pub user_id: String,
    pub email: String,
    pub password: String,
    /// One-time code the sandbox accepts for this user's factors.
    #[serde(default)]
    pub mfa_code: Option<String>,
    #[serde(default)]
    pub factors: Vec<FixtureFactor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureFactor {
    pub id: String,
    pub factor_type: String,
    pub status: String,
    #[serde(default)]
    pub friendly_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureCustomer {
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    pub customer_type: String,
    pub country: String,
    #[serde(default)]
    pub providers: Vec<Provider>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureMember {
    pub user_id: String,
    pub customer_id: String,
    pub role: OrgRoleKind,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureAccount {
    pub id: String,
    pub customer_id: String,
    pub provider: Provider,
    pub currency: CurrencyCode,
    pub balance: f64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixturePayee {
    pub id: String,
    pub customer_id: String,
    pub provider: Provider,
    pub display_name: String,
    pub currency: CurrencyCode,
    #[serde(default)]
    pub rail: Option<PaymentRail>,
    #[serde(default)]
    pub iban: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandboxFixtures {
    #[serde(default)]
    pub users: Vec<FixtureUser>,
    #[serde(default)]
    pub customers: Vec<FixtureCustomer>,
    #[serde(default)]
    pub members: Vec<FixtureMember>,
    #[serde(default)]
    pub accounts: Vec<FixtureAccount>,
    #[serde(default)]
    pub payees: Vec<FixturePayee>,
}

impl SandboxFixtures {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let fixtures: SandboxFixtures = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        Ok(fixtures)
    }

    /// One owner with both rails, one team member, MFA on the owner.
    pub fn default_test() -> Self {
        Self {
            users: vec![
                FixtureUser {
                    user_id: "user-owner".into(),
                    email: "owner@example.com".into(),
                    password: "correct-horse".into(),
                    mfa_code: Some("123456".into()),
                    factors: vec![
                        FixtureFactor {
                            id: "factor-phone".into(),
                            factor_type: "phone".into(),
                            status: "verified".into(),
                            friendly_name: Some("Work phone".into()),
                        },
                        FixtureFactor {
                            id: "factor-totp".into(),
                            factor_type: "totp".into(),
                            status: "verified".into(),
                            friendly_name: Some("Authenticator".into()),
                        },
                    ],
                },
                FixtureUser {
                    user_id: "user-member".into(),
                    email: "member@example.com".into(),
                    password: "battery-staple".into(),
                    mfa_code: None,
                    factors: vec![],
                },
            ],
            customers: vec![FixtureCustomer {
                id: "cust-1".into(),
                user_id: Some("user-owner".into()),
                first_name: None,
                last_name: None,
                company_name: Some("Acme Trading Ltd".into()),
                customer_type: "business".into(),
                country: "GB".into(),
                providers: vec![Provider::EuRail, Provider::UsRail],
            }],
            members: vec![FixtureMember {
                user_id: "user-member".into(),
                customer_id: "cust-1".into(),
                role: OrgRoleKind::Viewer,
                email: Some("member@example.com".into()),
            }],
            accounts: vec![
                FixtureAccount {
                    id: "acc-eur".into(),
                    customer_id: "cust-1".into(),
                    provider: Provider::EuRail,
                    currency: CurrencyCode::new("EUR"),
                    balance: 5_000.0,
                    label: Some("EUR Operating".into()),
                    iban: Some("GB33BUKB20201555555555".into()),
                    account_number: None,
                },
                FixtureAccount {
                    id: "acc-usd-eu".into(),
                    customer_id: "cust-1".into(),
                    provider: Provider::EuRail,
                    currency: CurrencyCode::new("USD"),
                    balance: 750.0,
                    label: Some("USD (EU rail)".into()),
                    iban: None,
                    account_number: Some("99887766".into()),
                },
                FixtureAccount {
                    id: "acc-usd".into(),
                    customer_id: "cust-1".into(),
                    provider: Provider::UsRail,
                    currency: CurrencyCode::new("USD"),
                    balance: 12_500.0,
                    label: Some("USD Operating".into()),
                    iban: None,
                    account_number: Some("000123456789".into()),
                },
            ],
            payees: vec![
                FixturePayee {
                    id: "payee-eur".into(),
                    customer_id: "cust-1".into(),
                    provider: Provider::EuRail,
                    display_name: "Berlin Supplies GmbH".into(),
                    currency: CurrencyCode::new("EUR"),
                    rail: None,
                    iban: Some("DE89370400440532013000".into()),
                    account_number: None,
                    bank_name: Some("Commerzbank".into()),
                },
                FixturePayee {
                    id: "cp-usd".into(),
                    customer_id: "cust-1".into(),
                    provider: Provider::UsRail,
                    display_name: "Austin Parts LLC".into(),
                    currency: CurrencyCode::new("USD"),
                    rail: Some(PaymentRail::Ach),
                    iban: None,
                    account_number: Some("123456789".into()),
                    bank_name: Some("JPMorgan Chase".into()),
                },
            ],
        }
    }
}
