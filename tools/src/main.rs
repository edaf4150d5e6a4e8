//! portal-runner: drives the portal core against the sandbox backend.
//!
//! Usage:
//!   portal-runner --data-dir ./data
//!   portal-runner --data-dir ./data --db sandbox.db --seed 7
//!   portal-runner --ipc-mode          (JSON lines on stdin/stdout)

use anyhow::{Context, Result};
use dualrail_core::{
    clock::{Clock, SystemClock},
    config::{PortalConfig, SandboxFixtures},
    format::{format_currency, mask_iban},
    payment::matching_accounts,
    portal::Portal,
    rails::PaymentRail,
    sandbox::SandboxBackend,
    store::SandboxStore,
    wizard::{NextStep, WizardFlow},
};
use serde_json::json;
use std::env;
use std::io::{self, BufRead, Write};
use std::rc::Rc;

type SandboxPortal = Portal<SandboxBackend>;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    SignIn {
        email: String,
        password: String,
    },
    VerifyMfa {
        code: String,
    },
    SignOut,
    Touch,
    CheckInactivity,
    Pay {
        payee_id: String,
        account_id: Option<String>,
        amount: String,
        reference: String,
    },
    AddPayee {
        name: String,
        currency: String,
        #[serde(default)]
        iban: String,
        #[serde(default)]
        sort_code: String,
        #[serde(default)]
        account_number: String,
        #[serde(default)]
        routing_number: String,
    },
    Quit,
}

#[derive(serde::Serialize)]
struct UiAccount {
    id: String,
    provider: String,
    label: String,
    balance: String,
}

#[derive(serde::Serialize)]
struct UiState {
    authenticated: bool,
    mfa_required: bool,
    session_expires: Option<String>,
    customer: Option<String>,
    accounts: Vec<UiAccount>,
    payees: usize,
    recent: Vec<String>,
    events: usize,
    last_error: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let data_dir = str_arg(&args, "--data-dir", "./data");
    let db = str_arg(&args, "--db", ":memory:");

    let mut config = PortalConfig::load(data_dir)?;
    config.sandbox.seed = parse_arg(&args, "--seed", config.sandbox.seed);
    let fixtures_path = format!("{data_dir}/fixtures/sandbox.json");
    let fixtures = SandboxFixtures::load(&fixtures_path)?;

    if !ipc_mode {
        println!("dualrail portal-runner");
        println!("  data_dir:  {data_dir}");
        println!("  db:        {db}");
        println!("  seed:      {}", config.sandbox.seed);
        println!("  started:   {}", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"));
        println!();
    }

    let store = if db == ":memory:" { SandboxStore::in_memory()? } else { SandboxStore::open(db)? };
    let clock: Rc<dyn Clock> = Rc::new(SystemClock);
    let mut sandbox = SandboxBackend::new(store, config.sandbox.clone(), clock.clone())?;
    sandbox.seed(&fixtures)?;

    let mut portal = Portal::new(sandbox, config, clock);

    if ipc_mode {
        run_ipc_loop(&mut portal)?;
    } else {
        run_demo(&mut portal, &fixtures)?;
        print_summary(&mut portal)?;
    }
    Ok(())
}

fn run_ipc_loop(portal: &mut SandboxPortal) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                writeln!(stdout, "{}", json!({ "error": e.to_string() }))?;
                stdout.flush()?;
                continue;
            }
        };
        if matches!(cmd, IpcCommand::Quit) {
            break;
        }

        let last_error = handle_command(portal, cmd).err().map(|e| e.to_string());
        let state = build_ui_state(portal, last_error)?;
        writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn handle_command(portal: &mut SandboxPortal, cmd: IpcCommand) -> Result<()> {
    match cmd {
        IpcCommand::GetState | IpcCommand::Quit => {}
        IpcCommand::SignIn { email, password } => {
            portal.sign_in(&email, &password)?;
        }
        IpcCommand::VerifyMfa { code } => portal.verify_mfa(&code)?,
        IpcCommand::SignOut => portal.sign_out(),
        IpcCommand::Touch => portal.touch(),
        IpcCommand::CheckInactivity => {
            portal.tick_inactivity();
        }
        IpcCommand::Pay { payee_id, account_id, amount, reference } => {
            portal.touch();
            pay(portal, &payee_id, account_id.as_deref(), &amount, &reference)?;
        }
        IpcCommand::AddPayee { name, currency, iban, sort_code, account_number, routing_number } => {
            portal.touch();
            let mut sheet = portal.open_payee_sheet()?;
            sheet.set_currency(currency.as_str());
            sheet.set_name(&name);
            sheet.set_iban(&iban);
            sheet.set_sort_code(&sort_code);
            sheet.set_account_number(&account_number);
            sheet.set_routing_number(&routing_number);
            finish(portal.create_payee(&mut sheet)?, sheet.controller().error())?;
        }
    }
    Ok(())
}

fn finish(step: NextStep, error: Option<&str>) -> Result<()> {
    match (step, error) {
        (NextStep::Blocked, _) => anyhow::bail!("form incomplete"),
        (_, Some(message)) => anyhow::bail!("{message}"),
        _ => Ok(()),
    }
}

/// Walk the payment wizard end to end for one payee.
fn pay(
    portal: &mut SandboxPortal,
    payee_id: &str,
    account_id: Option<&str>,
    amount: &str,
    reference: &str,
) -> Result<()> {
    let payee = portal
        .payees()?
        .into_iter()
        .find(|p| p.id == payee_id)
        .with_context(|| format!("unknown payee {payee_id}"))?;
    let book = portal.accounts()?;
    let account = matching_accounts(book.accounts(), &payee)
        .into_iter()
        .find(|a| account_id.map_or(true, |id| a.id == id))
        .cloned()
        .with_context(|| format!("no {} account can pay {}", payee.currency, payee.display_name))?;

    let mut wizard = portal.open_payment_for_payee(payee)?;
    wizard.select_account(account)?;
    wizard.set_amount(amount);
    wizard.set_reference(reference);

    let step = portal.submit_payment(&mut wizard)?;
    if step == NextStep::Blocked {
        anyhow::bail!(wizard.step_problem(wizard.controller().index()).unwrap_or_default());
    }
    if let Some(total) = wizard.total_with_fee() {
        log::info!("total with fee: {total:.2}");
    }
    finish(portal.submit_payment(&mut wizard)?, wizard.controller().error())
}

fn run_demo(portal: &mut SandboxPortal, fixtures: &SandboxFixtures) -> Result<()> {
    let owner = fixtures
        .users
        .iter()
        .find(|u| !u.factors.is_empty())
        .or_else(|| fixtures.users.first())
        .context("fixtures contain no users")?;

    println!("── sign in as {} ──", owner.email);
    let outcome = portal.sign_in(&owner.email, &owner.password)?;
    if outcome.needs_mfa {
        let code = owner.mfa_code.clone().context("owner has factors but no code")?;
        portal.verify_mfa(&code)?;
        println!("  second factor accepted");
    }
    let customer = portal.context()?.customer.display_name();
    println!("  acting for {customer}");

    if portal.context()?.has_provider(dualrail_core::provider::Provider::UsRail) {
        println!("── register a counterparty ──");
        let mut wizard = portal.open_counterparty_wizard()?;
        wizard.set_currency("USD");
        wizard.set_rail(PaymentRail::Ach);
        wizard.set_name("Denver Freight Co");
        wizard.set_email("billing@denverfreight.example");
        wizard.set_phone("+13035550123");
        {
            let a = wizard.address_mut();
            a.line1 = "1700 Lincoln Street, Suite 2400, Attn Accounts Payable".into();
            a.city = "Denver".into();
            a.state = "CO".into();
            a.postal_code = "80203".into();
        }
        wizard.set_account_number("000987654321");
        wizard.set_routing_number("102000021");
        wizard.set_institution_name("US Bank");
        {
            let a = wizard.institution_address_mut();
            a.line1 = "425 Walnut Street".into();
            a.city = "Cincinnati".into();
        }
        for _ in 0..wizard.controller().step_count() {
            portal.create_counterparty(&mut wizard)?;
        }
        match wizard.controller().outcome() {
            Some(o) if o.is_success() => println!("  counterparty created"),
            Some(o) => println!("  counterparty failed: {}", o.message().unwrap_or_default()),
            None => println!("  counterparty wizard stopped at {}", wizard.controller().step_name()),
        }
    }

    println!("── pay every saved payee ──");
    for payee in portal.payees()? {
        let reference = format!("DEMO{}", payee.currency);
        match pay(portal, &payee.id, None, "125.00", &reference) {
            Ok(()) => println!("  paid {} {}", payee.display_name, format_currency(125.0, &payee.currency)),
            Err(e) => println!("  {}: {e}", payee.display_name),
        }
    }
    Ok(())
}

fn build_ui_state(portal: &mut SandboxPortal, last_error: Option<String>) -> Result<UiState> {
    let authenticated = portal.auth().is_authenticated();
    let mfa_required = portal.auth().mfa_required();
    let session_expires = portal.auth().deadline().map(|d| d.to_rfc3339());
    let customer = portal.auth().context().map(|c| c.customer.display_name());
    let (accounts, payees, recent) = if portal.context().is_ok() {
        let accounts: Vec<UiAccount> = portal
            .accounts()?
            .accounts()
            .iter()
            .map(|a| UiAccount {
                id: a.id.clone(),
                provider: a.provider.key().to_string(),
                label: a.display_label(),
                balance: format_currency(a.balance, &a.currency),
            })
            .collect();
        let payees = portal.payees()?.len();
        let recent: Vec<String> = portal
            .recent_transactions()?
            .iter()
            .map(|t| format!("{} {} {}", t.transaction_type, format_currency(t.amount, &t.currency), t.status))
            .collect();
        (accounts, payees, recent)
    } else {
        (Vec::new(), 0, Vec::new())
    };
    Ok(UiState {
        authenticated,
        mfa_required,
        session_expires,
        customer,
        accounts,
        payees,
        recent,
        events: portal.events().len(),
        last_error,
    })
}

fn print_summary(portal: &mut SandboxPortal) -> Result<()> {
    println!();
    println!("=== ACCOUNTS ===");
    let book = portal.accounts()?;
    for a in book.accounts() {
        let iban = a.iban.as_deref().map(mask_iban).unwrap_or_default();
        println!(
            "  {:<16} {:<8} {:>20}  {iban}",
            a.display_label(),
            a.provider.key(),
            format_currency(a.balance, &a.currency)
        );
    }
    for (currency, total) in book.balance_by_currency() {
        println!("  total {currency}: {}", format_currency(total, &currency));
    }

    println!();
    println!("=== RECENT ACTIVITY ===");
    for t in portal.recent_transactions()? {
        println!(
            "  {:<10} {:>16}  {:<8} {}",
            t.transaction_type,
            format_currency(t.amount, &t.currency),
            t.status,
            t.counterparty_name.unwrap_or_default()
        );
    }

    println!();
    println!("=== OUTBOUND CALLS ===");
    for call in portal.backend().proxy_calls()? {
        println!("  {:<22} {}", call.function_name, call.endpoint.unwrap_or_default());
    }
    println!("  journal entries: {}", portal.events().len());
    Ok(())
}

fn str_arg<'a>(args: &'a [String], flag: &str, default: &'a str) -> &'a str {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .unwrap_or(default)
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
