//! Outbound requests and the interpretation of what comes back.
//!
//! Every submission produces exactly one `ProxyRequest`. The response is
//! reduced to a `SubmissionOutcome` carrying a display string on failure;
//! nothing here propagates a failed submission as an `Err`.

use crate::{
    backend::{Backend, InvokeResponse},
    error::PortalResult,
    provider::Provider,
    types::CurrencyCode,
    wizard::{NextStep, WizardFlow},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ProxyFunction {
    FrProxy,
    RailProxy,
    CalculateFee,
    CreatePlatformUser,
    ToggleUserStatus,
}

impl ProxyFunction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::FrProxy => "fr-proxy",
            Self::RailProxy => "rail-proxy",
            Self::CalculateFee => "calculate-fee",
            Self::CreatePlatformUser => "create-platform-user",
            Self::ToggleUserStatus => "toggle-user-status",
        }
    }

    pub fn for_provider(provider: Provider) -> Self {
        match provider {
            Provider::EuRail => Self::FrProxy,
            Provider::UsRail => Self::RailProxy,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
}

/// What the rail proxies expect: where to forward, and for whom.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProxyEnvelope {
    pub endpoint: String,
    pub method: HttpMethod,
    #[serde(rename = "customerId")]
    pub customer_id: String,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProxyRequest {
    pub function: ProxyFunction,
    pub body: Value,
}

impl ProxyRequest {
    /// A request forwarded to `provider`'s REST API through its proxy.
    pub fn proxied(
        provider: Provider,
        endpoint: &str,
        method: HttpMethod,
        customer_id: &str,
        body: Value,
    ) -> Self {
        let envelope = ProxyEnvelope {
            endpoint: endpoint.to_string(),
            method,
            customer_id: customer_id.to_string(),
            body,
        };
        Self {
            function: ProxyFunction::for_provider(provider),
            body: json!(envelope),
        }
    }

    /// A request handled by a function itself rather than forwarded.
    pub fn direct(function: ProxyFunction, body: Value) -> Self {
        Self { function, body }
    }

    pub fn envelope(&self) -> Option<ProxyEnvelope> {
        match self.function {
            ProxyFunction::FrProxy | ProxyFunction::RailProxy => {
                serde_json::from_value(self.body.clone()).ok()
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    Succeeded { data: Value },
    Failed { message: String },
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Failed { message } => Some(message),
            Self::Succeeded { .. } => None,
        }
    }
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `"{position}: {issue}"` pairs joined with ", ", if the body has any.
pub fn format_warnings(body: &Value) -> Option<String> {
    let warnings = body.get("warnings")?.as_array()?;
    let parts: Vec<String> = warnings
        .iter()
        .filter_map(|w| {
            let issue = non_empty_str(w.get("issue"))?;
            Some(match w.get("position") {
                Some(Value::String(p)) => format!("{p}: {issue}"),
                Some(Value::Number(n)) => format!("{n}: {issue}"),
                _ => issue,
            })
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// Best display string for an error body: structured warnings first
/// (they name the offending field), then `message`, then `error`, then
/// the body itself.
pub fn extract_error_message(body: &Value) -> String {
    if let Some(warnings) = format_warnings(body) {
        return warnings;
    }
    if let Some(message) = non_empty_str(body.get("message")) {
        return message;
    }
    match body.get("error") {
        Some(Value::String(s)) if !s.trim().is_empty() => return s.clone(),
        Some(err @ Value::Object(_)) => {
            if let Some(message) = non_empty_str(err.get("message")) {
                return message;
            }
        }
        _ => {}
    }
    match body {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_business_error(data: &Value) -> bool {
    let flagged = |key: &str| data.get(key).is_some_and(|v| !v.is_null() && v != &json!(false));
    flagged("error") || flagged("errorCode")
}

/// Reduce a function response to an outcome.
pub fn classify(response: InvokeResponse) -> SubmissionOutcome {
    if let Some(err) = response.error {
        let message = err
            .context
            .as_ref()
            .map(extract_error_message)
            .unwrap_or(err.message);
        return SubmissionOutcome::Failed { message };
    }
    let data = response.data.unwrap_or(Value::Null);
    if is_business_error(&data) {
        return SubmissionOutcome::Failed { message: extract_error_message(&data) };
    }
    SubmissionOutcome::Succeeded { data }
}

/// Send one request and classify the answer. Never fails: a call that
/// could not be made at all becomes a `Failed` outcome too.
pub fn dispatch<B: Backend + ?Sized>(backend: &mut B, request: &ProxyRequest) -> SubmissionOutcome {
    let name = request.function.name();
    if let Some(env) = request.envelope() {
        log::info!("submit {name} {:?} {}", env.method, env.endpoint);
    } else {
        log::info!("submit {name}");
    }
    log::debug!("submit {name} body: {}", request.body);

    let outcome = match backend.invoke(name, &request.body) {
        Ok(response) => classify(response),
        Err(e) => SubmissionOutcome::Failed { message: e.to_string() },
    };
    match &outcome {
        SubmissionOutcome::Succeeded { .. } => log::info!("submit {name}: succeeded"),
        SubmissionOutcome::Failed { message } => log::warn!("submit {name}: {message}"),
    }
    outcome
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeeQuote {
    pub fee: f64,
    #[serde(rename = "feeCurrency", default)]
    pub fee_currency: Option<CurrencyCode>,
}

/// Ask for a fee quote. Quotes are advisory: any failure yields `None`.
pub fn quote_fee<B: Backend + ?Sized>(backend: &mut B, request: &ProxyRequest) -> Option<FeeQuote> {
    match dispatch(backend, request) {
        SubmissionOutcome::Succeeded { data } => match serde_json::from_value(data) {
            Ok(quote) => Some(quote),
            Err(e) => {
                log::warn!("fee quote unreadable: {e}");
                None
            }
        },
        SubmissionOutcome::Failed { message } => {
            log::warn!("fee calculation unavailable: {message}");
            None
        }
    }
}

/// What one press of "Next" did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pressed {
    pub step: NextStep,
    /// The function invoked, when a request actually went out.
    pub sent: Option<ProxyFunction>,
}

/// Press "Next" on `wizard`; if that confirms the last step, send its
/// request and record the outcome. At most one request per call.
pub fn submit_step<W, B>(wizard: &mut W, backend: &mut B) -> PortalResult<Pressed>
where
    W: WizardFlow + ?Sized,
    B: Backend + ?Sized,
{
    let step = wizard.next();
    let Some(ticket) = step.ticket() else {
        return Ok(Pressed { step, sent: None });
    };
    let (outcome, sent) = match wizard.build_request() {
        Ok(request) => (dispatch(backend, &request), Some(request.function)),
        Err(e) => (SubmissionOutcome::Failed { message: e.to_string() }, None),
    };
    wizard.complete(ticket, outcome)?;
    Ok(Pressed { step, sent })
}
