//! Security header (CSP/SRI) recommendations for a scanned site.

use serde_json::{Map, Value, json};
use surfacescan_config::AiDefaults;
use tracing::{debug, warn};

use crate::error::LabError;
use crate::gateway::{ApiPayload, Gateway};
use crate::lab::ai_request;

const HARDENING_PROMPT: &str = "Given the following scan summary, libraries \
and HTTP/application surface analysis, propose a safe, modern \
Content-Security-Policy header and SRI (sha256) tags for external scripts. \
Output should include: 1) a recommended CSP header, 2) a short explanation \
of key directives, 3) a list of allowed script / connect / frame domains, \
and 4) sample link/script tags with SRI where applicable.";

#[derive(Debug, Clone, PartialEq)]
pub enum HardeningReport {
    /// Produced by the backend's hardening endpoint.
    Backend(ApiPayload),
    /// Produced by the LLM because the endpoint failed.
    Ai(ApiPayload),
}

impl HardeningReport {
    pub fn payload(&self) -> &ApiPayload {
        match self {
            HardeningReport::Backend(payload) | HardeningReport::Ai(payload) => payload,
        }
    }
}

/// Context handed to the LLM: the scan's headline fields, summary and
/// libraries, plus the surface analysis when one could be fetched.
pub fn hardening_context(results: &Value, surface: Option<Value>) -> Value {
    let scan = results.get("scan").cloned().unwrap_or_else(|| json!({}));
    let url = scan
        .get("url")
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .unwrap_or("the target web application");

    let mut context = Map::new();
    context.insert(
        "scan".to_string(),
        json!({
            "url": url,
            "globalRiskScore": scan.get("globalRiskScore").cloned().unwrap_or(Value::Null),
        }),
    );
    context.insert(
        "summary".to_string(),
        results.get("summary").cloned().unwrap_or_else(|| json!({})),
    );
    context.insert(
        "libraries".to_string(),
        results.get("libraries").cloned().unwrap_or_else(|| json!([])),
    );
    if let Some(surface) = surface {
        context.insert("surface".to_string(), surface);
    }
    Value::Object(context)
}

fn has_results(results: Option<&Value>) -> bool {
    match results {
        None | Some(Value::Null) => false,
        Some(Value::Object(map)) => !map.is_empty(),
        Some(_) => true,
    }
}

/// Ask the backend for hardening guidance on `results`, falling back to the
/// LLM when the dedicated endpoint is unavailable or fails.
///
/// `current_scan_id` is used to fetch the surface analysis when the
/// results do not carry their own scan id.
pub async fn generate_hardening(
    gateway: &Gateway,
    results: Option<&Value>,
    current_scan_id: Option<&str>,
    ai: &AiDefaults,
) -> Result<HardeningReport, LabError> {
    let results = match results {
        Some(results) if has_results(Some(results)) => results,
        _ => return Err(LabError::NoResults),
    };

    match gateway.generate_hardening(results).await {
        Ok(payload) => return Ok(HardeningReport::Backend(payload)),
        Err(err) => warn!(error = %err, "hardening endpoint failed, using the LLM"),
    }

    let scan_id = results
        .get("scan")
        .and_then(|scan| scan.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| current_scan_id.map(str::to_string));

    let mut surface = None;
    if let Some(scan_id) = scan_id {
        match gateway.scan_surface(&scan_id).await {
            Ok(value @ Value::Object(_)) => surface = Some(value),
            Ok(_) => {}
            Err(err) => debug!(%scan_id, error = %err, "surface analysis unavailable"),
        }
    }

    let request = ai_request(HARDENING_PROMPT, ai)
        .with_context(hardening_context(results, surface));
    let payload = gateway.generate_ai_analysis(&request).await?;
    Ok(HardeningReport::Ai(payload))
}
