//! LLM assessment of a completed scan.

use std::cmp::Ordering;

use serde_json::{Value, json};
use surfacescan_config::AiDefaults;
use surfacescan_model::AiGenerateRequest;

use crate::gateway::ApiPayload;
use crate::lab::ai_request;

/// Libraries and findings beyond this many are left out of the context.
const BRIEF_LIMIT: usize = 20;
const DESCRIPTION_LIMIT: usize = 240;

const ASSESSMENT_PROMPT: &str = "Using the JSON context, generate a structured \
security assessment. Write the answer in four clear sections with markdown \
headings: \n1) Executive Summary (3-5 bullet points, non-technical),\n2) Key \
Risks (ranked, each with severity and short impact),\n3) Technical Details \
(where the issues come from and how they could be exploited),\n4) Prioritized \
Remediation Plan (concrete, actionable steps ordered by priority).\n\nPay \
special attention to the highest-risk libraries and any critical or \
high-severity findings. If the scan appears partial or degraded, clearly \
call this out in the Executive Summary.";

fn field<'a>(value: &'a Value, key: &str) -> &'a Value {
    value.get(key).unwrap_or(&Value::Null)
}

fn object_or_empty(value: &Value, key: &str) -> Value {
    match value.get(key) {
        Some(inner @ Value::Object(_)) => inner.clone(),
        _ => json!({}),
    }
}

fn array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn risk_score(library: &Value) -> f64 {
    match library.get("riskScore") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn vulnerability_count(library: &Value) -> usize {
    array(library, "vulnerabilities").len()
}

fn severity_rank(finding: &Value) -> u8 {
    let severity = finding
        .get("severity")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_ascii_lowercase();
    match severity.as_str() {
        "critical" => 4,
        "high" => 3,
        "moderate" | "medium" => 2,
        "low" => 1,
        _ => 0,
    }
}

fn truncate_description(raw: &str) -> String {
    if raw.chars().count() <= DESCRIPTION_LIMIT {
        return raw.to_string();
    }
    let mut short: String = raw.chars().take(DESCRIPTION_LIMIT - 3).collect();
    short.push_str("...");
    short
}

/// Riskiest libraries first, ties broken by vulnerability count.
fn library_brief(results: &Value) -> Vec<Value> {
    let mut libraries: Vec<&Value> = array(results, "libraries").iter().collect();
    libraries.sort_by(|a, b| {
        risk_score(b)
            .partial_cmp(&risk_score(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| vulnerability_count(b).cmp(&vulnerability_count(a)))
    });
    libraries
        .into_iter()
        .take(BRIEF_LIMIT)
        .map(|library| {
            json!({
                "name": field(library, "name"),
                "version": field(library, "detectedVersion"),
                "riskScore": field(library, "riskScore"),
                "vulnerabilityCount": vulnerability_count(library),
            })
        })
        .collect()
}

fn finding_brief(results: &Value) -> Vec<Value> {
    let mut findings: Vec<&Value> = array(results, "findings").iter().collect();
    // Stable sort keeps backend order within a severity.
    findings.sort_by_key(|finding| std::cmp::Reverse(severity_rank(finding)));
    findings
        .into_iter()
        .take(BRIEF_LIMIT)
        .map(|finding| {
            let description = match finding.get("description") {
                Some(Value::String(text)) => text.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            json!({
                "title": field(finding, "title"),
                "severity": field(finding, "severity"),
                "description": truncate_description(&description),
            })
        })
        .collect()
}

/// Compact context for the assessment: headline scan fields, summary,
/// diagnostics and the top libraries and findings.
pub fn assessment_context(results: &Value) -> Value {
    let scan = field(results, "scan");
    json!({
        "scan": {
            "url": field(scan, "url"),
            "globalRiskScore": field(scan, "globalRiskScore"),
        },
        "summary": object_or_empty(results, "summary"),
        "diagnostics": object_or_empty(results, "diagnostics"),
        "libraries": library_brief(results),
        "top_findings": finding_brief(results),
    })
}

pub fn assessment_request(results: &Value, defaults: &AiDefaults) -> AiGenerateRequest {
    ai_request(ASSESSMENT_PROMPT, defaults).with_context(assessment_context(results))
}

/// Text to show for an AI response: the `output` or `text` field when
/// present, otherwise the whole body.
pub fn response_text(payload: &ApiPayload) -> String {
    match payload {
        ApiPayload::Text(text) => text.clone(),
        ApiPayload::Json(value) => ["output", "text"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str))
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn libraries_are_ranked_by_risk_then_vulnerabilities() {
        let results = json!({
            "libraries": [
                { "name": "a", "riskScore": 10 },
                { "name": "b", "riskScore": "90" },
                { "name": "c", "riskScore": 10, "vulnerabilities": [1, 2] },
                { "name": "d" },
            ]
        });
        let names: Vec<_> = library_brief(&results)
            .iter()
            .map(|lib| lib["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["b", "c", "a", "d"]);
    }

    #[test]
    fn brief_is_capped_at_twenty() {
        let libraries: Vec<_> = (0..30).map(|n| json!({ "name": n, "riskScore": n })).collect();
        let context = assessment_context(&json!({ "libraries": libraries }));
        assert_eq!(context["libraries"].as_array().unwrap().len(), 20);
        assert_eq!(context["libraries"][0]["name"], 29);
    }

    #[test]
    fn findings_sorted_by_severity_and_truncated() {
        let long = "x".repeat(300);
        let results = json!({
            "findings": [
                { "title": "info", "severity": "info" },
                { "title": "crit", "severity": "CRITICAL", "description": long },
                { "title": "mod", "severity": "moderate" },
            ]
        });
        let findings = finding_brief(&results);
        assert_eq!(findings[0]["title"], "crit");
        assert_eq!(findings[1]["title"], "mod");
        let description = findings[0]["description"].as_str().unwrap();
        assert_eq!(description.chars().count(), 240);
        assert!(description.ends_with("..."));
    }

    #[test]
    fn context_tolerates_missing_sections() {
        let context = assessment_context(&json!({ "summary": [1] }));
        assert_eq!(context["summary"], json!({}));
        assert_eq!(context["scan"]["url"], Value::Null);
        assert_eq!(context["top_findings"], json!([]));
    }

    #[test]
    fn response_text_prefers_output_field() {
        assert_eq!(
            response_text(&ApiPayload::Json(json!({ "output": "report", "text": "other" }))),
            "report"
        );
        assert_eq!(
            response_text(&ApiPayload::Json(json!({ "text": "t" }))),
            "t"
        );
        assert!(response_text(&ApiPayload::Json(json!({ "n": 1 }))).contains("\"n\": 1"));
        assert_eq!(response_text(&ApiPayload::Text("plain".into())), "plain");
    }
}
