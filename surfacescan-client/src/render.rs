//! Plain-text presentation of backend data.

use std::fmt::Write as _;

use serde_json::Value;
use surfacescan_model::{
    QueueStats, RiskLevel, ScanHandle, ScanListPage, ScanResults,
};

const BAR_WIDTH: usize = 30;

pub fn progress_line(handle: &ScanHandle) -> String {
    let filled = usize::from(handle.progress) * BAR_WIDTH / 100;
    let mut line = format!(
        "[{}{}] {:>3}% {}",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        handle.progress,
        handle.status
    );
    if let Some(stage) = handle.stage.as_deref().filter(|s| !s.is_empty()) {
        let _ = write!(line, " ({stage})");
    }
    line
}

/// Title and message of the scan-complete notice.
pub fn completion_notice(results: &ScanResults) -> (String, String) {
    let score = results.scan.global_risk_score.unwrap_or(0.0);
    let url = results.scan.url.as_deref().unwrap_or("unknown");
    let title = RiskLevel::from_score(score).headline().to_string();
    let message = format!("Scan of {url} completed with risk score: {score:.1}");
    (title, message)
}

pub fn results_summary(results: &ScanResults) -> String {
    let mut out = String::new();
    let score = results.scan.global_risk_score.unwrap_or(0.0);
    let _ = writeln!(
        out,
        "Target: {}",
        results.scan.url.as_deref().unwrap_or("unknown")
    );
    let _ = writeln!(
        out,
        "Global risk: {score:.1} ({})",
        RiskLevel::from_score(score)
    );
    let _ = writeln!(out, "Libraries: {}", results.libraries.len());

    let mut libraries: Vec<_> = results.libraries.iter().collect();
    libraries.sort_by(|a, b| {
        b.risk_score
            .unwrap_or(0.0)
            .total_cmp(&a.risk_score.unwrap_or(0.0))
    });
    for library in libraries {
        let _ = writeln!(
            out,
            "  {:<28} {:<12} risk {:>5.1}",
            library.name.as_deref().unwrap_or("unknown"),
            library.detected_version.as_deref().unwrap_or("-"),
            library.risk_score.unwrap_or(0.0)
        );
    }

    if !results.findings.is_empty() {
        let _ = writeln!(out, "Findings: {}", results.findings.len());
        for finding in &results.findings {
            let title = finding
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or("untitled");
            let severity = finding
                .get("severity")
                .and_then(Value::as_str)
                .unwrap_or("info");
            let _ = writeln!(out, "  [{severity}] {title}");
        }
    }
    out
}

pub fn scan_list(page: &ScanListPage) -> String {
    let mut out = String::new();
    if page.scans().is_empty() {
        out.push_str("No scans yet\n");
        return out;
    }
    for scan in page.scans() {
        let status = scan.status.map(|s| s.as_str()).unwrap_or("-");
        let risk = scan
            .global_risk_score
            .map(|score| format!("{score:.1}"))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<38} {:<10} {:>6}  {}",
            scan.id,
            status,
            risk,
            scan.url.as_deref().unwrap_or("")
        );
    }
    out
}

pub fn queue(stats: &QueueStats) -> String {
    format!("waiting: {}\nactive:  {}", stats.waiting, stats.active)
}

pub fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
