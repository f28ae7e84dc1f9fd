use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Depth of analysis requested from the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ScanType {
    #[default]
    Comprehensive,
    Quick,
    Deep,
    Surface,
    /// Backend-defined type this client does not know about.
    Other(String),
}

impl ScanType {
    pub fn as_str(&self) -> &str {
        match self {
            ScanType::Comprehensive => "comprehensive",
            ScanType::Quick => "quick",
            ScanType::Deep => "deep",
            ScanType::Surface => "surface",
            ScanType::Other(raw) => raw,
        }
    }
}

impl From<&str> for ScanType {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "comprehensive" => ScanType::Comprehensive,
            "quick" => ScanType::Quick,
            "deep" => ScanType::Deep,
            "surface" => ScanType::Surface,
            _ => ScanType::Other(raw.trim().to_string()),
        }
    }
}

impl fmt::Display for ScanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ScanType {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ScanType {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(ScanType::from(raw.as_str()))
    }
}

/// Body of `POST /api/scans`.
///
/// Built by the UI and handed to the gateway exactly once; the field names
/// on the wire are camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub url: String,
    pub render_java_script: bool,
    /// Page load timeout in milliseconds
    pub timeout: u64,
    pub crawl_depth: u32,
    pub scan_type: ScanType,
}

impl ScanRequest {
    pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
    pub const DEFAULT_CRAWL_DEPTH: u32 = 1;

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            render_java_script: true,
            timeout: Self::DEFAULT_TIMEOUT_MS,
            crawl_depth: Self::DEFAULT_CRAWL_DEPTH,
            scan_type: ScanType::default(),
        }
    }

    pub fn render_java_script(mut self, enabled: bool) -> Self {
        self.render_java_script = enabled;
        self
    }

    pub fn timeout_ms(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn crawl_depth(mut self, depth: u32) -> Self {
        self.crawl_depth = depth;
        self
    }

    pub fn scan_type(mut self, scan_type: ScanType) -> Self {
        self.scan_type = scan_type;
        self
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Also assumed when a status report omits the field.
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    /// Any status string the backend adds later; treated as in-flight.
    #[serde(other)]
    Unknown,
}

impl ScanStatus {
    /// `completed` and `failed` end the polling loop.
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScanStatus::Pending => "pending",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
            ScanStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of `POST /api/scans`. Only the id is required by the client,
/// and even that is validated by the caller rather than by serde so a
/// missing id can be reported as invalid data.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatedScan {
    #[serde(default, deserialize_with = "deserialize_scan_id")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_lenient_status")]
    pub status: Option<ScanStatus>,
}

/// Ids arrive as strings or, from some backends, as integers.
fn deserialize_scan_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(id)) => Some(id),
        Some(serde_json::Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

/// The create reply's status is informational; a malformed one is dropped.
fn deserialize_lenient_status<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<ScanStatus>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| serde_json::from_value(value).ok()))
}

/// Response of `GET /api/scans/{id}/status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanStatusReport {
    #[serde(default)]
    pub status: ScanStatus,
    #[serde(default, deserialize_with = "deserialize_progress")]
    pub progress: u8,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Backends report progress as either an integer or a float; anything
/// outside 0..=100 is clamped.
fn deserialize_progress<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<u8, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(serde_json::Value::as_f64)
        .map(clamp_progress)
        .unwrap_or(0))
}

pub fn clamp_progress(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// Controller-owned view of the scan currently being tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanHandle {
    pub scan_id: String,
    pub status: ScanStatus,
    pub progress: u8,
    pub stage: Option<String>,
    pub error: Option<String>,
}

impl ScanHandle {
    pub fn new(scan_id: impl Into<String>) -> Self {
        Self {
            scan_id: scan_id.into(),
            status: ScanStatus::Pending,
            progress: 0,
            stage: None,
            error: None,
        }
    }

    pub fn apply(&mut self, report: &ScanStatusReport) {
        self.status = report.status;
        self.progress = report.progress.min(100);
        self.stage = report.stage.clone();
        self.error = report.error.clone();
    }
}

/// Row of `GET /api/scans`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<ScanStatus>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub global_risk_score: Option<f64>,
}

/// Backends return either a bare array or `{scans: [...], total}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScanListPage {
    Wrapped {
        scans: Vec<ScanSummary>,
        #[serde(default)]
        total: Option<u64>,
    },
    Bare(Vec<ScanSummary>),
}

impl ScanListPage {
    pub fn scans(&self) -> &[ScanSummary] {
        match self {
            ScanListPage::Wrapped { scans, .. } => scans,
            ScanListPage::Bare(scans) => scans,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_camel_case() {
        let request = ScanRequest::new("https://example.com")
            .crawl_depth(2)
            .scan_type(ScanType::Quick);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "url": "https://example.com",
                "renderJavaScript": true,
                "timeout": 30000,
                "crawlDepth": 2,
                "scanType": "quick",
            })
        );
    }

    #[test]
    fn unknown_scan_type_is_preserved() {
        let parsed: ScanType = serde_json::from_value(json!("Stealth")).unwrap();
        assert_eq!(parsed, ScanType::Other("Stealth".into()));
        assert_eq!(parsed.as_str(), "Stealth");
    }

    #[test]
    fn status_report_tolerates_float_and_missing_progress() {
        let report: ScanStatusReport = serde_json::from_value(json!({
            "status": "running",
            "progress": 49.6,
            "stage": "crawl",
        }))
        .unwrap();
        assert_eq!(report.progress, 50);
        assert_eq!(report.stage.as_deref(), Some("crawl"));

        let report: ScanStatusReport =
            serde_json::from_value(json!({ "status": "pending" })).unwrap();
        assert_eq!(report.progress, 0);
    }

    #[test]
    fn progress_is_clamped() {
        assert_eq!(clamp_progress(140.0), 100);
        assert_eq!(clamp_progress(-3.0), 0);
        assert_eq!(clamp_progress(f64::NAN), 0);
    }

    #[test]
    fn unrecognised_status_is_not_terminal() {
        let report: ScanStatusReport =
            serde_json::from_value(json!({ "status": "queued" })).unwrap();
        assert_eq!(report.status, ScanStatus::Unknown);
        assert!(!report.status.is_terminal());
        assert!(ScanStatus::Failed.is_terminal());
    }

    #[test]
    fn status_report_without_status_is_pending() {
        let report: ScanStatusReport =
            serde_json::from_value(json!({ "progress": 20, "stage": "crawl" }))
                .unwrap();
        assert_eq!(report.status, ScanStatus::Pending);
        assert_eq!(report.progress, 20);
        assert!(!report.status.is_terminal());
    }

    #[test]
    fn created_scan_accepts_numeric_id() {
        let created: CreatedScan =
            serde_json::from_value(json!({ "id": 42, "status": "pending" }))
                .unwrap();
        assert_eq!(created.id.as_deref(), Some("42"));
        assert_eq!(created.status, Some(ScanStatus::Pending));
    }

    #[test]
    fn created_scan_ignores_malformed_status() {
        let created: CreatedScan =
            serde_json::from_value(json!({ "id": "abc", "status": 3 })).unwrap();
        assert_eq!(created.id.as_deref(), Some("abc"));
        assert_eq!(created.status, None);

        let created: CreatedScan =
            serde_json::from_value(json!({ "id": null })).unwrap();
        assert_eq!(created.id, None);
    }

    #[test]
    fn scan_list_accepts_both_shapes() {
        let bare: ScanListPage =
            serde_json::from_value(json!([{ "id": "a" }])).unwrap();
        assert_eq!(bare.scans().len(), 1);

        let wrapped: ScanListPage = serde_json::from_value(json!({
            "scans": [{ "id": "a", "url": "https://x" }, { "id": "b" }],
            "total": 2,
        }))
        .unwrap();
        assert_eq!(wrapped.scans()[0].url.as_deref(), Some("https://x"));
        assert_eq!(wrapped.scans().len(), 2);
    }
}
