use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `GET /api/scans/{id}/results`.
///
/// Only the parts the client reasons about are typed; everything else is
/// kept verbatim so views can render backend additions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanResults {
    #[serde(default)]
    pub scan: ScanInfo,
    #[serde(default)]
    pub summary: Value,
    #[serde(default)]
    pub diagnostics: Value,
    #[serde(default)]
    pub libraries: Vec<DetectedLibrary>,
    #[serde(default)]
    pub findings: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub global_risk_score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedLibrary {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub detected_version: Option<String>,
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulns: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `GET /api/queue/stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    #[serde(default)]
    pub waiting: u64,
    #[serde(default)]
    pub active: u64,
}

/// `GET /health`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status.as_deref() == Some("healthy")
    }
}
