//! Payloads for the injection lab.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionRunRequest {
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tests: Vec<String>,
}

impl InjectionRunRequest {
    pub fn new(url: impl Into<String>, tests: Vec<String>) -> Self {
        Self {
            url: url.into(),
            tests,
        }
    }
}

/// `GET /api/injection/{id}/status`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InjectionStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub results: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
    /// Log lines produced since the task started.
    #[serde(default)]
    pub logs: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InjectionStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self.status.as_deref(), Some("completed" | "failed"))
    }

    /// Progress as a whole percentage, clamped to 0..=100.
    pub fn percent(&self) -> u8 {
        self.progress.map(crate::scan::clamp_progress).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_test_list_is_not_sent() {
        let body = serde_json::to_value(InjectionRunRequest::new(
            "https://t.test",
            Vec::new(),
        ))
        .unwrap();
        assert!(body.get("tests").is_none());
    }

    #[test]
    fn status_reads_logs_and_progress() {
        let status: InjectionStatus = serde_json::from_value(serde_json::json!({
            "status": "running",
            "progress": 42.4,
            "logs": ["probe 1 sent", "probe 2 sent"],
        }))
        .unwrap();
        assert_eq!(status.percent(), 42);
        assert_eq!(status.logs.len(), 2);
        assert!(!status.is_finished());
    }
}
