//! Data model definitions shared across SurfaceScan crates.
#![allow(missing_docs)]

pub mod ai;
pub mod lab;
pub mod results;
pub mod risk;
pub mod routes;
pub mod scan;

// Intentionally curated re-exports for downstream consumers.
pub use ai::{AiGenerateRequest, DEFAULT_ANALYST_PROMPT};
pub use lab::{InjectionRunRequest, InjectionStatus};
pub use results::{
    DetectedLibrary, HealthReport, QueueStats, ScanInfo, ScanResults,
};
pub use risk::RiskLevel;
pub use scan::{
    CreatedScan, ScanHandle, ScanListPage, ScanRequest, ScanStatus,
    ScanStatusReport, ScanSummary, ScanType,
};
