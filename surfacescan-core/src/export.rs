//! Report export. CycloneDX and VEX documents are built locally from loaded
//! results; the other formats are rendered by the backend.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use surfacescan_model::ScanResults;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Json,
    Pdf,
    Csv,
    CycloneDx,
    Vex,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Json,
        ExportFormat::Pdf,
        ExportFormat::Csv,
        ExportFormat::CycloneDx,
        ExportFormat::Vex,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Csv => "csv",
            ExportFormat::CycloneDx => "cyclonedx",
            ExportFormat::Vex => "vex",
        }
    }

    /// Generated from results already held by the client, without a call.
    pub fn is_local(self) -> bool {
        matches!(self, ExportFormat::CycloneDx | ExportFormat::Vex)
    }

    pub fn suggested_file_name(self) -> String {
        match self {
            ExportFormat::CycloneDx => "sbom-cyclonedx.json".to_string(),
            ExportFormat::Vex => "vex.json".to_string(),
            other => format!("scan_export.{}", other.as_str()),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown export format '{0}' (expected json, pdf, csv, cyclonedx or vex)")]
pub struct UnknownFormat(pub String);

impl FromStr for ExportFormat {
    type Err = UnknownFormat;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_ascii_lowercase();
        ExportFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == wanted)
            .ok_or_else(|| UnknownFormat(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CycloneDxBom {
    pub bom_format: String,
    pub spec_version: String,
    pub version: u32,
    pub metadata: BomMetadata,
    pub components: Vec<BomComponent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomMetadata {
    pub tools: Vec<BomTool>,
    pub component: BomSubject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomTool {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomSubject {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomComponent {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    /// Serialized as `null` when the version was not detected.
    pub version: Option<String>,
}

/// CycloneDX 1.4 SBOM listing every detected library.
pub fn cyclonedx(results: &ScanResults) -> CycloneDxBom {
    let components = results
        .libraries
        .iter()
        .map(|library| BomComponent {
            kind: "library".to_string(),
            name: library
                .name
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            version: library
                .detected_version
                .clone()
                .filter(|version| !version.is_empty()),
        })
        .collect();

    CycloneDxBom {
        bom_format: "CycloneDX".to_string(),
        spec_version: "1.4".to_string(),
        version: 1,
        metadata: BomMetadata {
            tools: vec![BomTool {
                name: "ShieldEye".to_string(),
            }],
            component: BomSubject {
                name: results
                    .scan
                    .url
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string()),
            },
        },
        components,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VexDocument {
    pub vex_version: String,
    pub subject: Option<String>,
    pub findings: Vec<VexFinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VexFinding {
    pub component: VexComponent,
    pub risk_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vulnerabilities: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VexComponent {
    pub name: Option<String>,
    pub version: Option<String>,
}

/// VEX 1.0 document with one finding per detected library.
pub fn vex(results: &ScanResults) -> VexDocument {
    let findings = results
        .libraries
        .iter()
        .map(|library| VexFinding {
            component: VexComponent {
                name: library.name.clone(),
                version: library.detected_version.clone(),
            },
            risk_score: library.risk_score.unwrap_or(0.0),
            vulnerabilities: library.vulns.clone(),
        })
        .collect();

    VexDocument {
        vex_version: "1.0".to_string(),
        subject: results.scan.url.clone(),
        findings,
    }
}

/// Render a locally generated document as pretty JSON.
pub fn render_local(
    format: ExportFormat,
    results: &ScanResults,
) -> Option<Result<String, serde_json::Error>> {
    match format {
        ExportFormat::CycloneDx => Some(serde_json::to_string_pretty(&cyclonedx(results))),
        ExportFormat::Vex => Some(serde_json::to_string_pretty(&vex(results))),
        _ => None,
    }
}
