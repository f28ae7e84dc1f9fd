use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use surfacescan_core::ExportFormat;
use surfacescan_model::ScanType;

#[derive(Parser)]
#[command(
    name = "surfacescan",
    version,
    about = "Client for the ShieldEye SurfaceScan backend"
)]
pub struct Cli {
    /// Settings file to use instead of the per-user one
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Backend URL for this invocation only
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Submit a scan and follow it until it finishes
    Scan(ScanArgs),
    /// List recent scans
    List {
        #[arg(long, default_value_t = 50)]
        limit: u32,
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },
    /// Show the status of a scan
    Status { scan_id: String },
    /// Print the results of a completed scan
    Results {
        scan_id: String,
        /// Print the raw JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Print the HTTP/application surface analysis of a scan
    Surface { scan_id: String },
    /// Delete a scan
    Delete { scan_id: String },
    /// Check backend health and readiness
    Health,
    /// Watch backend connectivity until interrupted
    Monitor,
    /// Show job queue statistics
    Queue,
    /// Show the analytics summary
    Analytics,
    /// Export a scan report
    Export {
        scan_id: String,
        #[arg(long, value_parser = parse_export_format)]
        format: Option<ExportFormat>,
        /// Output file (defaults to the suggested file name)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Ask the backend's LLM for an assessment of a scan, or a free prompt
    Ai {
        /// Scan whose results should be assessed
        #[arg(required_unless_present = "prompt")]
        scan_id: Option<String>,
        #[arg(long, conflicts_with = "scan_id")]
        prompt: Option<String>,
    },
    /// Run prompt-injection probes against a page
    Injection {
        url: String,
        /// Restrict to these test ids
        #[arg(long = "test")]
        tests: Vec<String>,
    },
    /// Generate CSP/SRI hardening guidance for a scan
    Hardening { scan_id: String },
    /// Inspect or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(clap::Args)]
pub struct ScanArgs {
    pub url: String,
    #[arg(long, value_enum, default_value = "comprehensive")]
    pub scan_type: ScanTypeArg,
    #[arg(long, default_value_t = 1)]
    pub crawl_depth: u32,
    /// Page load timeout in milliseconds
    #[arg(long, default_value_t = 30_000)]
    pub timeout_ms: u64,
    /// Skip JavaScript rendering
    #[arg(long)]
    pub no_js: bool,
    /// Also write a local export once results are loaded
    #[arg(long, value_parser = parse_export_format)]
    pub export: Option<ExportFormat>,
    #[arg(long, short, requires = "export")]
    pub output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ScanTypeArg {
    Comprehensive,
    Quick,
    Deep,
    Surface,
}

impl From<ScanTypeArg> for ScanType {
    fn from(arg: ScanTypeArg) -> Self {
        match arg {
            ScanTypeArg::Comprehensive => ScanType::Comprehensive,
            ScanTypeArg::Quick => ScanType::Quick,
            ScanTypeArg::Deep => ScanType::Deep,
            ScanTypeArg::Surface => ScanType::Surface,
        }
    }
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print every setting
    Show,
    /// Print one setting
    Get { key: String },
    /// Change one setting and save
    Set { key: String, value: String },
    /// Restore the defaults and save
    Reset,
    /// Print the settings file location
    Path,
    /// Print the backend's settings
    Remote,
    /// Send the local LLM settings to the backend
    Push,
    /// Point at a backend and check that it answers
    TestConnection { url: String },
}

fn parse_export_format(raw: &str) -> Result<ExportFormat, String> {
    raw.parse().map_err(|err: surfacescan_core::export::UnknownFormat| err.to_string())
}
