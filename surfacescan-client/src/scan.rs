//! `surfacescan scan`: the host side of the scan controller.
//!
//! This task owns everything that is printed. Background work happens in
//! the controller; its events arrive here and are applied one at a time.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use serde_json::Value;
use surfacescan_config::Settings;
use surfacescan_core::{
    ControllerEvent, ExportFormat, Gateway, ScanController, export,
};
use surfacescan_model::{ScanRequest, ScanResults};
use tracing::info_span;

use crate::cli::ScanArgs;
use crate::render;

pub async fn run(gateway: Gateway, settings: &Settings, args: ScanArgs) -> Result<()> {
    let request = ScanRequest::new(args.url.trim())
        .render_java_script(!args.no_js)
        .timeout_ms(args.timeout_ms)
        .crawl_depth(args.crawl_depth)
        .scan_type(args.scan_type.into());

    let (controller, mut events) = ScanController::new(
        Arc::new(gateway),
        settings.controller_config(),
        info_span!("controller"),
    );
    let run = controller.submit(request);
    println!("Submitting scan of {} ...", args.url.trim());

    let outcome = loop {
        let Some(event) = events.recv().await else {
            bail!("scan controller stopped unexpectedly");
        };
        if event.run() != run {
            continue;
        }

        match event {
            ControllerEvent::Submitted { scan_id, .. } => {
                println!("Scan started: {scan_id}");
            }
            ControllerEvent::Status { handle, .. } => {
                println!("{}", render::progress_line(&handle));
            }
            ControllerEvent::ResultsReady { results, .. } => break Ok(results),
            ControllerEvent::Error { error, .. } => break Err(error),
        }
    };
    controller.shutdown();

    let raw = match outcome {
        Ok(raw) => raw,
        Err(error) => {
            eprintln!("Scan Error: {error}");
            bail!("scan did not complete");
        }
    };

    let results: ScanResults =
        serde_json::from_value(raw.clone()).context("results have an unexpected shape")?;
    print!("{}", render::results_summary(&results));
    if settings.notifications_enabled {
        let (title, message) = render::completion_notice(&results);
        println!("\n{title}\n{message}");
    }

    if let Some(format) = args.export {
        write_export(format, &results, &raw, args.output)?;
    }
    Ok(())
}

/// Write a local export of freshly loaded results. Server-rendered formats
/// only make sense for JSON here since the raw results are already at hand.
fn write_export(
    format: ExportFormat,
    results: &ScanResults,
    raw: &Value,
    output: Option<PathBuf>,
) -> Result<()> {
    let content = match export::render_local(format, results) {
        Some(rendered) => rendered?,
        None if format == ExportFormat::Json => render::pretty(raw),
        None => bail!("{format} exports are produced by the backend; use `surfacescan export`"),
    };
    let path = output.unwrap_or_else(|| PathBuf::from(format.suggested_file_name()));
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Export completed: {}", path.display());
    Ok(())
}
