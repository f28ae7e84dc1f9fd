use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use serde_json::{Map, Value, json};
use surfacescan_config::{Settings, SettingsStore};
use surfacescan_core::{
    ApiPayload, ExportFormat, Gateway, HealthEvent, HealthMonitor, analysis,
    export::render_local,
    hardening::{HardeningReport, generate_hardening},
    lab::{InjectionLab, InjectionOutcome, LabEvent, ai_request},
};
use surfacescan_model::{ScanResults, ScanStatusReport};
use tokio::sync::mpsc;
use tracing::info_span;

use crate::cli::SettingsAction;
use crate::render;

fn print_payload(payload: ApiPayload) {
    match payload {
        ApiPayload::Json(value) => println!("{}", render::pretty(&value)),
        ApiPayload::Text(text) => println!("{text}"),
    }
}

pub async fn list(gateway: &Gateway, limit: u32, offset: u32) -> Result<()> {
    let page = gateway.list_scans(limit, offset).await?;
    print!("{}", render::scan_list(&page));
    Ok(())
}

pub async fn status(gateway: &Gateway, scan_id: &str) -> Result<()> {
    let ScanStatusReport {
        status,
        progress,
        stage,
        error,
    } = gateway.scan_status(scan_id).await?;
    println!("{scan_id}: {status} {progress}%");
    if let Some(stage) = stage {
        println!("stage: {stage}");
    }
    if let Some(error) = error {
        println!("error: {error}");
    }
    Ok(())
}

pub async fn results(gateway: &Gateway, scan_id: &str, raw: bool) -> Result<()> {
    let value = gateway.scan_results(scan_id).await?;
    if raw {
        println!("{}", render::pretty(&value));
        return Ok(());
    }
    let results: ScanResults =
        serde_json::from_value(value).context("results have an unexpected shape")?;
    print!("{}", render::results_summary(&results));
    Ok(())
}

pub async fn surface(gateway: &Gateway, scan_id: &str) -> Result<()> {
    println!("{}", render::pretty(&gateway.scan_surface(scan_id).await?));
    Ok(())
}

pub async fn delete(gateway: &Gateway, scan_id: &str) -> Result<()> {
    gateway.delete_scan(scan_id).await?;
    println!("Deleted {scan_id}");
    Ok(())
}

pub async fn health(gateway: &Gateway) -> Result<()> {
    let report = gateway.health().await?;
    println!(
        "health: {}",
        report.status.as_deref().unwrap_or("unknown")
    );
    match gateway.ready().await {
        Ok(_) => println!("ready: yes"),
        Err(err) => println!("ready: no ({err})"),
    }
    Ok(())
}

/// Print connectivity changes (and dashboard refresh ticks) until the
/// process is stopped.
pub async fn monitor(gateway: Gateway, settings: &Settings) -> Result<()> {
    let connected = gateway.test_connection().await;
    println!(
        "API {} at {}",
        if connected { "reachable" } else { "unreachable" },
        gateway.base_url()
    );

    let (_monitor, mut events) = HealthMonitor::spawn(
        gateway.clone(),
        &settings.monitor_config(),
        info_span!("monitor"),
    );
    while let Some(event) = events.recv().await {
        match event {
            HealthEvent::Restored => println!("API connection restored"),
            HealthEvent::Lost => println!("API connection lost"),
            HealthEvent::RefreshDue => match gateway.analytics_summary().await {
                Ok(summary) => println!("{}", render::pretty(&summary)),
                Err(err) => eprintln!("Dashboard refresh failed: {err}"),
            },
        }
    }
    Ok(())
}

pub async fn queue(gateway: &Gateway) -> Result<()> {
    println!("{}", render::queue(&gateway.queue_stats().await?));
    Ok(())
}

pub async fn analytics(gateway: &Gateway) -> Result<()> {
    println!("{}", render::pretty(&gateway.analytics_summary().await?));
    Ok(())
}

pub async fn export(
    gateway: &Gateway,
    settings: &Settings,
    scan_id: &str,
    format: Option<ExportFormat>,
    output: Option<PathBuf>,
) -> Result<()> {
    let format = match format {
        Some(format) => format,
        None => settings
            .export_format
            .parse()
            .unwrap_or(ExportFormat::Json),
    };

    let content = if format.is_local() {
        let results: ScanResults = serde_json::from_value(gateway.scan_results(scan_id).await?)
            .context("results have an unexpected shape")?;
        match render_local(format, &results) {
            Some(rendered) => rendered?,
            None => bail!("no local renderer for {format}"),
        }
    } else {
        match gateway.export_scan_report(scan_id, format.as_str()).await? {
            ApiPayload::Json(value) => render::pretty(&value),
            ApiPayload::Text(text) => text,
        }
    };

    let path = output.unwrap_or_else(|| PathBuf::from(format.suggested_file_name()));
    std::fs::write(&path, content)
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Export completed: {}", path.display());
    Ok(())
}

pub async fn ai(
    gateway: &Gateway,
    settings: &Settings,
    scan_id: Option<&str>,
    prompt: Option<&str>,
) -> Result<()> {
    let defaults = settings.ai_defaults();
    let request = match (scan_id, prompt) {
        (Some(scan_id), _) => {
            let results = gateway.scan_results(scan_id).await?;
            analysis::assessment_request(&results, &defaults)
        }
        (None, Some(prompt)) => ai_request(prompt, &defaults),
        (None, None) => bail!("either a scan id or --prompt is required"),
    };
    let payload = gateway.generate_ai_analysis(&request).await?;
    println!("{}", analysis::response_text(&payload));
    Ok(())
}

pub async fn injection(
    gateway: Gateway,
    settings: &Settings,
    url: &str,
    tests: Vec<String>,
) -> Result<()> {
    let lab = InjectionLab::new(gateway, settings.ai_defaults());
    let (tx, mut rx) = mpsc::unbounded_channel();

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                LabEvent::TaskStarted(task) => println!("Task started: {task}"),
                LabEvent::Log(line) => println!("{line}"),
                LabEvent::Progress { status, percent } => {
                    println!("{status} {percent}%")
                }
            }
        }
    });

    let outcome = lab.run(url, tests, &tx).await;
    drop(tx);
    let _ = printer.await;

    match outcome? {
        InjectionOutcome::Finished { status, results } => {
            println!("=== RESULTS ({status}) ===");
            match results {
                Some(Value::String(text)) => println!("{text}"),
                Some(value) => println!("{}", render::pretty(&value)),
                None => println!("(no results reported)"),
            }
        }
        InjectionOutcome::AiAssessment(payload) => {
            println!("Backend probes unavailable; AI assessment:");
            println!("{}", analysis::response_text(&payload));
        }
    }
    Ok(())
}

pub async fn hardening(gateway: &Gateway, settings: &Settings, scan_id: &str) -> Result<()> {
    let results = gateway.scan_results(scan_id).await?;
    let report = generate_hardening(
        gateway,
        Some(&results),
        Some(scan_id),
        &settings.ai_defaults(),
    )
    .await?;
    match report {
        HardeningReport::Backend(payload) => print_payload(payload),
        HardeningReport::Ai(payload) => {
            println!("{}", analysis::response_text(&payload))
        }
    }
    Ok(())
}

pub async fn settings(
    action: SettingsAction,
    store: &SettingsStore,
    settings: &mut Settings,
    gateway: &Gateway,
) -> Result<()> {
    match action {
        SettingsAction::Show => {
            println!("{}", render::pretty(&Value::Object(settings.to_map())));
        }
        SettingsAction::Get { key } => match settings.get(&key) {
            Some(value) => println!("{}", render::pretty(&value)),
            None => bail!("unknown setting '{key}'"),
        },
        SettingsAction::Set { key, value } => {
            settings.set_from_str(&key, &value)?;
            store.save(settings)?;
            println!("{key} = {}", settings.get(&key).unwrap_or(Value::Null));
        }
        SettingsAction::Reset => {
            *settings = store.reset_to_defaults()?;
            println!("Settings reset to defaults");
        }
        SettingsAction::Path => println!("{}", store.path().display()),
        SettingsAction::Remote => {
            println!("{}", render::pretty(&gateway.get_settings().await?));
        }
        SettingsAction::Push => {
            let mut llm = Map::new();
            for key in ["llm_provider", "llm_model", "llm_temperature", "llm_max_tokens"] {
                if let Some(value) = settings.get(key) {
                    llm.insert(key.to_string(), value);
                }
            }
            print_payload(gateway.update_settings(&json!(llm)).await?);
        }
        SettingsAction::TestConnection { url } => {
            gateway.set_base_url(&url);
            if gateway.test_connection().await {
                settings.api_url = gateway.base_url();
                store.save(settings)?;
                println!("Connection OK; api_url saved as {}", settings.api_url);
            } else {
                bail!("could not reach {}", gateway.base_url());
            }
        }
    }
    Ok(())
}
