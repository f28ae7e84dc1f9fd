mod cli;
mod commands;
mod render;
mod scan;

use anyhow::{Context, Result};
use clap::Parser;
use surfacescan_config::{SettingsStore, logging};
use surfacescan_core::Gateway;
use tracing::{debug, info_span};

use cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let store = match &cli.settings {
        Some(path) => SettingsStore::at(path),
        None => SettingsStore::default_location()?,
    };
    let mut settings = store.load_or_default();
    settings.apply_env_overrides();
    if let Some(url) = &cli.api_url {
        settings.api_url = url.clone();
    }

    logging::init(&settings.log_level);
    debug!(settings = %store.path().display(), api_url = %settings.api_url, "starting");

    let gateway = Gateway::new(settings.gateway_config(), info_span!("gateway"))
        .context("failed to set up the HTTP client")?;

    let result = match cli.command {
        Command::Scan(args) => scan::run(gateway.clone(), &settings, args).await,
        Command::List { limit, offset } => commands::list(&gateway, limit, offset).await,
        Command::Status { scan_id } => commands::status(&gateway, &scan_id).await,
        Command::Results { scan_id, json } => {
            commands::results(&gateway, &scan_id, json).await
        }
        Command::Surface { scan_id } => commands::surface(&gateway, &scan_id).await,
        Command::Delete { scan_id } => commands::delete(&gateway, &scan_id).await,
        Command::Health => commands::health(&gateway).await,
        Command::Monitor => commands::monitor(gateway.clone(), &settings).await,
        Command::Queue => commands::queue(&gateway).await,
        Command::Analytics => commands::analytics(&gateway).await,
        Command::Export {
            scan_id,
            format,
            output,
        } => commands::export(&gateway, &settings, &scan_id, format, output).await,
        Command::Ai { scan_id, prompt } => {
            commands::ai(&gateway, &settings, scan_id.as_deref(), prompt.as_deref()).await
        }
        Command::Injection { url, tests } => {
            commands::injection(gateway.clone(), &settings, &url, tests).await
        }
        Command::Hardening { scan_id } => {
            commands::hardening(&gateway, &settings, &scan_id).await
        }
        Command::Settings { action } => {
            commands::settings(action, &store, &mut settings, &gateway).await
        }
    };

    gateway.cleanup();
    result
}
