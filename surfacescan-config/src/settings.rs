use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::error::{ConfigError, Result};
use crate::models::{
    ai::AiDefaults, controller::ControllerConfig, gateway::GatewayConfig,
    monitor::MonitorConfig,
};

/// Environment override for the backend URL; wins over the settings file.
pub const API_URL_ENV: &str = "SURFACESCAN_API_URL";

const APP_DIR: &str = "shieldeye";
const SETTINGS_FILE: &str = "settings.json";

/// User settings persisted as a flat JSON object.
///
/// Keys the client does not know (written by newer or older builds) are kept
/// in `extra` and written back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    pub theme: String,
    pub window_width: u32,
    pub window_height: u32,
    pub auto_refresh: bool,
    /// Seconds between dashboard refreshes
    pub refresh_interval: u64,
    pub notifications_enabled: bool,
    pub export_format: String,
    pub recent_scans_limit: u32,
    pub log_level: String,
    pub llm_provider: String,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            theme: "dark".to_string(),
            window_width: 1400,
            window_height: 900,
            auto_refresh: true,
            refresh_interval: 30,
            notifications_enabled: true,
            export_format: "json".to_string(),
            recent_scans_limit: 10,
            log_level: "INFO".to_string(),
            llm_provider: "ollama".to_string(),
            llm_model: "llama3.2:3b".to_string(),
            llm_temperature: 0.2,
            llm_max_tokens: 512,
            extra: Map::new(),
        }
    }
}

impl Settings {
    /// Overlay persisted keys on top of the compiled-in defaults.
    ///
    /// A key whose value has the wrong type is skipped (and logged) instead of
    /// discarding the whole file.
    pub fn merge_over_defaults(loaded: Map<String, Value>) -> Self {
        let mut merged = Self::default().to_map();
        for (key, value) in &loaded {
            merged.insert(key.clone(), value.clone());
        }
        if let Ok(settings) = serde_json::from_value(Value::Object(merged)) {
            return settings;
        }

        let mut settings = Self::default();
        for (key, value) in loaded {
            if let Err(err) = settings.set_value(&key, value) {
                warn!(key = %key, error = %err, "ignoring persisted setting");
            }
        }
        settings
    }

    /// Apply `SURFACESCAN_API_URL` when present and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV)
            && !url.trim().is_empty()
        {
            info!(api_url = %url, "api url overridden from environment");
            self.api_url = url;
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.to_map().remove(key)
    }

    /// Set a single known key from a CLI-style string. The raw text is parsed
    /// as JSON first so numbers and booleans round-trip; otherwise it is taken
    /// as a plain string.
    pub fn set_from_str(&mut self, key: &str, raw: &str) -> Result<()> {
        if !Self::is_known_key(key) {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        let value = serde_json::from_str::<Value>(raw)
            .unwrap_or_else(|_| Value::String(raw.to_string()));
        let value = match (&value, self.get(key)) {
            // "8080" style input for a string setting stays a string
            (Value::Number(_) | Value::Bool(_), Some(Value::String(_))) => {
                Value::String(raw.to_string())
            }
            _ => value,
        };
        self.set_value(key, value)
    }

    /// Set any key, known or not. Known keys are type-checked.
    pub fn set_value(&mut self, key: &str, value: Value) -> Result<()> {
        let mut map = self.to_map();
        map.insert(key.to_string(), value);
        *self = serde_json::from_value(Value::Object(map)).map_err(|err| {
            ConfigError::InvalidValue {
                key: key.to_string(),
                reason: err.to_string(),
            }
        })?;
        Ok(())
    }

    pub fn update_multiple(&mut self, updates: Map<String, Value>) -> Result<()> {
        let mut map = self.to_map();
        map.extend(updates);
        *self = serde_json::from_value(Value::Object(map)).map_err(|err| {
            ConfigError::InvalidValue {
                key: "<batch>".to_string(),
                reason: err.to_string(),
            }
        })?;
        Ok(())
    }

    pub fn is_known_key(key: &str) -> bool {
        Self::default().to_map().contains_key(key)
    }

    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.api_url.clone(),
            ..GatewayConfig::default()
        }
    }

    pub fn ai_defaults(&self) -> AiDefaults {
        let non_blank = |raw: &str| {
            let raw = raw.trim();
            (!raw.is_empty()).then(|| raw.to_string())
        };
        AiDefaults {
            provider: non_blank(&self.llm_provider),
            model: non_blank(&self.llm_model),
            temperature: Some(self.llm_temperature),
            max_tokens: Some(self.llm_max_tokens),
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig::default()
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            dashboard_refresh: self
                .auto_refresh
                .then(|| Duration::from_secs(self.refresh_interval.max(1))),
            ..MonitorConfig::default()
        }
    }
}

/// Reads and writes [`Settings`] at a fixed path.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// `<data_dir>/shieldeye/settings.json`
    pub fn default_location() -> Result<Self> {
        let dir = dirs::data_dir().ok_or(ConfigError::NoDataDir)?;
        Ok(Self::at(dir.join(APP_DIR).join(SETTINGS_FILE)))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; a missing file yields the defaults.
    pub fn load(&self) -> Result<Settings> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no settings file found, using defaults");
            return Ok(Settings::default());
        }

        let content =
            fs::read_to_string(&self.path).map_err(|source| ConfigError::Read {
                path: self.path.clone(),
                source,
            })?;
        let loaded: Map<String, Value> = serde_json::from_str(&content)
            .map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;

        info!(path = %self.path.display(), "settings loaded");
        Ok(Settings::merge_over_defaults(loaded))
    }

    /// Like [`load`](Self::load) but falls back to defaults on any error.
    pub fn load_or_default(&self) -> Settings {
        self.load().unwrap_or_else(|err| {
            warn!(error = %err, "failed to load settings, using defaults");
            Settings::default()
        })
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = serde_json::to_string_pretty(settings).map_err(|err| {
            ConfigError::InvalidValue {
                key: "<all>".to_string(),
                reason: err.to_string(),
            }
        })?;
        fs::write(&self.path, content).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })?;
        info!(path = %self.path.display(), "settings saved");
        Ok(())
    }

    pub fn reset_to_defaults(&self) -> Result<Settings> {
        let settings = Settings::default();
        self.save(&settings)?;
        info!("settings reset to defaults");
        Ok(settings)
    }
}
