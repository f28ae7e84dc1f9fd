//! Configuration for the SurfaceScan client.
//!
//! Persisted user settings live in a flat JSON file; runtime tuning for the
//! gateway and controller is derived from them and passed explicitly to the
//! components that need it. Nothing in here is a process-wide singleton.

pub mod error;
pub mod logging;
pub mod models;
pub mod settings;

pub use error::ConfigError;
pub use models::ai::AiDefaults;
pub use models::controller::ControllerConfig;
pub use models::gateway::{
    CacheTtls, GatewayConfig, RetryPolicy, normalize_base_url,
};
pub use models::monitor::MonitorConfig;
pub use settings::{Settings, SettingsStore};
