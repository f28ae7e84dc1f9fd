use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Period of the background `/health` probe.
    pub health_interval: Duration,
    /// Dashboard auto-refresh period, if enabled in settings.
    pub dashboard_refresh: Option<Duration>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_secs(10),
            dashboard_refresh: None,
        }
    }
}
