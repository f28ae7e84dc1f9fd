use std::time::Duration;

/// Timing of the scan status polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Delay between status checks while a scan is in flight.
    pub poll_interval: Duration,
    /// Delay after a failed status check before trying again.
    pub error_backoff: Duration,
    /// Give up after this many consecutive failed status checks. `None`
    /// keeps polling until the scan finishes or the user moves on.
    pub max_consecutive_poll_failures: Option<u32>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            error_backoff: Duration::from_secs(5),
            max_consecutive_poll_failures: None,
        }
    }
}
