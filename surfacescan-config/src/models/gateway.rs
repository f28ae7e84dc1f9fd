use std::time::Duration;

/// Connection settings for the remote service gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Backend root, e.g. `http://localhost:3000`. Normalised by the gateway.
    pub base_url: String,
    /// Per-call timeout applied to every request attempt.
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub cache_ttls: CacheTtls,
    /// A connection check older than this is considered stale and should be
    /// re-probed by the host.
    pub connection_stale_after: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            cache_ttls: CacheTtls::default(),
            connection_stale_after: Duration::from_secs(5 * 60),
        }
    }
}

/// Automatic retry of idempotent requests that hit a transient server
/// status.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; 3 means at most 4 attempts.
    pub max_retries: u32,
    pub backoff_factor: Duration,
    pub backoff_max: Duration,
    pub retry_statuses: Vec<u16>,
    /// Honour a numeric `Retry-After` header on 429/503.
    pub respect_retry_after: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_factor: Duration::from_secs(1),
            backoff_max: Duration::from_secs(120),
            retry_statuses: vec![429, 500, 502, 503, 504],
            respect_retry_after: true,
        }
    }
}

impl RetryPolicy {
    /// No automatic retries at all.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_statuses.contains(&status)
    }

    /// Delay before retry number `retry` (1-based). The first retry is
    /// immediate, then `factor * 2^(retry - 1)`, capped at `backoff_max`.
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry <= 1 {
            return Duration::ZERO;
        }
        let exponent = (retry - 1).min(16);
        self.backoff_factor
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_max)
    }
}

/// Time-to-live of each cached read endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTtls {
    pub health: Duration,
    pub queue_stats: Duration,
    /// Results never change once a scan has completed.
    pub scan_results: Duration,
    pub scan_surface: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            health: Duration::from_secs(30),
            queue_stats: Duration::from_secs(10),
            scan_results: Duration::from_secs(3600),
            scan_surface: Duration::from_secs(3600),
        }
    }
}

/// Normalize a user-provided base URL so request paths can be appended
/// directly: surrounding whitespace and trailing slashes are dropped and
/// `http://` is assumed when no scheme is given.
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let with_scheme =
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

    if url::Url::parse(&with_scheme).is_err() {
        tracing::warn!(base_url = %with_scheme, "base url does not parse");
    }
    with_scheme
}
