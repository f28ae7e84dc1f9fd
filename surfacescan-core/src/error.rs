/// Failure of a single gateway operation.
///
/// Transport and HTTP failures are ordinary values here; callers inspect them
/// rather than unwinding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// No response was received (DNS, connection refused, timeout).
    #[error("{message}")]
    Transport { message: String },

    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// A 2xx body did not have the shape a typed accessor expected.
    #[error("unexpected response from {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("failed to encode request body: {0}")]
    Encode(String),

    #[error("gateway has been shut down")]
    Closed,
}

impl GatewayError {
    /// HTTP status of the failure; 0 when no response was received.
    pub fn status(&self) -> u16 {
        match self {
            GatewayError::Http { status, .. } => *status,
            _ => 0,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == 404
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, GatewayError::Transport { .. } | GatewayError::Closed)
    }

    pub(crate) fn transport(err: &reqwest::Error) -> Self {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(err);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        GatewayError::Transport { message }
    }
}

/// Why a scan run ended without results. Every variant is shown to the user
/// the same way, as a "Scan Error" with the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("Failed to create scan: {0}")]
    Create(GatewayError),

    #[error("Invalid data received from API")]
    InvalidData,

    #[error("{0}")]
    Backend(String),

    #[error("Lost contact with scan {scan_id} after {failures} failed status checks: {last}")]
    PollingExhausted {
        scan_id: String,
        failures: u32,
        last: GatewayError,
    },

    #[error("Failed to load results: {0}")]
    Results(GatewayError),
}

/// Failures of the injection lab and hardening helpers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabError {
    #[error("Please enter a valid URL starting with http:// or https://")]
    InvalidUrl,

    #[error("No scan results available. Run a scan first.")]
    NoResults,

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
