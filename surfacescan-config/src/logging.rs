use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Translate the settings file's Python-style level names (`INFO`,
/// `WARNING`, ...) into an `EnvFilter` directive.
pub fn directive_for_level(level: &str) -> String {
    let level = match level.trim().to_ascii_lowercase().as_str() {
        "critical" | "fatal" | "error" => "error",
        "warning" | "warn" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    };
    format!("{level},hyper=warn,reqwest=warn")
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
/// Output goes to stderr so command output on stdout stays clean.
///
/// Safe to call more than once; later calls are ignored.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive_for_level(level)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn python_level_names_map_to_tracing() {
        assert!(directive_for_level("WARNING").starts_with("warn,"));
        assert!(directive_for_level("CRITICAL").starts_with("error,"));
        assert!(directive_for_level("bogus").starts_with("info,"));
    }
}
