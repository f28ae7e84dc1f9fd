use url::form_urlencoded;

macro_rules! api_path {
    ($path:literal) => {
        concat!("/api", $path)
    };
}

/// Liveness probes served outside the `/api` prefix
pub const HEALTH: &str = "/health";
pub const READY: &str = "/ready";

pub mod scans {
    pub const COLLECTION: &str = api_path!("/scans");
    pub const ITEM: &str = api_path!("/scans/{id}");
    pub const STATUS: &str = api_path!("/scans/{id}/status");
    pub const RESULTS: &str = api_path!("/scans/{id}/results");
    pub const SURFACE: &str = api_path!("/scans/{id}/surface");
    pub const EXPORT: &str = api_path!("/scans/{id}/export");
}

pub mod queue {
    pub const STATS: &str = api_path!("/queue/stats");
}

pub mod analytics {
    pub const SUMMARY: &str = api_path!("/analytics/summary");
}

pub mod ai {
    /// Tried first; older backends only expose the fallbacks.
    pub const LLM_GENERATE: &str = api_path!("/ai/llm/generate");
    pub const GENERATE: &str = api_path!("/ai/generate");
    pub const ANALYZE: &str = api_path!("/ai/analyze");

    pub const FALLBACK_CHAIN: [&str; 3] = [LLM_GENERATE, GENERATE, ANALYZE];
}

pub mod settings {
    pub const ROOT: &str = api_path!("/settings");
}

pub mod injection {
    pub const RUN: &str = api_path!("/injection/run");
    pub const STATUS: &str = api_path!("/injection/{id}/status");
}

pub mod hardening {
    pub const GENERATE: &str = api_path!("/hardening/generate");
}

/// Substitute the `{id}` placeholder of a route template. The id is
/// percent-encoded so it always stays a single path segment.
pub fn with_id(template: &str, id: &str) -> String {
    template.replace("{id}", &encode_segment(id))
}

fn encode_segment(raw: &str) -> String {
    // form encoding writes spaces as '+'; a literal '+' is already %2B
    form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
