use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_ANALYST_PROMPT: &str = "You are a senior application \
security expert specializing in web application risk analysis. Given scan \
results and findings, you must produce a clear, structured report with the \
following sections: 1) Executive Summary (non-technical, 3-5 bullet points), \
2) Key Risks (ranked from most to least critical, mapped to a severity \
level), 3) Technical Details (how the issues can be exploited, where \
applicable), 4) Prioritized Remediation Plan (concrete, actionable steps \
ordered by impact and effort). Use concise language and avoid speculation \
not supported by the provided context.";

pub const DEFAULT_MAX_TOKENS: u32 = 512;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Body shared by every endpoint of the AI fallback chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiGenerateRequest {
    pub prompt: String,
    pub system: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AiGenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: DEFAULT_ANALYST_PROMPT.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            context: None,
            provider: None,
            model: None,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Empty strings are treated as "let the backend decide".
    pub fn with_provider(mut self, provider: Option<String>) -> Self {
        self.provider = provider.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model.filter(|m| !m.trim().is_empty());
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        if let Some(t) = temperature {
            self.temperature = t;
        }
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        if let Some(n) = max_tokens {
            self.max_tokens = n;
        }
        self
    }
}
