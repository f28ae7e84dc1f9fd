/// LLM parameters attached to every AI request the client sends. Unset
/// fields fall back to the request defaults; the backend picks its own
/// provider and model when those are absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AiDefaults {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}
