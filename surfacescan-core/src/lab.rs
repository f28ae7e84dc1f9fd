//! Injection lab: prompt-injection probes run by the backend, with an AI
//! assessment when the backend cannot run them.

use std::time::Duration;

use serde_json::{Value, json};
use surfacescan_config::AiDefaults;
use surfacescan_model::{AiGenerateRequest, InjectionRunRequest};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::LabError;
use crate::gateway::{ApiPayload, Gateway};

/// Build an AI request carrying the user's LLM preferences.
pub fn ai_request(prompt: impl Into<String>, defaults: &AiDefaults) -> AiGenerateRequest {
    AiGenerateRequest::new(prompt)
        .with_provider(defaults.provider.clone())
        .with_model(defaults.model.clone())
        .with_temperature(defaults.temperature)
        .with_max_tokens(defaults.max_tokens)
}

/// Accepts only absolute http(s) URLs, after trimming.
pub fn validate_target_url(raw: &str) -> Result<&str, LabError> {
    let url = raw.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(url)
    } else {
        Err(LabError::InvalidUrl)
    }
}

/// The run endpoint has used `taskId`, `task_id` and `id` over time.
fn task_id(response: &Value) -> Option<String> {
    ["taskId", "task_id", "id"]
        .iter()
        .filter_map(|key| response.get(*key))
        .find_map(|value| match value {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        })
}

#[derive(Debug, Clone, PartialEq)]
pub enum LabEvent {
    TaskStarted(String),
    Log(String),
    Progress { status: String, percent: u8 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum InjectionOutcome {
    /// The backend finished (or answered synchronously).
    Finished {
        status: String,
        results: Option<Value>,
    },
    /// The backend could not run the probes; an LLM assessment instead.
    AiAssessment(ApiPayload),
}

#[derive(Debug, Clone)]
pub struct InjectionLab {
    gateway: Gateway,
    ai: AiDefaults,
    poll_interval: Duration,
    error_backoff: Duration,
}

impl InjectionLab {
    pub fn new(gateway: Gateway, ai: AiDefaults) -> Self {
        Self {
            gateway,
            ai,
            poll_interval: Duration::from_secs(2),
            error_backoff: Duration::from_secs(3),
        }
    }

    pub fn with_intervals(mut self, poll_interval: Duration, error_backoff: Duration) -> Self {
        self.poll_interval = poll_interval;
        self.error_backoff = error_backoff;
        self
    }

    /// Start probes against `url` and follow them to the end. Status
    /// failures are logged and retried; drop the future to stop waiting.
    pub async fn run(
        &self,
        url: &str,
        tests: Vec<String>,
        events: &mpsc::UnboundedSender<LabEvent>,
    ) -> Result<InjectionOutcome, LabError> {
        let url = validate_target_url(url)?;
        let emit = |event: LabEvent| {
            let _ = events.send(event);
        };

        let started = match self
            .gateway
            .run_injection_tests(&InjectionRunRequest::new(url, tests))
            .await
        {
            Ok(payload) => payload.into_value(),
            Err(err) => {
                warn!(%url, error = %err, "injection run failed, asking for an AI assessment");
                return self.assess_with_ai(url).await;
            }
        };

        let Some(task) = task_id(&started) else {
            let results = started.get("results").cloned().unwrap_or(started);
            return Ok(InjectionOutcome::Finished {
                status: "completed".to_string(),
                results: Some(results),
            });
        };

        info!(%url, task = %task, "injection task started");
        emit(LabEvent::TaskStarted(task.clone()));
        emit(LabEvent::Progress {
            status: "running".to_string(),
            percent: 10,
        });

        loop {
            match self.gateway.injection_status(&task).await {
                Ok(status) => {
                    for line in &status.logs {
                        emit(LabEvent::Log(match line {
                            Value::String(text) => text.clone(),
                            other => other.to_string(),
                        }));
                    }
                    let label = status.status.clone().unwrap_or_else(|| "running".to_string());
                    emit(LabEvent::Progress {
                        status: label.clone(),
                        percent: status.percent(),
                    });
                    if status.is_finished() {
                        debug!(task = %task, status = %label, "injection task finished");
                        return Ok(InjectionOutcome::Finished {
                            status: label,
                            results: status.results,
                        });
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(err) => {
                    emit(LabEvent::Log(err.to_string()));
                    tokio::time::sleep(self.error_backoff).await;
                }
            }
        }
    }

    async fn assess_with_ai(&self, url: &str) -> Result<InjectionOutcome, LabError> {
        let prompt = format!(
            "Assess prompt injection risks for the web page at {url}. Provide \
             examples of likely attack prompts, expected model behaviors to \
             avoid, and concrete mitigations in bullets."
        );
        let request = ai_request(prompt, &self.ai).with_context(json!({ "url": url }));
        let payload = self.gateway.generate_ai_analysis(&request).await?;
        Ok(InjectionOutcome::AiAssessment(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_http_urls_are_accepted() {
        assert_eq!(validate_target_url("  https://a.test "), Ok("https://a.test"));
        assert_eq!(validate_target_url("ftp://a.test"), Err(LabError::InvalidUrl));
        assert_eq!(validate_target_url("a.test"), Err(LabError::InvalidUrl));
    }

    #[test]
    fn task_id_accepts_every_spelling() {
        assert_eq!(task_id(&json!({ "taskId": "t1" })).as_deref(), Some("t1"));
        assert_eq!(task_id(&json!({ "task_id": "t2" })).as_deref(), Some("t2"));
        assert_eq!(task_id(&json!({ "id": 7 })).as_deref(), Some("7"));
        assert_eq!(task_id(&json!({ "taskId": "", "id": "t3" })).as_deref(), Some("t3"));
        assert_eq!(task_id(&json!({ "results": [] })), None);
    }

    #[test]
    fn ai_request_carries_preferences() {
        let defaults = AiDefaults {
            provider: Some("ollama".into()),
            model: None,
            temperature: Some(0.5),
            max_tokens: None,
        };
        let request = ai_request("hi", &defaults);
        assert_eq!(request.provider.as_deref(), Some("ollama"));
        assert_eq!(request.model, None);
        assert_eq!(request.temperature, 0.5);
        assert_eq!(request.max_tokens, 512);
    }
}
