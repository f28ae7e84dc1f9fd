//! Remote service gateway: the only component that talks HTTP to the
//! scanning backend.

pub mod cache;
pub mod connectivity;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use reqwest::{Client, Method, Response, StatusCode, header};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use surfacescan_config::{GatewayConfig, normalize_base_url};
use surfacescan_model::{
    AiGenerateRequest, CreatedScan, HealthReport, InjectionRunRequest,
    InjectionStatus, QueueStats, ScanListPage, ScanRequest, ScanStatusReport,
    routes,
};
use tracing::{Instrument, Span, debug, info, warn};

use crate::error::GatewayError;
pub use cache::{CachedResponse, ResponseCache, cache_key};
pub use connectivity::{
    ConnectionState, ConnectionSubscription, ConnectivityTracker, ObserverId,
};

/// Body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiPayload {
    Json(Value),
    /// 2xx body that was not JSON; kept verbatim.
    Text(String),
}

impl ApiPayload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ApiPayload::Json(value) => Some(value),
            ApiPayload::Text(_) => None,
        }
    }

    /// JSON as-is, text wrapped in a JSON string.
    pub fn into_value(self) -> Value {
        match self {
            ApiPayload::Json(value) => value,
            ApiPayload::Text(text) => Value::String(text),
        }
    }

    pub fn decode<T: DeserializeOwned>(
        self,
        path: &str,
    ) -> Result<T, GatewayError> {
        let value = match self {
            ApiPayload::Json(value) => value,
            ApiPayload::Text(text) => {
                return Err(GatewayError::Decode {
                    path: path.to_string(),
                    reason: format!("expected JSON, got text: {:.80}", text),
                });
            }
        };
        serde_json::from_value(value).map_err(|err| GatewayError::Decode {
            path: path.to_string(),
            reason: err.to_string(),
        })
    }
}

/// Snapshot returned by [`Gateway::is_connected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionCheck {
    pub connected: bool,
    /// The host should re-probe in the background.
    pub stale: bool,
}

struct GatewayInner {
    client: RwLock<Option<Client>>,
    base_url: RwLock<String>,
    config: GatewayConfig,
    cache: ResponseCache,
    connectivity: Arc<ConnectivityTracker>,
    span: Span,
}

/// HTTP client for the scanning backend with retry, response caching and
/// connectivity tracking. Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("base_url", &*self.inner.base_url.read())
            .field("connected", &self.inner.connectivity.state().connected)
            .field("cached_entries", &self.inner.cache.len())
            .field("closed", &self.inner.client.read().is_none())
            .finish()
    }
}

impl Gateway {
    /// Build a gateway whose log events are emitted inside `span`.
    pub fn new(config: GatewayConfig, span: Span) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("surfacescan/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| GatewayError::transport(&err))?;

        let base_url = normalize_base_url(&config.base_url);
        span.in_scope(|| {
            info!(base_url = %base_url, "creating gateway");
        });

        Ok(Self {
            inner: Arc::new(GatewayInner {
                client: RwLock::new(Some(client)),
                base_url: RwLock::new(base_url),
                config,
                cache: ResponseCache::new(),
                connectivity: ConnectivityTracker::new(),
                span,
            }),
        })
    }

    pub fn base_url(&self) -> String {
        self.inner.base_url.read().clone()
    }

    /// Point the gateway at another host. Connection state goes back to
    /// unknown and cached responses from the old host are dropped.
    pub fn set_base_url(&self, url: &str) {
        let normalized = normalize_base_url(url);
        *self.inner.base_url.write() = normalized.clone();
        self.inner.connectivity.reset();
        self.inner.cache.clear();
        self.inner.span.in_scope(|| {
            info!(base_url = %normalized, "base url changed");
        });
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connectivity.state()
    }

    pub fn subscribe_connection(&self) -> ConnectionSubscription {
        self.inner.connectivity.subscribe()
    }

    /// Recorded connectivity plus whether it is old enough that the caller
    /// should trigger [`test_connection`](Self::test_connection).
    pub fn is_connected(&self) -> ConnectionCheck {
        let state = self.inner.connectivity.state();
        ConnectionCheck {
            connected: state.is_connected(),
            stale: state
                .is_stale(self.inner.config.connection_stale_after, Utc::now()),
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    /// Release the HTTP session and drop all cached responses. Later calls
    /// fail with [`GatewayError::Closed`]. Calling it again is a no-op.
    pub fn cleanup(&self) {
        let released = self.inner.client.write().take().is_some();
        self.inner.cache.clear();
        if released {
            self.inner.span.in_scope(|| info!("gateway closed"));
        }
    }

    /// Perform one logical request: a single HTTP call, plus automatic
    /// retries for idempotent methods on transient statuses.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(String, String)],
    ) -> Result<ApiPayload, GatewayError> {
        let span = self.inner.span.clone();
        self.request_inner(method, path, body, query, true)
            .instrument(span)
            .await
    }

    /// With `track` unset the caller records connectivity itself.
    async fn request_inner(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        query: &[(String, String)],
        track: bool,
    ) -> Result<ApiPayload, GatewayError> {
        let client = self
            .inner
            .client
            .read()
            .clone()
            .ok_or(GatewayError::Closed)?;
        let url = format!("{}{}", self.inner.base_url.read(), path);
        let policy = &self.inner.config.retry;
        let idempotent = method == Method::GET
            || method == Method::HEAD
            || method == Method::OPTIONS;

        let mut retry = 0u32;
        loop {
            let mut builder = client.request(method.clone(), &url);
            if !query.is_empty() {
                builder = builder.query(query);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            debug!(%method, %url, attempt = retry + 1, "sending request");
            let response = match builder.send().await {
                Ok(response) => response,
                Err(err) => {
                    if track {
                        self.inner.connectivity.record(false);
                    }
                    let err = GatewayError::transport(&err);
                    warn!(%method, %url, error = %err, "request failed");
                    return Err(err);
                }
            };
            if track {
                self.inner.connectivity.record(true);
            }

            let status = response.status();
            if idempotent
                && retry < policy.max_retries
                && policy.should_retry_status(status.as_u16())
            {
                retry += 1;
                let delay = retry_after(&response, policy)
                    .unwrap_or_else(|| policy.backoff(retry));
                debug!(
                    %method,
                    %url,
                    status = status.as_u16(),
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after transient status"
                );
                drop(response);
                tokio::time::sleep(delay).await;
                continue;
            }

            return read_response(response).await;
        }
    }

    async fn get(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<ApiPayload, GatewayError> {
        self.request(Method::GET, path, None, query).await
    }

    async fn send_json<T: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &T,
    ) -> Result<ApiPayload, GatewayError> {
        let body = serde_json::to_value(body)
            .map_err(|err| GatewayError::Encode(err.to_string()))?;
        self.request(method, path, Some(&body), &[]).await
    }

    /// GET through the response cache.
    async fn cached_get(
        &self,
        path: &str,
        query: &[(String, String)],
        ttl: Duration,
    ) -> Result<ApiPayload, GatewayError> {
        let key = cache_key(path, query);
        if let Some(hit) = self.inner.cache.get(&key) {
            self.inner.span.in_scope(|| debug!(key = %key, "cache hit"));
            return Ok(hit);
        }

        let payload = self.get(path, query).await?;
        self.inner.cache.insert(key, payload.clone(), ttl);
        Ok(payload)
    }
}

/// Numeric `Retry-After` on 429/503, capped by the policy.
fn retry_after(
    response: &Response,
    policy: &surfacescan_config::RetryPolicy,
) -> Option<Duration> {
    if !policy.respect_retry_after {
        return None;
    }
    if !matches!(
        response.status(),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    ) {
        return None;
    }
    response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .map(|delay| delay.min(policy.backoff_max))
}

async fn read_response(response: Response) -> Result<ApiPayload, GatewayError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| GatewayError::transport(&err))?;

    if status.is_success() {
        return Ok(match serde_json::from_str::<Value>(&text) {
            Ok(value) => ApiPayload::Json(value),
            Err(_) => ApiPayload::Text(text),
        });
    }

    Err(GatewayError::Http {
        status: status.as_u16(),
        message: error_message(status, &text),
    })
}

/// The body's `"error"` field when present, otherwise `HTTP <code>: <reason>`.
fn error_message(status: StatusCode, body: &str) -> String {
    let from_body = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| match value.get("error") {
            Some(Value::String(message)) => Some(message.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        });

    from_body.unwrap_or_else(|| {
        format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown")
        )
    })
}

impl Gateway {
    pub async fn health(&self) -> Result<HealthReport, GatewayError> {
        self.cached_get(routes::HEALTH, &[], self.inner.config.cache_ttls.health)
            .await?
            .decode(routes::HEALTH)
    }

    pub async fn ready(&self) -> Result<ApiPayload, GatewayError> {
        self.get(routes::READY, &[]).await
    }

    /// Probe `/health` without the cache and record the outcome once. A
    /// non-2xx answer counts as disconnected.
    pub async fn test_connection(&self) -> bool {
        let span = self.inner.span.clone();
        let connected = self
            .request_inner(Method::GET, routes::HEALTH, None, &[], false)
            .instrument(span)
            .await
            .is_ok();
        self.inner.connectivity.record(connected);
        connected
    }

    pub async fn create_scan(
        &self,
        request: &ScanRequest,
    ) -> Result<CreatedScan, GatewayError> {
        let payload = self
            .send_json(Method::POST, routes::scans::COLLECTION, request)
            .await?;
        // A body without a usable id is reported by the caller as invalid
        // data, so anything that is not an object yields an empty record.
        Ok(payload
            .as_json()
            .and_then(|value| {
                serde_json::from_value::<CreatedScan>(value.clone()).ok()
            })
            .unwrap_or_default())
    }

    pub async fn scan_status(
        &self,
        scan_id: &str,
    ) -> Result<ScanStatusReport, GatewayError> {
        let path = routes::with_id(routes::scans::STATUS, scan_id);
        self.get(&path, &[]).await?.decode(&path)
    }

    pub async fn scan_results(&self, scan_id: &str) -> Result<Value, GatewayError> {
        let path = routes::with_id(routes::scans::RESULTS, scan_id);
        let ttl = self.inner.config.cache_ttls.scan_results;
        Ok(self.cached_get(&path, &[], ttl).await?.into_value())
    }

    pub async fn scan_surface(&self, scan_id: &str) -> Result<Value, GatewayError> {
        let path = routes::with_id(routes::scans::SURFACE, scan_id);
        let ttl = self.inner.config.cache_ttls.scan_surface;
        Ok(self.cached_get(&path, &[], ttl).await?.into_value())
    }

    pub async fn list_scans(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<ScanListPage, GatewayError> {
        let query = [
            ("limit".to_string(), limit.to_string()),
            ("offset".to_string(), offset.to_string()),
        ];
        self.get(routes::scans::COLLECTION, &query)
            .await?
            .decode(routes::scans::COLLECTION)
    }

    pub async fn delete_scan(
        &self,
        scan_id: &str,
    ) -> Result<ApiPayload, GatewayError> {
        let path = routes::with_id(routes::scans::ITEM, scan_id);
        let result = self.request(Method::DELETE, &path, None, &[]).await;
        if result.is_ok() {
            self.inner
                .cache
                .invalidate(&routes::with_id(routes::scans::RESULTS, scan_id));
            self.inner
                .cache
                .invalidate(&routes::with_id(routes::scans::SURFACE, scan_id));
        }
        result
    }

    pub async fn queue_stats(&self) -> Result<QueueStats, GatewayError> {
        let ttl = self.inner.config.cache_ttls.queue_stats;
        self.cached_get(routes::queue::STATS, &[], ttl)
            .await?
            .decode(routes::queue::STATS)
    }

    /// Always fetched fresh so it reflects the latest scans.
    pub async fn analytics_summary(&self) -> Result<Value, GatewayError> {
        Ok(self.get(routes::analytics::SUMMARY, &[]).await?.into_value())
    }

    /// Ask the backend's LLM integration for an analysis.
    ///
    /// Endpoints are tried in order; only a 404 (endpoint absent on this
    /// backend version) moves on to the next one.
    pub async fn generate_ai_analysis(
        &self,
        request: &AiGenerateRequest,
    ) -> Result<ApiPayload, GatewayError> {
        let chain = routes::ai::FALLBACK_CHAIN;
        let mut outcome = Err(GatewayError::Closed);
        for (index, path) in chain.iter().enumerate() {
            outcome = self.send_json(Method::POST, path, request).await;
            match &outcome {
                Err(err) if err.is_not_found() && index + 1 < chain.len() => {
                    self.inner.span.in_scope(|| {
                        debug!(path, "ai endpoint not found, trying next");
                    });
                }
                _ => break,
            }
        }
        outcome
    }

    pub async fn export_scan_report(
        &self,
        scan_id: &str,
        format: &str,
    ) -> Result<ApiPayload, GatewayError> {
        let path = routes::with_id(routes::scans::EXPORT, scan_id);
        self.get(&path, &[("format".to_string(), format.to_string())])
            .await
    }

    pub async fn get_settings(&self) -> Result<Value, GatewayError> {
        Ok(self.get(routes::settings::ROOT, &[]).await?.into_value())
    }

    pub async fn update_settings(
        &self,
        settings: &Value,
    ) -> Result<ApiPayload, GatewayError> {
        self.send_json(Method::PUT, routes::settings::ROOT, settings)
            .await
    }

    pub async fn run_injection_tests(
        &self,
        request: &InjectionRunRequest,
    ) -> Result<ApiPayload, GatewayError> {
        self.send_json(Method::POST, routes::injection::RUN, request)
            .await
    }

    pub async fn injection_status(
        &self,
        task_id: &str,
    ) -> Result<InjectionStatus, GatewayError> {
        let path = routes::with_id(routes::injection::STATUS, task_id);
        self.get(&path, &[]).await?.decode(&path)
    }

    pub async fn generate_hardening(
        &self,
        scan_data: &Value,
    ) -> Result<ApiPayload, GatewayError> {
        self.send_json(Method::POST, routes::hardening::GENERATE, scan_data)
            .await
    }
}
