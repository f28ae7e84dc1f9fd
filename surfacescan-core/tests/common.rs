use std::{
    collections::{HashMap, VecDeque},
    net::SocketAddr,
    sync::Arc,
    time::Duration,
};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use serde_json::Value;
use surfacescan_config::{GatewayConfig, RetryPolicy};
use surfacescan_core::Gateway;
use tracing::Span;

/// One canned answer of the fake backend.
#[allow(unused)]
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: StatusCode,
    pub body: String,
    pub json: bool,
    pub retry_after: Option<u64>,
}

#[allow(unused)]
impl Reply {
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("valid status"),
            body: body.to_string(),
            json: true,
            retry_after: None,
        }
    }

    pub fn ok(body: Value) -> Self {
        Self::json(200, body)
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status: StatusCode::from_u16(status).expect("valid status"),
            body: body.to_string(),
            json: false,
            retry_after: None,
        }
    }

    pub fn retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        let content_type = if self.json {
            "application/json"
        } else {
            "text/plain; charset=utf-8"
        };
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        if let Some(seconds) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

/// A request the fake backend received.
#[allow(unused)]
#[derive(Debug, Clone)]
pub struct Hit {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<Value>,
}

/// Scripted in-process backend. Replies are queued per `METHOD path`; the
/// last reply of a queue is repeated once the others are used up. Paths
/// without a script answer 404.
#[derive(Debug, Default)]
pub struct FakeBackend {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    hits: Mutex<Vec<Hit>>,
}

#[allow(unused)]
impl FakeBackend {
    pub fn script(&self, method: Method, path: &str, replies: Vec<Reply>) {
        self.scripts
            .lock()
            .insert(format!("{method} {path}"), replies.into());
    }

    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().clone()
    }

    pub fn hits_on(&self, method: Method, path: &str) -> usize {
        self.hits
            .lock()
            .iter()
            .filter(|hit| hit.method == method && hit.path == path)
            .count()
    }

    fn next_reply(&self, method: &Method, path: &str) -> Reply {
        let mut scripts = self.scripts.lock();
        match scripts.get_mut(&format!("{method} {path}")) {
            Some(queue) if queue.len() > 1 => {
                queue.pop_front().expect("queue is non-empty")
            }
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => Reply::text(404, "Not Found"),
        }
    }
}

async fn handle(
    State(backend): State<Arc<FakeBackend>>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Reply {
    let path = uri.path().to_string();
    backend.hits.lock().push(Hit {
        method: method.clone(),
        path: path.clone(),
        query: uri.query().map(str::to_string),
        body: serde_json::from_slice(&body).ok(),
    });
    backend.next_reply(&method, &path)
}

/// Serve `backend` on an ephemeral localhost port.
pub async fn serve(backend: Arc<FakeBackend>) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    let app = Router::new().fallback(handle).with_state(backend);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    addr
}

/// An address nothing listens on.
#[allow(unused)]
pub async fn dead_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    addr
}

/// Gateway pointed at `addr` with millisecond retry backoff.
#[allow(unused)]
pub fn gateway(addr: SocketAddr) -> Gateway {
    let config = GatewayConfig {
        base_url: format!("http://{addr}"),
        request_timeout: Duration::from_secs(5),
        retry: RetryPolicy {
            backoff_factor: Duration::from_millis(5),
            ..RetryPolicy::default()
        },
        ..GatewayConfig::default()
    };
    Gateway::new(config, Span::none()).expect("gateway")
}

#[allow(unused)]
pub async fn start() -> (Arc<FakeBackend>, Gateway) {
    let backend = Arc::new(FakeBackend::default());
    let addr = serve(backend.clone()).await;
    (backend, gateway(addr))
}
