mod common;

use axum::http::Method;
use serde_json::json;
use surfacescan_core::{ApiPayload, GatewayError};
use surfacescan_model::{AiGenerateRequest, ScanRequest};

use common::{Reply, dead_addr, gateway, start};

#[tokio::test]
async fn get_retries_through_transient_503s() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::GET,
        "/api/queue/stats",
        vec![
            Reply::json(503, json!({ "error": "busy" })),
            Reply::json(503, json!({ "error": "busy" })),
            Reply::json(503, json!({ "error": "busy" })),
            Reply::ok(json!({ "waiting": 2, "active": 1 })),
        ],
    );

    let stats = gateway.queue_stats().await.unwrap();
    assert_eq!((stats.waiting, stats.active), (2, 1));
    assert_eq!(backend.hits_on(Method::GET, "/api/queue/stats"), 4);
}

#[tokio::test]
async fn retries_stop_after_four_attempts() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::GET,
        "/api/analytics/summary",
        vec![Reply::text(502, "<html>bad gateway</html>")],
    );

    let err = gateway.analytics_summary().await.unwrap_err();
    assert_eq!(err.status(), 502);
    assert_eq!(err.to_string(), "HTTP 502: Bad Gateway");
    assert_eq!(backend.hits_on(Method::GET, "/api/analytics/summary"), 4);
}

#[tokio::test]
async fn writes_are_never_retried() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::POST,
        "/api/scans",
        vec![Reply::json(503, json!({ "error": "queue full" }))],
    );
    backend.script(
        Method::PUT,
        "/api/settings",
        vec![Reply::json(503, json!({ "error": "read only" }))],
    );
    backend.script(
        Method::DELETE,
        "/api/scans/abc",
        vec![Reply::text(503, "unavailable")],
    );

    let err = gateway
        .create_scan(&ScanRequest::new("https://shop.test"))
        .await
        .unwrap_err();
    assert_eq!(err, GatewayError::Http {
        status: 503,
        message: "queue full".into()
    });
    assert!(gateway.update_settings(&json!({ "theme": "light" })).await.is_err());
    assert!(gateway.delete_scan("abc").await.is_err());

    assert_eq!(backend.hits_on(Method::POST, "/api/scans"), 1);
    assert_eq!(backend.hits_on(Method::PUT, "/api/settings"), 1);
    assert_eq!(backend.hits_on(Method::DELETE, "/api/scans/abc"), 1);
}

#[tokio::test]
async fn create_scan_sends_camel_case_body() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::POST,
        "/api/scans",
        vec![Reply::json(201, json!({ "id": "abc", "status": "pending" }))],
    );

    let created = gateway
        .create_scan(&ScanRequest::new("https://shop.test").crawl_depth(3))
        .await
        .unwrap();
    assert_eq!(created.id.as_deref(), Some("abc"));

    let hit = &backend.hits()[0];
    let body = hit.body.as_ref().unwrap();
    assert_eq!(body["url"], "https://shop.test");
    assert_eq!(body["renderJavaScript"], true);
    assert_eq!(body["crawlDepth"], 3);
    assert_eq!(body["scanType"], "comprehensive");
}

#[tokio::test]
async fn create_scan_keeps_numeric_id() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::POST,
        "/api/scans",
        vec![Reply::json(201, json!({ "id": 42, "status": { "state": "queued" } }))],
    );

    let created = gateway
        .create_scan(&ScanRequest::new("https://shop.test"))
        .await
        .unwrap();
    assert_eq!(created.id.as_deref(), Some("42"));
    assert_eq!(created.status, None);
}

#[tokio::test]
async fn create_scan_without_object_body_has_no_id() {
    let (backend, gateway) = start().await;
    backend.script(Method::POST, "/api/scans", vec![Reply::text(200, "accepted")]);

    let created = gateway
        .create_scan(&ScanRequest::new("https://shop.test"))
        .await
        .unwrap();
    assert!(created.id.is_none());
}

#[tokio::test]
async fn cached_reads_hit_the_backend_once() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::GET,
        "/health",
        vec![Reply::ok(json!({ "status": "healthy" }))],
    );
    backend.script(
        Method::GET,
        "/api/scans/abc/results",
        vec![Reply::ok(json!({ "scan": { "url": "https://shop.test" } }))],
    );
    backend.script(
        Method::GET,
        "/api/analytics/summary",
        vec![Reply::ok(json!({ "totalScans": 4 }))],
    );

    for _ in 0..3 {
        assert!(gateway.health().await.unwrap().is_healthy());
        gateway.scan_results("abc").await.unwrap();
        gateway.analytics_summary().await.unwrap();
    }

    assert_eq!(backend.hits_on(Method::GET, "/health"), 1);
    assert_eq!(backend.hits_on(Method::GET, "/api/scans/abc/results"), 1);
    assert_eq!(backend.hits_on(Method::GET, "/api/analytics/summary"), 3);
}

#[tokio::test]
async fn deleting_a_scan_drops_its_cached_results() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::GET,
        "/api/scans/abc/results",
        vec![Reply::ok(json!({ "libraries": [] }))],
    );
    backend.script(
        Method::DELETE,
        "/api/scans/abc",
        vec![Reply::ok(json!({ "deleted": true }))],
    );

    gateway.scan_results("abc").await.unwrap();
    gateway.delete_scan("abc").await.unwrap();
    gateway.scan_results("abc").await.unwrap();
    assert_eq!(backend.hits_on(Method::GET, "/api/scans/abc/results"), 2);
}

#[tokio::test]
async fn list_scans_sends_paging_and_accepts_wrapped_page() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::GET,
        "/api/scans",
        vec![Reply::ok(json!({
            "scans": [{ "id": "a", "url": "https://a.test", "status": "completed" }],
            "total": 1
        }))],
    );

    let page = gateway.list_scans(50, 0).await.unwrap();
    assert_eq!(page.scans()[0].id, "a");

    let query = backend.hits()[0].query.clone().unwrap();
    assert!(query.contains("limit=50"));
    assert!(query.contains("offset=0"));
}

#[tokio::test]
async fn error_field_is_used_as_message() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::GET,
        "/api/scans/nope/status",
        vec![Reply::json(404, json!({ "error": "Scan not found" }))],
    );

    let err = gateway.scan_status("nope").await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Scan not found");
}

#[tokio::test]
async fn non_json_success_is_returned_as_text() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::GET,
        "/api/scans/abc/export",
        vec![Reply::text(200, "library,version\njquery,1.8.3\n")],
    );

    let payload = gateway.export_scan_report("abc", "csv").await.unwrap();
    assert_eq!(
        payload,
        ApiPayload::Text("library,version\njquery,1.8.3\n".into())
    );
    assert_eq!(backend.hits()[0].query.as_deref(), Some("format=csv"));
}

#[tokio::test]
async fn ai_falls_back_only_on_404() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::POST,
        "/api/ai/generate",
        vec![Reply::ok(json!({ "text": "summary" }))],
    );

    let request = AiGenerateRequest::new("Summarise the scan");
    let payload = gateway.generate_ai_analysis(&request).await.unwrap();
    assert_eq!(payload, ApiPayload::Json(json!({ "text": "summary" })));
    assert_eq!(backend.hits_on(Method::POST, "/api/ai/llm/generate"), 1);
    assert_eq!(backend.hits_on(Method::POST, "/api/ai/generate"), 1);
    assert_eq!(backend.hits_on(Method::POST, "/api/ai/analyze"), 0);

    let body = backend.hits()[0].body.clone().unwrap();
    assert_eq!(body["max_tokens"], 512);
    assert!(body["system"].as_str().unwrap().contains("security expert"));
}

#[tokio::test]
async fn ai_reaches_last_endpoint_after_two_404s() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::POST,
        "/api/ai/analyze",
        vec![Reply::ok(json!({ "analysis": "ok" }))],
    );

    gateway
        .generate_ai_analysis(&AiGenerateRequest::new("x"))
        .await
        .unwrap();
    let paths: Vec<_> = backend.hits().into_iter().map(|hit| hit.path).collect();
    assert_eq!(
        paths,
        vec!["/api/ai/llm/generate", "/api/ai/generate", "/api/ai/analyze"]
    );
}

#[tokio::test]
async fn ai_other_errors_do_not_fall_through() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::POST,
        "/api/ai/llm/generate",
        vec![Reply::json(500, json!({ "error": "model not loaded" }))],
    );

    let err = gateway
        .generate_ai_analysis(&AiGenerateRequest::new("x"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "model not loaded");
    assert_eq!(backend.hits().len(), 1);
}

#[tokio::test]
async fn ai_all_missing_returns_last_404() {
    let (backend, gateway) = start().await;
    let err = gateway
        .generate_ai_analysis(&AiGenerateRequest::new("x"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(backend.hits().len(), 3);
}

#[tokio::test]
async fn transport_failure_reports_status_zero() {
    let gateway = gateway(dead_addr().await);
    let err = gateway.health().await.unwrap_err();
    assert!(err.is_transport());
    assert_eq!(err.status(), 0);
    assert_eq!(gateway.connection_state().connected, Some(false));
    assert!(!gateway.test_connection().await);
}

#[tokio::test]
async fn observer_sees_false_then_true() {
    let (backend, live) = start().await;
    backend.script(
        Method::GET,
        "/health",
        vec![Reply::ok(json!({ "status": "healthy" }))],
    );
    let live_url = live.base_url();

    let gateway = gateway(dead_addr().await);
    let mut changes = gateway.subscribe_connection();

    assert!(!gateway.test_connection().await);
    assert!(!gateway.test_connection().await);
    gateway.set_base_url(&live_url);
    assert!(gateway.test_connection().await);
    assert!(gateway.test_connection().await);

    let mut seen = Vec::new();
    while let Some(change) = changes.try_changed() {
        seen.push(change);
    }
    assert_eq!(seen, vec![false, true]);
    assert!(gateway.is_connected().connected);
    assert!(!gateway.is_connected().stale);
}

#[tokio::test]
async fn unhealthy_probe_notifies_once() {
    let (backend, gateway) = start().await;
    let mut changes = gateway.subscribe_connection();

    // /health is unscripted, so every probe gets a 404
    assert!(!gateway.test_connection().await);
    assert!(!gateway.test_connection().await);

    let mut seen = Vec::new();
    while let Some(change) = changes.try_changed() {
        seen.push(change);
    }
    assert_eq!(seen, vec![false]);
    assert_eq!(backend.hits_on(Method::GET, "/health"), 2);
}

#[tokio::test]
async fn http_error_still_counts_as_reachable() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::GET,
        "/api/scans/abc/status",
        vec![Reply::json(400, json!({ "error": "bad id" }))],
    );

    assert!(gateway.scan_status("abc").await.is_err());
    assert_eq!(gateway.connection_state().connected, Some(true));
}

#[tokio::test]
async fn cleanup_closes_the_gateway() {
    let (_backend, gateway) = start().await;
    gateway.cleanup();
    gateway.cleanup();
    assert_eq!(gateway.ready().await.unwrap_err(), GatewayError::Closed);
    assert!(gateway.cache().is_empty());
}

#[tokio::test]
async fn base_url_change_drops_cache() {
    let (backend, gateway) = start().await;
    backend.script(
        Method::GET,
        "/health",
        vec![Reply::ok(json!({ "status": "healthy" }))],
    );
    gateway.health().await.unwrap();
    let url = gateway.base_url();

    gateway.set_base_url(&format!("  {url}/ "));
    assert_eq!(gateway.base_url(), url);
    assert_eq!(gateway.connection_state().connected, None);
    gateway.health().await.unwrap();
    assert_eq!(backend.hits_on(Method::GET, "/health"), 2);
}
