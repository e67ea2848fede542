// Integration tests for administrative API endpoints.

use axum::http::{Method, StatusCode};
use bytes::Bytes;
use serde::Deserialize;

use crate::revoke::Populated;
use crate::tests::support::{call, call_json, TestApp};

#[derive(Debug, Deserialize)]
struct RevokeResponse {
    revoke_key: Option<String>,
    subscribers: Option<usize>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    index_size: usize,
    queue_pending: usize,
    store_len: usize,
}

#[tokio::test]
async fn test_revoke_requires_key() {
    let test_app = TestApp::started();

    for uri in ["/revoke", "/revoke?key="] {
        let (status, resp) =
            call_json::<RevokeResponse>(test_app.app.router(), Method::GET, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(resp.error.is_some());
    }

    test_app.stop().await;
}

#[tokio::test]
async fn test_revoke_without_listener_is_unavailable() {
    let test_app = TestApp::new();

    let (status, resp) =
        call_json::<RevokeResponse>(test_app.app.router(), Method::POST, "/revoke?key=r1").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(resp.error.unwrap().contains("no subscribers"));

    test_app.stop().await;
}

#[tokio::test]
async fn test_revoke_is_published_on_get_and_post() {
    let test_app = TestApp::started();

    for method in [Method::GET, Method::POST] {
        let (status, resp) =
            call_json::<RevokeResponse>(test_app.app.router(), method, "/revoke?key=orders").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp.revoke_key.as_deref(), Some("orders"));
        assert_eq!(resp.subscribers, Some(1));
        assert!(resp.error.is_none());
    }

    test_app.stop().await;
}

#[tokio::test]
async fn test_stats_report_empty_subsystem() {
    let test_app = TestApp::new();

    let (status, stats) =
        call_json::<StatsResponse>(test_app.app.router(), Method::GET, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats.index_size, 0);
    assert_eq!(stats.queue_pending, 0);
    assert_eq!(stats.store_len, 0);

    test_app.stop().await;
}

#[tokio::test]
async fn test_stats_count_entries_populated_through_coordinator() {
    let test_app = TestApp::new();

    test_app
        .app
        .coordinator()
        .get_or_populate("orders:42", || async {
            Ok(Populated::new(
                Bytes::from_static(b"{}"),
                vec!["orders".to_string(), "customers".to_string()],
            ))
        })
        .await
        .unwrap();

    let (status, stats) =
        call_json::<StatsResponse>(test_app.app.router(), Method::GET, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats.store_len, 1);
    assert_eq!(stats.index_size, 2);
    assert_eq!(stats.queue_pending, 0);

    test_app.stop().await;
}

#[tokio::test]
async fn test_probe_follows_maintainer_lifecycle() {
    let test_app = TestApp::new();
    let (status, _) = call(test_app.app.router(), Method::GET, "/k8s/probe").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "not started yet");

    test_app.app.start(&test_app.gsh);
    let (status, _) = call(test_app.app.router(), Method::GET, "/k8s/probe").await;
    assert_eq!(status, StatusCode::OK);
    assert!(test_app.app.is_alive());

    let router = test_app.app.router();
    let app = test_app.app.clone();
    test_app.stop().await;

    let (status, _) = call(router, Method::GET, "/k8s/probe").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "disposed");
    assert!(!app.is_alive());
}

#[tokio::test]
async fn test_metrics_endpoint_renders_text() {
    let test_app = TestApp::new();

    let (status, body) = call(test_app.app.router(), Method::GET, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(body).is_ok());

    test_app.stop().await;
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let test_app = TestApp::new();

    let (status, _) = call(test_app.app.router(), Method::GET, "/cache/clear").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    test_app.stop().await;
}
