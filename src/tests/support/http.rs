// In-process HTTP helpers over the admin router.

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde::de::DeserializeOwned;
use tower::ServiceExt;

/// Sends one request through `router` and returns status and body.
pub async fn call(router: Router, method: Method, uri: &str) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");

    let response = router.oneshot(request).await.expect("infallible router");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    (status, body.to_vec())
}

/// Like [`call`], decoding a JSON body.
pub async fn call_json<T: DeserializeOwned>(
    router: Router,
    method: Method,
    uri: &str,
) -> (StatusCode, T) {
    let (status, body) = call(router, method, uri).await;
    let decoded = serde_json::from_slice(&body).unwrap_or_else(|e| {
        panic!(
            "invalid JSON from {uri}: {e}: {}",
            String::from_utf8_lossy(&body)
        )
    });
    (status, decoded)
}
