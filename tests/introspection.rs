//! `/_guard` introspection API.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use site_guard::config::GuardConfig;
use site_guard::HttpServer;

mod common;

use common::{body_string, get_as, send, start_mock_upstream, test_config};

const KEY: &str = "test-introspection-key";

async fn server() -> HttpServer {
    let (upstream, _) = start_mock_upstream("ok").await;
    let mut config: GuardConfig = test_config(upstream);
    config.admin.enabled = true;
    config.admin.api_key = KEY.to_string();
    HttpServer::new(config).unwrap()
}

fn authed(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header("x-forwarded-for", "10.0.0.1")
        .header("user-agent", "Mozilla/5.0 (X11; Linux x86_64)")
        .header("authorization", format!("Bearer {}", KEY))
        .body(Body::empty())
        .unwrap()
}

async fn json(response: axum::http::Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

#[tokio::test]
async fn test_requires_bearer_key() {
    let server = server().await;

    let response = send(&server, get_as("10.0.0.2", "/_guard/status")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");

    let wrong = Request::builder()
        .uri("/_guard/status")
        .header("authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();
    assert_eq!(send(&server, wrong).await.status(), StatusCode::UNAUTHORIZED);

    let response = send(&server, authed("/_guard/status")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["status"], "operational");
    assert_eq!(body["event_capacity"], 1000);
}

#[tokio::test]
async fn test_disabled_api_falls_through_to_upstream() {
    let (upstream, log) = start_mock_upstream("upstream").await;
    let server = HttpServer::new(test_config(upstream)).unwrap();

    let response = send(&server, authed("/_guard/status")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "upstream");
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_events_filtered_by_kind() {
    let server = server().await;
    for _ in 0..21 {
        send(&server, get_as("5.6.7.8", "/studio")).await;
    }

    let limited = json(send(&server, authed("/_guard/events?kind=rate_limit")).await).await;
    let limited = limited.as_array().unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0]["kind"], "rate_limit");
    assert_eq!(limited[0]["client_key"], "5.6.7.8");

    let all = json(send(&server, authed("/_guard/events?window_minutes=15")).await).await;
    assert_eq!(all.as_array().unwrap().len(), 21);

    let bad = send(&server, authed("/_guard/events?kind=teleport")).await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_limiter_and_lockout_figures() {
    let server = server().await;
    send(&server, get_as("1.1.1.1", "/")).await;
    send(&server, get_as("2.2.2.2", "/")).await;

    let limiter = json(send(&server, authed("/_guard/limiter")).await).await;
    assert_eq!(limiter["window_secs"], 900);
    assert_eq!(limiter["max_requests"], 100);
    assert_eq!(limiter["admin_max_requests"], 20);
    // The two clients plus the introspection caller itself.
    assert_eq!(limiter["tracked_keys"], 3);

    let lockouts = json(send(&server, authed("/_guard/lockouts")).await).await;
    assert_eq!(lockouts["total_tracked_keys"], 0);
    assert_eq!(lockouts["currently_locked"], 0);
}
