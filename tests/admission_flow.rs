//! End-to-end admission behaviour through the layered router.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use site_guard::HttpServer;

mod common;

use common::{body_string, get_as, send, start_mock_upstream, start_silent_upstream, test_config};

fn assert_security_headers(response: &axum::http::Response<Body>) {
    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers["x-xss-protection"], "1; mode=block");
    assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
    assert_eq!(
        headers["permissions-policy"],
        "camera=(), microphone=(), geolocation=()"
    );
    let csp = headers["content-security-policy"].to_str().unwrap();
    assert!(csp.starts_with("default-src 'self';"));
    assert!(!csp.contains('\n'));
}

#[tokio::test]
async fn test_standard_client_stays_under_limit() {
    let (upstream, log) = start_mock_upstream("home").await;
    let server = HttpServer::new(test_config(upstream)).unwrap();

    for _ in 0..20 {
        let response = send(&server, get_as("1.2.3.4", "/api/posts")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_security_headers(&response);
        assert!(!response.headers().contains_key("x-admin-access"));
        assert_eq!(response.headers()["x-upstream"], "mock");
        assert_eq!(body_string(response).await, "home");
    }

    assert_eq!(log.lock().unwrap().len(), 20);
    let admission = server.admission();
    assert_eq!(admission.monitor().len(), 0);
}

#[tokio::test]
async fn test_admin_client_limited_on_twenty_first_request() {
    let (upstream, _) = start_mock_upstream("studio").await;
    let server = HttpServer::new(test_config(upstream)).unwrap();

    for i in 0..20 {
        let response = send(&server, get_as("5.6.7.8", "/admin")).await;
        assert_eq!(response.status(), StatusCode::OK, "request {}", i + 1);
        assert_eq!(response.headers()["x-admin-access"], "true");
        assert_eq!(
            response.headers()["cache-control"],
            "no-store, no-cache, must-revalidate"
        );
    }

    let response = send(&server, get_as("5.6.7.8", "/admin")).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "900");
    assert_security_headers(&response);
    assert_eq!(response.headers()["x-admin-access"], "true");
    assert_eq!(body_string(response).await, "Too Many Requests");

    // Another client is unaffected.
    let response = send(&server, get_as("5.6.7.9", "/admin")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_exempt_assets_bypass_rate_limit() {
    let (upstream, _) = start_mock_upstream("asset").await;
    let mut config = test_config(upstream);
    config.rate_limit.max_requests = 2;
    config.rate_limit.admin_max_requests = 1;
    let server = HttpServer::new(config).unwrap();

    for _ in 0..5 {
        let response = send(&server, get_as("2.2.2.2", "/_next/static/chunk.js")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_security_headers(&response);
    }

    assert_eq!(send(&server, get_as("2.2.2.2", "/")).await.status(), StatusCode::OK);
    assert_eq!(send(&server, get_as("2.2.2.2", "/")).await.status(), StatusCode::OK);
    assert_eq!(
        send(&server, get_as("2.2.2.2", "/")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

#[tokio::test]
async fn test_upstream_security_headers_are_overwritten() {
    let (upstream, _) = start_mock_upstream("page").await;
    let server = HttpServer::new(test_config(upstream)).unwrap();

    let response = send(&server, get_as("3.3.3.3", "/about")).await;
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert_eq!(response.headers().get_all("x-frame-options").iter().count(), 1);
}

#[tokio::test]
async fn test_upstream_failure_returns_bad_gateway() {
    let upstream = common::closed_port().await;
    let server = HttpServer::new(test_config(upstream)).unwrap();

    let response = send(&server, get_as("4.4.4.4", "/api/posts")).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_security_headers(&response);
}

#[tokio::test]
async fn test_request_timeout_still_carries_headers() {
    let upstream = start_silent_upstream().await;
    let mut config = test_config(upstream);
    config.timeouts.request_secs = 1;
    let server = HttpServer::new(config).unwrap();

    let response = send(&server, get_as("1.2.3.4", "/admin")).await;
    assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
    assert_security_headers(&response);
    assert_eq!(response.headers()["x-admin-access"], "true");
    assert_eq!(
        response.headers()["cache-control"],
        "no-store, no-cache, must-revalidate"
    );
}

#[tokio::test]
async fn test_suspicious_agent_is_admitted_and_recorded() {
    let (upstream, _) = start_mock_upstream("ok").await;
    let server = HttpServer::new(test_config(upstream)).unwrap();

    let request = Request::builder()
        .uri("/wp-login.php")
        .header("x-forwarded-for", "6.6.6.6")
        .header("user-agent", "sqlmap/1.7.2#stable")
        .body(Body::empty())
        .unwrap();
    let response = send(&server, request).await;
    assert_eq!(response.status(), StatusCode::OK);

    let events = server.admission().monitor().recent_events(std::time::Duration::from_secs(60));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].client_key.as_str(), "6.6.6.6");
    assert_eq!(events[0].details["reason"], "suspicious_user_agent");
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let (upstream, _) = start_mock_upstream("ok").await;
    let mut config = test_config(upstream);
    config.rate_limit.window_secs = 0;
    config.rate_limit.admin_max_requests = 500;

    let err = HttpServer::new(config).err().expect("config should be rejected");
    let message = err.to_string();
    assert!(message.contains("rate_limit.window_secs"));
    assert!(message.contains("admin_max_requests"));
}
