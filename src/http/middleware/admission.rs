//! Admission middleware.
//!
//! Wraps every route: runs the admission sequence, short-circuits with 429 or
//! 423, and stamps the security headers on whatever response goes out.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::admission::{Admission, Outcome};
use crate::observability::metrics;
use crate::security::lockout::LockoutInfo;

pub async fn admission_middleware(
    State(admission): State<Arc<Admission>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let verdict = admission.evaluate(request.headers(), request.uri().path());

    let mut response = match &verdict.outcome {
        Outcome::Admitted => next.run(request).await,
        Outcome::RateLimited { retry_after } => rate_limited_response(*retry_after),
        Outcome::LockedOut(info) => locked_response(info),
    };

    admission.finalize(verdict.class, response.headers_mut());
    metrics::record_request(verdict.class.as_str(), verdict.outcome.as_str(), start);
    response
}

/// 429 with `Retry-After` set to the full window length.
pub fn rate_limited_response(retry_after: Duration) -> Response {
    let mut response = (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests").into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
    response
}

/// 423 with the lockout state as JSON.
pub fn locked_response(info: &LockoutInfo) -> Response {
    (StatusCode::LOCKED, Json(*info)).into_response()
}
