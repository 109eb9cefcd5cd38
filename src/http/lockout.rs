//! Lockout endpoint used by the login flow.
//!
//! `POST {routes.lockout_path}` with `{"action": "check" | "auth_attempt", "success": bool}`.
//! Responds 423 while the caller is locked, 200 otherwise, 400 on bad input.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::admission::Admission;
use crate::identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockoutAction {
    Check,
    AuthAttempt,
}

#[derive(Debug, Deserialize)]
pub struct LockoutRequest {
    pub action: LockoutAction,
    #[serde(default)]
    pub success: bool,
}

pub async fn lockout_handler(
    State(admission): State<Arc<Admission>>,
    headers: HeaderMap,
    payload: Result<Json<LockoutRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::debug!(error = %rejection.body_text(), "Rejected lockout request");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Invalid action" })),
            )
                .into_response();
        }
    };

    let identity = identity::resolve(&headers);
    let report = match request.action {
        LockoutAction::Check => admission.lockout_report(&identity),
        LockoutAction::AuthAttempt => admission.record_auth_attempt(&identity, request.success),
    };

    let status = if report.info.locked {
        StatusCode::LOCKED
    } else {
        StatusCode::OK
    };
    (status, Json(report)).into_response()
}
