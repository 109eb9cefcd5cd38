//! Introspection API under `/_guard`, guarded by a bearer key.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/_guard/status", get(get_status))
        .route("/_guard/lockouts", get(get_lockouts))
        .route("/_guard/limiter", get(get_limiter))
        .route("/_guard/events", get(get_events))
        .layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
