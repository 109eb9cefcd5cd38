use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::http::server::AppState;
use crate::security::lockout::LockoutStats;
use crate::security::monitor::{SecurityEvent, SecurityEventKind};

const DEFAULT_EVENT_WINDOW_MINUTES: u64 = 60;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub uptime_secs: u64,
    pub upstream: String,
    pub events_logged: usize,
    pub event_capacity: usize,
    pub anomalies_signalled: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LimiterStatus {
    pub window_secs: u64,
    pub max_requests: u32,
    pub admin_max_requests: u32,
    pub tracked_keys: usize,
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub window_minutes: Option<u64>,
    pub kind: Option<SecurityEventKind>,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let monitor = state.admission.monitor();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        upstream: state.upstream.to_string(),
        events_logged: monitor.len(),
        event_capacity: monitor.policy().capacity,
        anomalies_signalled: monitor.anomalies_signalled(),
    })
}

pub async fn get_lockouts(State(state): State<AppState>) -> Json<LockoutStats> {
    Json(state.admission.lockouts().stats())
}

pub async fn get_limiter(State(state): State<AppState>) -> Json<LimiterStatus> {
    let policy = state.admission.policy();
    let limiter = state.admission.limiter();
    Json(LimiterStatus {
        window_secs: limiter.window().as_secs(),
        max_requests: policy.max_requests,
        admin_max_requests: policy.admin_max_requests,
        tracked_keys: limiter.tracked_keys(),
    })
}

pub async fn get_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Json<Vec<SecurityEvent>> {
    let minutes = query.window_minutes.unwrap_or(DEFAULT_EVENT_WINDOW_MINUTES);
    let window = Duration::from_secs(minutes.saturating_mul(60));
    let monitor = state.admission.monitor();
    let events = match query.kind {
        Some(kind) => monitor.events_by_kind(kind, window),
        None => monitor.recent_events(window),
    };
    Json(events)
}
