//! Bounded security event log with per-client anomaly detection.
//!
//! # Responsibilities
//! - Keep the most recent `capacity` security events (FIFO eviction)
//! - Serve chronological snapshots filtered by age and kind
//! - Raise a suspicious-activity signal when one client produces too many
//!   events inside the trailing detection window
//!
//! # Design Decisions
//! - The signal is observational; blocking or alerting is left to an
//!   [`AnomalyHook`] supplied by the embedder
//! - Density is counted over retained events only, so events pushed out by
//!   capacity pressure no longer count

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::clock::{Clock, Timestamp};
use crate::config::MonitorConfig;
use crate::identity::ClientKey;
use crate::observability::metrics;

/// Category of a security event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    RateLimit,
    AdminAccess,
    FailedAuth,
    SuspiciousActivity,
}

impl SecurityEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::AdminAccess => "admin_access",
            Self::FailedAuth => "failed_auth",
            Self::SuspiciousActivity => "suspicious_activity",
        }
    }
}

impl fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SecurityEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rate_limit" => Ok(Self::RateLimit),
            "admin_access" => Ok(Self::AdminAccess),
            "failed_auth" => Ok(Self::FailedAuth),
            "suspicious_activity" => Ok(Self::SuspiciousActivity),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// Diagnostic payload attached to an event.
pub type EventDetails = BTreeMap<String, String>;

/// One recorded security event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityEvent {
    pub kind: SecurityEventKind,
    pub client_key: ClientKey,
    pub user_agent: String,
    pub occurred_at: Timestamp,
    pub details: EventDetails,
}

/// Raised when a client's event density crosses the threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnomalySignal {
    pub client_key: ClientKey,
    pub event_count: usize,
    pub window_secs: u64,
    pub detected_at: Timestamp,
}

/// Receiver for anomaly signals, e.g. an alerting or blocking collaborator.
pub trait AnomalyHook: Send + Sync {
    fn on_anomaly(&self, signal: &AnomalySignal);
}

/// Hook that does nothing beyond the monitor's own logging.
#[derive(Debug, Default)]
pub struct NoopHook;

impl AnomalyHook for NoopHook {
    fn on_anomaly(&self, _signal: &AnomalySignal) {}
}

/// Sizing and detection thresholds, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorPolicy {
    pub capacity: usize,
    pub suspicious_window: Duration,
    pub suspicious_threshold: usize,
}

impl From<&MonitorConfig> for MonitorPolicy {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            capacity: config.capacity,
            suspicious_window: config.suspicious_window(),
            suspicious_threshold: config.suspicious_threshold,
        }
    }
}

/// Fixed-capacity security event log.
pub struct SecurityMonitor {
    events: Mutex<VecDeque<SecurityEvent>>,
    policy: MonitorPolicy,
    clock: Arc<dyn Clock>,
    hook: Arc<dyn AnomalyHook>,
    anomalies: AtomicU64,
}

impl fmt::Debug for SecurityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecurityMonitor")
            .field("policy", &self.policy)
            .field("len", &self.len())
            .finish()
    }
}

impl SecurityMonitor {
    pub fn new(policy: MonitorPolicy, clock: Arc<dyn Clock>) -> Self {
        Self::with_hook(policy, clock, Arc::new(NoopHook))
    }

    pub fn with_hook(policy: MonitorPolicy, clock: Arc<dyn Clock>, hook: Arc<dyn AnomalyHook>) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(policy.capacity.min(4096))),
            policy,
            clock,
            hook,
            anomalies: AtomicU64::new(0),
        }
    }

    fn events(&self) -> MutexGuard<'_, VecDeque<SecurityEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event, evicting the oldest at capacity, then run the
    /// suspicious-activity check for the event's client.
    pub fn log_event(
        &self,
        kind: SecurityEventKind,
        client_key: &ClientKey,
        user_agent: &str,
        details: EventDetails,
    ) -> Option<AnomalySignal> {
        let (now, recent_for_client) = {
            let mut events = self.events();
            // Read under the lock so the log stays in timestamp order.
            let now = self.clock.now();
            let window_start = now.minus(self.policy.suspicious_window);
            while events.len() >= self.policy.capacity.max(1) {
                events.pop_front();
            }
            events.push_back(SecurityEvent {
                kind,
                client_key: client_key.clone(),
                user_agent: user_agent.to_string(),
                occurred_at: now,
                details,
            });
            let count = events
                .iter()
                .rev()
                .take_while(|e| e.occurred_at >= window_start)
                .filter(|e| &e.client_key == client_key)
                .count();
            (now, count)
        };

        tracing::debug!(kind = %kind, client = %client_key, "Security event logged");
        metrics::record_security_event(kind.as_str());

        if recent_for_client <= self.policy.suspicious_threshold {
            return None;
        }

        let signal = AnomalySignal {
            client_key: client_key.clone(),
            event_count: recent_for_client,
            window_secs: self.policy.suspicious_window.as_secs(),
            detected_at: now,
        };
        self.anomalies.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            client = %client_key,
            event_count = recent_for_client,
            window_secs = signal.window_secs,
            "Suspicious activity detected"
        );
        metrics::record_anomaly();
        self.hook.on_anomaly(&signal);
        Some(signal)
    }

    /// Events that occurred within the trailing `window`, oldest first.
    pub fn recent_events(&self, window: Duration) -> Vec<SecurityEvent> {
        self.collect(window, |_| true)
    }

    /// Events of `kind` within the trailing `window`, oldest first.
    pub fn events_by_kind(&self, kind: SecurityEventKind, window: Duration) -> Vec<SecurityEvent> {
        self.collect(window, |e| e.kind == kind)
    }

    fn collect(&self, window: Duration, keep: impl Fn(&SecurityEvent) -> bool) -> Vec<SecurityEvent> {
        let cutoff = self.clock.now().minus(window);
        self.events()
            .iter()
            .filter(|e| e.occurred_at >= cutoff && keep(e))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn policy(&self) -> &MonitorPolicy {
        &self.policy
    }

    /// Total anomaly signals raised since startup.
    pub fn anomalies_signalled(&self) -> u64 {
        self.anomalies.load(Ordering::Relaxed)
    }
}

/// Shorthand for building an [`EventDetails`] map.
pub fn details<const N: usize>(pairs: [(&str, &str); N]) -> EventDetails {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
