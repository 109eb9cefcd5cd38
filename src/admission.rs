//! Admission façade.
//!
//! # Data Flow
//! ```text
//! Request headers + path
//!     → identity (client key, user agent)
//!     → routing (admin / standard / exempt)
//!     → lockout (admin routes, locked client → 423)
//!     → rate_limit (tiered fixed window → 429)
//!     → monitor (rate_limit / admin_access / suspicious_activity events)
//!     → Verdict, consumed by the HTTP middleware
//! ```
//!
//! # Design Decisions
//! - Owns the three stores; nothing else holds references into them
//! - Stores and window length are fixed for the process lifetime; tiers,
//!   prefixes, headers and user agent patterns are swapped atomically on reload
//! - Decisions never fail: unknown clients share the `"unknown"` bucket

use arc_swap::ArcSwap;
use axum::http::HeaderMap;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};
use crate::config::GuardConfig;
use crate::identity::{self, ClientIdentity};
use crate::routing::{RouteClass, RouteClassifier};
use crate::security::headers::SecurityHeaders;
use crate::security::lockout::{LockoutInfo, LockoutManager, LockoutPolicy, LockoutStatus};
use crate::security::monitor::{
    details, AnomalySignal, MonitorPolicy, SecurityEventKind, SecurityMonitor,
};
use crate::security::rate_limit::FixedWindowLimiter;

/// The reloadable part of the admission configuration.
#[derive(Debug)]
pub struct AdmissionPolicy {
    pub classifier: RouteClassifier,
    pub headers: SecurityHeaders,
    pub max_requests: u32,
    pub admin_max_requests: u32,
    pub enforce_lockout_on_admin: bool,
    suspicious_agents: Vec<String>,
    flag_empty_agent: bool,
}

impl AdmissionPolicy {
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            classifier: RouteClassifier::from_config(&config.routes),
            headers: SecurityHeaders::from_config(&config.headers),
            max_requests: config.rate_limit.max_requests,
            admin_max_requests: config.rate_limit.admin_max_requests,
            enforce_lockout_on_admin: config.lockout.enforce_on_admin,
            suspicious_agents: config
                .monitor
                .suspicious_user_agents
                .iter()
                .map(|p| p.to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            flag_empty_agent: config.monitor.flag_empty_user_agent,
        }
    }

    /// Rate tier for a class; `None` means not rate limited.
    pub fn tier(&self, class: RouteClass) -> Option<u32> {
        match class {
            RouteClass::Admin => Some(self.admin_max_requests),
            RouteClass::Standard => Some(self.max_requests),
            RouteClass::Exempt => None,
        }
    }

    /// Case-insensitive user agent screening.
    pub fn is_suspicious_agent(&self, user_agent: &str) -> bool {
        if user_agent.trim().is_empty() {
            return self.flag_empty_agent;
        }
        let ua = user_agent.to_lowercase();
        self.suspicious_agents.iter().any(|p| ua.contains(p.as_str()))
    }
}

/// What the guard decided for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Admitted,
    RateLimited { retry_after: Duration },
    LockedOut(LockoutInfo),
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Admitted => "admitted",
            Outcome::RateLimited { .. } => "rate_limited",
            Outcome::LockedOut(_) => "locked_out",
        }
    }
}

/// Admission decision plus the context needed to finish the response.
#[derive(Debug, Clone)]
pub struct Verdict {
    pub identity: ClientIdentity,
    pub class: RouteClass,
    pub outcome: Outcome,
    /// Last anomaly raised while logging this request's events.
    pub anomaly: Option<AnomalySignal>,
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self.outcome, Outcome::Admitted)
    }
}

/// Lockout state returned to authentication collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LockoutReport {
    #[serde(flatten)]
    pub info: LockoutInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_remaining: Option<u32>,
}

/// Owns the guard stores and runs the per-request admission sequence.
pub struct Admission {
    limiter: FixedWindowLimiter,
    lockouts: LockoutManager,
    monitor: SecurityMonitor,
    policy: ArcSwap<AdmissionPolicy>,
}

impl std::fmt::Debug for Admission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Admission")
            .field("limiter", &self.limiter)
            .field("lockouts", &self.lockouts)
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}

impl Admission {
    /// Build fresh stores on the wall clock.
    pub fn new(config: &GuardConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build fresh stores sharing `clock`.
    pub fn with_clock(config: &GuardConfig, clock: Arc<dyn Clock>) -> Self {
        let limiter = FixedWindowLimiter::new(config.rate_limit.window(), clock.clone());
        let lockouts = LockoutManager::new(LockoutPolicy::from(&config.lockout), clock.clone());
        let monitor = SecurityMonitor::new(MonitorPolicy::from(&config.monitor), clock);
        Self::with_stores(config, limiter, lockouts, monitor)
    }

    /// Assemble from pre-built stores, e.g. a monitor with an anomaly hook.
    pub fn with_stores(
        config: &GuardConfig,
        limiter: FixedWindowLimiter,
        lockouts: LockoutManager,
        monitor: SecurityMonitor,
    ) -> Self {
        Self {
            limiter,
            lockouts,
            monitor,
            policy: ArcSwap::from_pointee(AdmissionPolicy::from_config(config)),
        }
    }

    pub fn limiter(&self) -> &FixedWindowLimiter {
        &self.limiter
    }

    pub fn lockouts(&self) -> &LockoutManager {
        &self.lockouts
    }

    pub fn monitor(&self) -> &SecurityMonitor {
        &self.monitor
    }

    pub fn policy(&self) -> Arc<AdmissionPolicy> {
        self.policy.load_full()
    }

    /// Swap in the reloadable parts of `config`.
    ///
    /// Settings baked into the stores (window, lockout escalation, monitor
    /// sizing) keep their startup values; a warning is logged if they differ.
    pub fn apply_config(&self, config: &GuardConfig) {
        if config.rate_limit.window() != self.limiter.window() {
            tracing::warn!(
                current_secs = self.limiter.window().as_secs(),
                requested_secs = config.rate_limit.window_secs,
                "rate_limit.window_secs changes require a restart"
            );
        }
        if &LockoutPolicy::from(&config.lockout) != self.lockouts.policy() {
            tracing::warn!("lockout escalation changes require a restart");
        }
        if &MonitorPolicy::from(&config.monitor) != self.monitor.policy() {
            tracing::warn!("monitor sizing changes require a restart");
        }

        self.policy.store(Arc::new(AdmissionPolicy::from_config(config)));
        tracing::info!(
            max_requests = config.rate_limit.max_requests,
            admin_max_requests = config.rate_limit.admin_max_requests,
            "Admission policy reloaded"
        );
    }

    /// Run the admission sequence for one request.
    pub fn evaluate(&self, headers: &HeaderMap, path: &str) -> Verdict {
        let policy = self.policy.load();
        let identity = identity::resolve(headers);
        let class = policy.classifier.classify(path);
        let mut anomaly = None;

        if class.is_admin() && policy.enforce_lockout_on_admin {
            let info = self.lockouts.lockout_info(&identity.key);
            if info.locked {
                tracing::info!(client = %identity.key, path, "Locked out client refused");
                anomaly = self.monitor.log_event(
                    SecurityEventKind::AdminAccess,
                    &identity.key,
                    &identity.user_agent,
                    details([("path", path), ("outcome", "locked_out")]),
                );
                return Verdict {
                    identity,
                    class,
                    outcome: Outcome::LockedOut(info),
                    anomaly,
                };
            }
        }

        if let Some(max_requests) = policy.tier(class) {
            if self.limiter.check(&identity.key, max_requests).is_limited() {
                tracing::info!(client = %identity.key, class = %class, path, "Request rate limited");
                anomaly = self.monitor.log_event(
                    SecurityEventKind::RateLimit,
                    &identity.key,
                    &identity.user_agent,
                    details([("path", path), ("route_class", class.as_str())]),
                );
                return Verdict {
                    identity,
                    class,
                    outcome: Outcome::RateLimited {
                        retry_after: self.limiter.window(),
                    },
                    anomaly,
                };
            }
        }

        if class.is_admin() {
            anomaly = self
                .monitor
                .log_event(
                    SecurityEventKind::AdminAccess,
                    &identity.key,
                    &identity.user_agent,
                    details([("path", path), ("outcome", "admitted")]),
                )
                .or(anomaly);
        }

        if policy.is_suspicious_agent(&identity.user_agent) {
            anomaly = self
                .monitor
                .log_event(
                    SecurityEventKind::SuspiciousActivity,
                    &identity.key,
                    &identity.user_agent,
                    details([("path", path), ("reason", "suspicious_user_agent")]),
                )
                .or(anomaly);
        }

        Verdict {
            identity,
            class,
            outcome: Outcome::Admitted,
            anomaly,
        }
    }

    /// Attach security headers for a finished request.
    pub fn finalize(&self, class: RouteClass, headers: &mut HeaderMap) {
        self.policy.load().headers.apply(headers, class.is_admin());
    }

    /// Record an authentication outcome reported by the login collaborator.
    pub fn record_auth_attempt(&self, identity: &ClientIdentity, success: bool) -> LockoutReport {
        if success {
            self.lockouts.record_successful_auth(&identity.key);
            return LockoutReport {
                info: self.lockouts.lockout_info(&identity.key),
                attempts_remaining: None,
            };
        }

        let status: LockoutStatus = self.lockouts.record_failed_attempt(&identity.key);
        let info = self.lockouts.lockout_info(&identity.key);
        let attempts = info.failed_attempts.to_string();
        self.monitor.log_event(
            SecurityEventKind::FailedAuth,
            &identity.key,
            &identity.user_agent,
            details([
                ("failed_attempts", attempts.as_str()),
                ("locked", if status.locked { "true" } else { "false" }),
            ]),
        );
        LockoutReport {
            info,
            attempts_remaining: status.attempts_remaining,
        }
    }

    /// Current lockout state for a client.
    pub fn lockout_report(&self, identity: &ClientIdentity) -> LockoutReport {
        let info = self.lockouts.lockout_info(&identity.key);
        let threshold = self.lockouts.policy().threshold;
        LockoutReport {
            info,
            attempts_remaining: (!info.locked)
                .then(|| threshold.saturating_sub(info.failed_attempts))
                .filter(|remaining| *remaining > 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, Timestamp};
    use axum::http::HeaderValue;

    fn setup(config: GuardConfig) -> (Arc<ManualClock>, Admission) {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(50_000_000)));
        let admission = Admission::with_clock(&config, clock.clone());
        (clock, admission)
    }

    fn client(ip: &str, agent: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(ip).unwrap());
        headers.insert("user-agent", HeaderValue::from_str(agent).unwrap());
        headers
    }

    const BROWSER: &str = "Mozilla/5.0 (X11; Linux x86_64)";

    #[test]
    fn test_standard_tier_scenario() {
        let (_, admission) = setup(GuardConfig::default());
        let headers = client("1.2.3.4", BROWSER);
        for _ in 0..20 {
            let verdict = admission.evaluate(&headers, "/api/posts");
            assert!(verdict.is_admitted());
            assert_eq!(verdict.class, RouteClass::Standard);
        }
        assert!(admission
            .monitor()
            .events_by_kind(SecurityEventKind::RateLimit, Duration::from_secs(900))
            .is_empty());
    }

    #[test]
    fn test_admin_tier_scenario() {
        let (_, admission) = setup(GuardConfig::default());
        let headers = client("5.6.7.8", BROWSER);
        for i in 0..20 {
            assert!(admission.evaluate(&headers, "/admin").is_admitted(), "request {}", i + 1);
        }
        let verdict = admission.evaluate(&headers, "/admin");
        assert_eq!(
            verdict.outcome,
            Outcome::RateLimited {
                retry_after: Duration::from_secs(900)
            }
        );

        let limited = admission
            .monitor()
            .events_by_kind(SecurityEventKind::RateLimit, Duration::from_secs(900));
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].client_key.as_str(), "5.6.7.8");
        assert_eq!(limited[0].details["route_class"], "admin");

        let admin_events = admission
            .monitor()
            .events_by_kind(SecurityEventKind::AdminAccess, Duration::from_secs(900));
        assert_eq!(admin_events.len(), 20);
    }

    #[test]
    fn test_admin_anomaly_raised_on_twenty_first_event() {
        let (_, admission) = setup(GuardConfig::default());
        let headers = client("6.6.6.6", BROWSER);
        for _ in 0..20 {
            assert!(admission.evaluate(&headers, "/studio").anomaly.is_none());
        }
        let verdict = admission.evaluate(&headers, "/studio");
        assert!(!verdict.is_admitted());
        assert_eq!(verdict.anomaly.map(|a| a.event_count), Some(21));
    }

    #[test]
    fn test_exempt_routes_are_not_limited() {
        let mut config = GuardConfig::default();
        config.rate_limit.max_requests = 2;
        config.rate_limit.admin_max_requests = 1;
        let (_, admission) = setup(config);
        let headers = client("7.7.7.7", BROWSER);
        for _ in 0..10 {
            assert!(admission.evaluate(&headers, "/_next/static/app.js").is_admitted());
        }
        assert_eq!(admission.limiter().tracked_keys(), 0);
    }

    #[test]
    fn test_locked_client_refused_on_admin_only() {
        let (clock, admission) = setup(GuardConfig::default());
        let headers = client("9.9.9.9", BROWSER);
        let identity = identity::resolve(&headers);
        for _ in 0..5 {
            admission.record_auth_attempt(&identity, false);
        }

        let verdict = admission.evaluate(&headers, "/admin/dashboard");
        assert!(matches!(verdict.outcome, Outcome::LockedOut(info) if info.locked));
        assert!(admission.evaluate(&headers, "/api/posts").is_admitted());
        assert_eq!(admission.limiter().get(&identity.key).map(|w| w.count), Some(1));

        clock.advance(Duration::from_secs(901));
        assert!(admission.evaluate(&headers, "/admin/dashboard").is_admitted());
    }

    #[test]
    fn test_lockout_enforcement_can_be_disabled() {
        let mut config = GuardConfig::default();
        config.lockout.enforce_on_admin = false;
        let (_, admission) = setup(config);
        let headers = client("9.9.9.8", BROWSER);
        let identity = identity::resolve(&headers);
        for _ in 0..5 {
            admission.record_auth_attempt(&identity, false);
        }
        assert!(admission.evaluate(&headers, "/admin").is_admitted());
    }

    #[test]
    fn test_auth_attempts_report_and_reset() {
        let (_, admission) = setup(GuardConfig::default());
        let identity = identity::resolve(&client("9.9.9.9", BROWSER));

        let first = admission.record_auth_attempt(&identity, false);
        assert_eq!(first.attempts_remaining, Some(4));
        for _ in 0..4 {
            admission.record_auth_attempt(&identity, false);
        }
        let report = admission.lockout_report(&identity);
        assert!(report.info.locked);
        assert_eq!(report.attempts_remaining, None);
        assert_eq!(
            admission
                .monitor()
                .events_by_kind(SecurityEventKind::FailedAuth, Duration::from_secs(60))
                .len(),
            5
        );

        let cleared = admission.record_auth_attempt(&identity, true);
        assert!(!cleared.info.locked);
        assert_eq!(cleared.info.failed_attempts, 0);
    }

    #[test]
    fn test_suspicious_agent_logged_but_admitted() {
        let (_, admission) = setup(GuardConfig::default());
        let verdict = admission.evaluate(&client("3.3.3.3", "sqlmap/1.7"), "/api/search");
        assert!(verdict.is_admitted());
        let events = admission
            .monitor()
            .events_by_kind(SecurityEventKind::SuspiciousActivity, Duration::from_secs(60));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details["reason"], "suspicious_user_agent");
        assert_eq!(events[0].user_agent, "sqlmap/1.7");
    }

    #[test]
    fn test_unknown_clients_share_a_bucket() {
        let mut config = GuardConfig::default();
        config.rate_limit.max_requests = 3;
        let (_, admission) = setup(config);
        let mut anonymous = HeaderMap::new();
        anonymous.insert("user-agent", HeaderValue::from_static(BROWSER));
        for _ in 0..3 {
            assert!(admission.evaluate(&anonymous, "/").is_admitted());
        }
        let verdict = admission.evaluate(&anonymous, "/about");
        assert!(verdict.identity.key.is_unknown());
        assert!(!verdict.is_admitted());
    }

    #[test]
    fn test_reload_swaps_tiers_but_keeps_counts() {
        let (_, admission) = setup(GuardConfig::default());
        let headers = client("8.8.8.8", BROWSER);
        for _ in 0..5 {
            admission.evaluate(&headers, "/api/x");
        }

        let mut tightened = GuardConfig::default();
        tightened.rate_limit.max_requests = 5;
        tightened.rate_limit.admin_max_requests = 5;
        admission.apply_config(&tightened);

        assert_eq!(admission.policy().max_requests, 5);
        assert!(!admission.evaluate(&headers, "/api/x").is_admitted());
    }

    #[test]
    fn test_suspicious_agent_matching() {
        let policy = AdmissionPolicy::from_config(&GuardConfig::default());
        assert!(policy.is_suspicious_agent(""));
        assert!(policy.is_suspicious_agent("   "));
        assert!(policy.is_suspicious_agent("Nikto/2.5.0"));
        assert!(policy.is_suspicious_agent("python-requests/2.31"));
        assert!(!policy.is_suspicious_agent(BROWSER));
    }
}
