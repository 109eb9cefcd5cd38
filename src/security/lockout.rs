//! Progressive lockout for failed authentication.
//!
//! # Responsibilities
//! - Count failed authentication attempts per client
//! - Lock a client once the threshold is reached, escalating the lockout
//!   duration with every further lockout cycle
//! - Clear all state on a successful authentication
//!
//! # Design Decisions
//! - Reporting never mutates: an expired lockout reads as unlocked but the
//!   attempt count stays until a success clears it
//! - Because the count is retained, the first failure after an expired
//!   lockout re-locks immediately at the next escalation step
//! - Escalation is `base × multiplier^(cycle-1)`, capped at `max_duration`

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, Timestamp};
use crate::config::LockoutConfig;
use crate::identity::ClientKey;
use crate::observability::metrics;

/// Lockout state for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutRecord {
    pub failed_attempts: u32,
    pub locked_until: Option<Timestamp>,
    pub last_attempt_at: Timestamp,
    /// Lockouts imposed since the last reset.
    pub lockout_cycles: u32,
}

impl LockoutRecord {
    fn new(now: Timestamp) -> Self {
        Self {
            failed_attempts: 0,
            locked_until: None,
            last_attempt_at: now,
            lockout_cycles: 0,
        }
    }

    fn active_lock(&self, now: Timestamp) -> Option<Timestamp> {
        self.locked_until.filter(|until| *until > now)
    }
}

/// Result of recording a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockoutStatus {
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts_remaining: Option<u32>,
}

/// Read-only view of a client's lockout state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockoutInfo {
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked_until: Option<Timestamp>,
    pub failed_attempts: u32,
}

/// Aggregate lockout figures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockoutStats {
    pub total_tracked_keys: usize,
    pub currently_locked: usize,
}

/// Escalation parameters, fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub threshold: u32,
    pub base_duration: Duration,
    pub multiplier: u32,
    pub max_duration: Duration,
    pub escalation_reset_idle: Option<Duration>,
}

impl LockoutPolicy {
    /// Duration of the `cycle`-th lockout (1-based).
    pub fn duration_for_cycle(&self, cycle: u32) -> Duration {
        let exponent = cycle.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.base_duration
            .checked_mul(factor)
            .unwrap_or(self.max_duration)
            .min(self.max_duration)
    }
}

impl From<&LockoutConfig> for LockoutPolicy {
    fn from(config: &LockoutConfig) -> Self {
        Self {
            threshold: config.threshold,
            base_duration: config.base_duration(),
            multiplier: config.multiplier,
            max_duration: config.max_duration(),
            escalation_reset_idle: config.escalation_reset_idle(),
        }
    }
}

/// Tracks failed authentication per client.
#[derive(Debug)]
pub struct LockoutManager {
    records: DashMap<ClientKey, LockoutRecord>,
    policy: LockoutPolicy,
    clock: Arc<dyn Clock>,
}

impl LockoutManager {
    pub fn new(policy: LockoutPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: DashMap::new(),
            policy,
            clock,
        }
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Record a failed authentication for `key`.
    pub fn record_failed_attempt(&self, key: &ClientKey) -> LockoutStatus {
        let now = self.clock.now();
        let mut entry = self
            .records
            .entry(key.clone())
            .or_insert_with(|| LockoutRecord::new(now));
        let record = entry.value_mut();

        if let Some(until) = record.active_lock(now) {
            record.failed_attempts = record.failed_attempts.saturating_add(1);
            record.last_attempt_at = now;
            return LockoutStatus {
                locked: true,
                locked_until: Some(until),
                attempts_remaining: None,
            };
        }

        if let Some(idle) = self.policy.escalation_reset_idle {
            if record.failed_attempts > 0 && now.since(record.last_attempt_at) >= idle {
                tracing::debug!(client = %key, "Idle period elapsed, resetting lockout escalation");
                record.failed_attempts = 0;
                record.lockout_cycles = 0;
                record.locked_until = None;
            }
        }

        record.failed_attempts = record.failed_attempts.saturating_add(1);
        record.last_attempt_at = now;

        if record.failed_attempts >= self.policy.threshold {
            record.lockout_cycles = record.lockout_cycles.saturating_add(1);
            let duration = self.policy.duration_for_cycle(record.lockout_cycles);
            let until = now.plus(duration);
            record.locked_until = Some(until);

            tracing::warn!(
                client = %key,
                failed_attempts = record.failed_attempts,
                cycle = record.lockout_cycles,
                duration_secs = duration.as_secs(),
                "Client locked out"
            );
            metrics::record_lockout();

            return LockoutStatus {
                locked: true,
                locked_until: Some(until),
                attempts_remaining: None,
            };
        }

        LockoutStatus {
            locked: false,
            locked_until: None,
            attempts_remaining: Some(self.policy.threshold - record.failed_attempts),
        }
    }

    /// Clear all failure state for `key`. Keys with no failures stay untracked.
    pub fn record_successful_auth(&self, key: &ClientKey) {
        let now = self.clock.now();
        let Some(mut record) = self.records.get_mut(key) else {
            return;
        };
        record.failed_attempts = 0;
        record.locked_until = None;
        record.lockout_cycles = 0;
        record.last_attempt_at = now;
    }

    /// Current lockout state for `key`. Unknown keys read as clean.
    pub fn lockout_info(&self, key: &ClientKey) -> LockoutInfo {
        let now = self.clock.now();
        match self.records.get(key) {
            Some(record) => {
                let locked_until = record.active_lock(now);
                LockoutInfo {
                    locked: locked_until.is_some(),
                    locked_until,
                    failed_attempts: record.failed_attempts,
                }
            }
            None => LockoutInfo {
                locked: false,
                locked_until: None,
                failed_attempts: 0,
            },
        }
    }

    pub fn is_locked(&self, key: &ClientKey) -> bool {
        self.lockout_info(key).locked
    }

    pub fn stats(&self) -> LockoutStats {
        let now = self.clock.now();
        LockoutStats {
            total_tracked_keys: self.records.len(),
            currently_locked: self
                .records
                .iter()
                .filter(|r| r.active_lock(now).is_some())
                .count(),
        }
    }

    /// Raw record for `key`.
    pub fn get(&self, key: &ClientKey) -> Option<LockoutRecord> {
        self.records.get(key).map(|r| *r.value())
    }

    /// Drop unlocked records idle for longer than `grace`.
    ///
    /// A record is idle from its last attempt or, if it was locked, from the
    /// end of its lockout. Evicting a record forgets its escalation.
    pub fn sweep(&self, grace: Duration) -> usize {
        let now = self.clock.now();
        let before = self.records.len();
        self.records.retain(|_, r| {
            if r.active_lock(now).is_some() {
                return true;
            }
            let idle_since = r.locked_until.map_or(r.last_attempt_at, |until| until.max(r.last_attempt_at));
            now.since(idle_since) <= grace
        });
        before.saturating_sub(self.records.len())
    }
}
