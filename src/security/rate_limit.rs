//! Fixed-window rate limiting keyed by client.
//!
//! Each client has one counter and one reset timestamp. The counter resets
//! wholesale once the window has passed, so a client can land up to
//! `2 × max_requests` requests around a window boundary. That burst
//! tolerance is accepted behaviour.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, Timestamp};
use crate::identity::ClientKey;

/// Counter state for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateWindow {
    /// Requests admitted so far in the current window.
    pub count: u32,
    /// When the window rolls over.
    pub reset_at: Timestamp,
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Admitted { remaining: u32, reset_at: Timestamp },
    Limited { reset_at: Timestamp },
}

impl RateDecision {
    /// True when the request must be rejected.
    pub fn is_limited(&self) -> bool {
        matches!(self, RateDecision::Limited { .. })
    }

    pub fn reset_at(&self) -> Timestamp {
        match *self {
            RateDecision::Admitted { reset_at, .. } | RateDecision::Limited { reset_at } => reset_at,
        }
    }
}

/// Fixed-window limiter. The window length is fixed at construction; the
/// per-request maximum is chosen by the caller.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    windows: DashMap<ClientKey, RateWindow>,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            window,
            clock,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Count a request for `key` against `max_requests`.
    ///
    /// The read-modify-write runs under the map's per-shard entry lock, so
    /// concurrent requests from one client cannot lose updates. A rejected
    /// request does not bump the counter.
    pub fn check(&self, key: &ClientKey, max_requests: u32) -> RateDecision {
        let now = self.clock.now();
        let fresh = RateWindow {
            count: 1,
            reset_at: now.plus(self.window),
        };

        let mut entry = self.windows.entry(key.clone()).or_insert(RateWindow {
            count: 0,
            reset_at: now,
        });
        let record = entry.value_mut();

        if record.count == 0 || now > record.reset_at {
            *record = fresh;
            return RateDecision::Admitted {
                remaining: max_requests.saturating_sub(1),
                reset_at: fresh.reset_at,
            };
        }

        if record.count >= max_requests {
            tracing::debug!(client = %key, count = record.count, max_requests, "Rate limit exceeded");
            return RateDecision::Limited {
                reset_at: record.reset_at,
            };
        }

        record.count += 1;
        RateDecision::Admitted {
            remaining: max_requests - record.count,
            reset_at: record.reset_at,
        }
    }

    /// Current window for `key`, if any.
    pub fn get(&self, key: &ClientKey) -> Option<RateWindow> {
        self.windows.get(key).map(|r| *r.value())
    }

    /// Number of clients with a window record.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Drop windows that expired more than `grace` ago. Returns how many went.
    pub fn sweep(&self, grace: Duration) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows.retain(|_, w| w.reset_at.plus(grace) >= now);
        before.saturating_sub(self.windows.len())
    }
}
