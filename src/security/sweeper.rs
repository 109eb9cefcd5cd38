//! Periodic eviction of stale rate-limit and lockout records.
//!
//! Both tables are keyed by client and would otherwise grow with every
//! distinct client seen. The sweeper runs on a fixed interval until the
//! shutdown signal fires.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::admission::Admission;
use crate::config::MaintenanceConfig;
use crate::observability::metrics;

/// Counts of records removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub rate_windows: usize,
    pub lockouts: usize,
}

/// Run one sweep over the admission stores.
pub fn sweep_once(admission: &Admission, grace: Duration) -> SweepReport {
    let report = SweepReport {
        rate_windows: admission.limiter().sweep(grace),
        lockouts: admission.lockouts().sweep(grace),
    };

    metrics::record_swept("rate_limit", report.rate_windows);
    metrics::record_swept("lockout", report.lockouts);
    metrics::set_tracked_clients("rate_limit", admission.limiter().tracked_keys());
    metrics::set_tracked_clients("lockout", admission.lockouts().stats().total_tracked_keys);

    if report.rate_windows > 0 || report.lockouts > 0 {
        tracing::debug!(
            rate_windows = report.rate_windows,
            lockouts = report.lockouts,
            "Swept stale records"
        );
    }
    report
}

pub struct Sweeper {
    admission: Arc<Admission>,
    config: MaintenanceConfig,
}

impl Sweeper {
    pub fn new(admission: Arc<Admission>, config: MaintenanceConfig) -> Self {
        Self { admission, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Maintenance sweeper disabled");
            return;
        }

        tracing::info!(
            interval_secs = self.config.sweep_interval_secs,
            grace_secs = self.config.grace_secs,
            "Maintenance sweeper starting"
        );

        let mut ticker = time::interval(self.config.sweep_interval());
        // The first tick completes immediately; skip it.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    sweep_once(&self.admission, self.config.grace());
                }
                _ = shutdown.recv() => {
                    tracing::info!("Sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
