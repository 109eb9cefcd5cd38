//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! admission, stores, sweeper, server:
//!     → logging.rs (tracing subscriber, pretty or JSON)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout / log aggregation
//!     → Prometheus scrape on observability.metrics_address
//! ```

pub mod logging;
pub mod metrics;
