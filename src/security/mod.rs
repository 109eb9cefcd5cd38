//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (driven by crate::admission):
//!     → lockout.rs (admin routes: refuse locked clients)
//!     → rate_limit.rs (fixed window per client key, tiered by route class)
//!     → monitor.rs (bounded event log, suspicious activity signal)
//!     → headers.rs (security headers on every response)
//!
//! Background:
//!     → sweeper.rs (evict stale rate windows and lockout records)
//! ```
//!
//! # Design Decisions
//! - All state is in memory and per process
//! - Stores never fail a request; missing identity shares one bucket

pub mod headers;
pub mod lockout;
pub mod monitor;
pub mod rate_limit;
pub mod sweeper;
