//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → classifier.rs (admin / exempt / standard)
//!     → matcher.rs (evaluate prefix conditions)
//!     → Return: RouteClass, which selects the rate tier
//! ```
//!
//! # Design Decisions
//! - Classifiers compiled from config, swapped whole on reload
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same path always yields the same class

pub mod classifier;
pub mod matcher;

pub use classifier::{RouteClass, RouteClassifier};
