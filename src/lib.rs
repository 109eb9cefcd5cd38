//! Request admission and abuse mitigation for a web application.
//!
//! Sits in front of an upstream app: resolves client identity, applies tiered
//! fixed-window rate limits, refuses locked-out clients on administrative
//! routes, records security events and stamps security headers.

pub mod admin;
pub mod admission;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod identity;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;

pub use admission::{Admission, Outcome, Verdict};
pub use config::schema::GuardConfig;
pub use error::GuardError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
