//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → shared with the admission layer and server
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → sent to the server, which swaps the admission policy
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Store sizing and window length are fixed at startup; reloads only
//!   replace policy (tiers, prefixes, headers, user agent patterns)

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, GuardConfig, HeadersConfig, ListenerConfig, LockoutConfig, LogFormat,
    MaintenanceConfig, MonitorConfig, ObservabilityConfig, RateLimitConfig, RoutesConfig,
    TimeoutConfig, UpstreamConfig,
};
pub use validation::ValidationError;
