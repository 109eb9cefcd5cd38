//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the guard.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the admission guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Origin server that admitted requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Fixed-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Progressive lockout for failed authentication.
    pub lockout: LockoutConfig,

    /// Security event log and anomaly detection.
    pub monitor: MonitorConfig,

    /// Path prefixes used to classify requests.
    pub routes: RoutesConfig,

    /// Response security headers.
    pub headers: HeadersConfig,

    /// Periodic eviction of stale records.
    pub maintenance: MaintenanceConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Introspection API.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Upstream origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Origin address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Fixed window length in seconds. Not hot-reloadable.
    pub window_secs: u64,

    /// Requests per window per client on standard routes.
    pub max_requests: u32,

    /// Requests per window per client on administrative routes.
    pub admin_max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 15 * 60,
            max_requests: 100,
            admin_max_requests: 20,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Lockout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LockoutConfig {
    /// Failed attempts that trigger a lockout.
    pub threshold: u32,

    /// Length of the first lockout in seconds.
    pub base_duration_secs: u64,

    /// Growth factor applied to each further lockout.
    pub multiplier: u32,

    /// Upper bound on a single lockout in seconds.
    pub max_duration_secs: u64,

    /// Reset escalation after this many idle seconds between failures.
    /// `None` means only a successful authentication resets it.
    pub escalation_reset_idle_secs: Option<u64>,

    /// Reject administrative requests from locked clients with 423.
    pub enforce_on_admin: bool,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            base_duration_secs: 15 * 60,
            multiplier: 2,
            max_duration_secs: 24 * 60 * 60,
            escalation_reset_idle_secs: None,
            enforce_on_admin: true,
        }
    }
}

impl LockoutConfig {
    pub fn base_duration(&self) -> Duration {
        Duration::from_secs(self.base_duration_secs)
    }

    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }

    pub fn escalation_reset_idle(&self) -> Option<Duration> {
        self.escalation_reset_idle_secs.map(Duration::from_secs)
    }
}

/// Security event monitor configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    /// Maximum events retained.
    pub capacity: usize,

    /// Trailing window for the per-client density check, in seconds.
    pub suspicious_window_secs: u64,

    /// Events per client within the window above which an anomaly is raised.
    pub suspicious_threshold: usize,

    /// Case-insensitive user agent fragments flagged as suspicious.
    pub suspicious_user_agents: Vec<String>,

    /// Treat a missing user agent as suspicious.
    pub flag_empty_user_agent: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            capacity: 1000,
            suspicious_window_secs: 5 * 60,
            suspicious_threshold: 20,
            suspicious_user_agents: [
                "sqlmap", "nikto", "nmap", "masscan", "zgrab", "nuclei", "dirbuster", "gobuster",
                "wpscan", "curl", "wget", "python-requests", "go-http-client",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            flag_empty_user_agent: true,
        }
    }
}

impl MonitorConfig {
    pub fn suspicious_window(&self) -> Duration {
        Duration::from_secs(self.suspicious_window_secs)
    }
}

/// Route classification prefixes.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RoutesConfig {
    /// Administrative UI and API prefixes (strict rate tier).
    pub admin_prefixes: Vec<String>,

    /// Prefixes never rate limited (static assets).
    pub exempt_prefixes: Vec<String>,

    /// Path of the lockout probe endpoint.
    pub lockout_path: String,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            admin_prefixes: vec!["/admin".to_string(), "/studio".to_string()],
            exempt_prefixes: vec![
                "/_next/static".to_string(),
                "/_next/image".to_string(),
                "/favicon.ico".to_string(),
                "/images".to_string(),
            ],
            lockout_path: "/api/auth/lockout".to_string(),
        }
    }
}

/// Content-Security-Policy allow-list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HeadersConfig {
    pub default_src: Vec<String>,
    pub script_src: Vec<String>,
    pub style_src: Vec<String>,
    pub font_src: Vec<String>,
    pub img_src: Vec<String>,
    pub connect_src: Vec<String>,
    pub frame_src: Vec<String>,
}

fn sources(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            default_src: sources(&["'self'"]),
            script_src: sources(&[
                "'self'",
                "'unsafe-inline'",
                "https://www.googletagmanager.com",
                "https://www.google-analytics.com",
                "https://pagead2.googlesyndication.com",
            ]),
            style_src: sources(&["'self'", "'unsafe-inline'", "https://fonts.googleapis.com"]),
            font_src: sources(&["'self'", "https://fonts.gstatic.com"]),
            img_src: sources(&["'self'", "data:", "blob:", "https://cdn.sanity.io"]),
            connect_src: sources(&[
                "'self'",
                "https://*.sanity.io",
                "https://www.google-analytics.com",
            ]),
            frame_src: sources(&["'self'", "https://googleads.g.doubleclick.net"]),
        }
    }
}

/// Maintenance sweep configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MaintenanceConfig {
    /// Enable the background sweeper.
    pub enabled: bool,

    /// Sweep interval in seconds.
    pub sweep_interval_secs: u64,

    /// How long an expired record is kept before eviction, in seconds.
    pub grace_secs: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep_interval_secs: 60,
            grace_secs: 15 * 60,
        }
    }
}

impl MaintenanceConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Introspection API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the `/_guard` API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
