//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows > 0, tiers ordered, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GuardConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::GuardConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} is not a valid socket address: {value}")]
    BadAddress { field: &'static str, value: String },

    #[error("upstream.address is not a valid origin: {0}")]
    BadUpstream(String),

    #[error("rate_limit.admin_max_requests ({admin}) exceeds rate_limit.max_requests ({standard})")]
    AdminTierLooser { admin: u32, standard: u32 },

    #[error("lockout.max_duration_secs ({max}) is shorter than lockout.base_duration_secs ({base})")]
    LockoutCapBelowBase { base: u64, max: u64 },

    #[error("{field} entry {value:?} must start with '/'")]
    BadPrefix { field: &'static str, value: String },
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if config.observability.metrics_enabled {
        check_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    let upstream_ok = url::Url::parse(&format!("http://{}", config.upstream.address))
        .ok()
        .filter(|u| u.host_str().is_some() && u.path() == "/")
        .is_some();
    if !upstream_ok {
        errors.push(ValidationError::BadUpstream(config.upstream.address.clone()));
    }

    let rl = &config.rate_limit;
    check_nonzero(&mut errors, "rate_limit.window_secs", rl.window_secs);
    check_nonzero(&mut errors, "rate_limit.max_requests", rl.max_requests.into());
    check_nonzero(&mut errors, "rate_limit.admin_max_requests", rl.admin_max_requests.into());
    if rl.admin_max_requests > rl.max_requests {
        errors.push(ValidationError::AdminTierLooser {
            admin: rl.admin_max_requests,
            standard: rl.max_requests,
        });
    }

    let lo = &config.lockout;
    check_nonzero(&mut errors, "lockout.threshold", lo.threshold.into());
    check_nonzero(&mut errors, "lockout.base_duration_secs", lo.base_duration_secs);
    check_nonzero(&mut errors, "lockout.multiplier", lo.multiplier.into());
    if lo.max_duration_secs < lo.base_duration_secs {
        errors.push(ValidationError::LockoutCapBelowBase {
            base: lo.base_duration_secs,
            max: lo.max_duration_secs,
        });
    }
    if let Some(idle) = lo.escalation_reset_idle_secs {
        check_nonzero(&mut errors, "lockout.escalation_reset_idle_secs", idle);
    }

    let mon = &config.monitor;
    check_nonzero(&mut errors, "monitor.capacity", mon.capacity as u64);
    check_nonzero(&mut errors, "monitor.suspicious_window_secs", mon.suspicious_window_secs);

    check_nonzero(&mut errors, "timeouts.request_secs", config.timeouts.request_secs);
    if config.maintenance.enabled {
        check_nonzero(
            &mut errors,
            "maintenance.sweep_interval_secs",
            config.maintenance.sweep_interval_secs,
        );
    }

    check_prefixes(&mut errors, "routes.admin_prefixes", &config.routes.admin_prefixes);
    check_prefixes(&mut errors, "routes.exempt_prefixes", &config.routes.exempt_prefixes);
    check_prefixes(
        &mut errors,
        "routes.lockout_path",
        std::slice::from_ref(&config.routes.lockout_path),
    );

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_nonzero(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::Zero { field });
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_prefixes(errors: &mut Vec<ValidationError>, field: &'static str, prefixes: &[String]) {
    for prefix in prefixes {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::BadPrefix {
                field,
                value: prefix.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&GuardConfig::default()), Ok(()));
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = GuardConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.rate_limit.window_secs = 0;
        config.rate_limit.admin_max_requests = 500;
        config.lockout.max_duration_secs = 10;
        config.routes.admin_prefixes.push("admin".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5, "{errors:?}");
        assert!(errors.contains(&ValidationError::Zero { field: "rate_limit.window_secs" }));
        assert!(errors.contains(&ValidationError::AdminTierLooser { admin: 500, standard: 100 }));
        assert!(errors.contains(&ValidationError::BadPrefix {
            field: "routes.admin_prefixes",
            value: "admin".into(),
        }));
    }

    #[test]
    fn test_upstream_must_be_host_and_port() {
        let mut config = GuardConfig::default();
        config.upstream.address = "origin.internal:3000/path".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors.as_slice(), [ValidationError::BadUpstream(_)]));

        config.upstream.address = "origin.internal:3000".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_metrics_address_ignored_when_disabled() {
        let mut config = GuardConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_err());
        config.observability.metrics_enabled = false;
        assert!(validate_config(&config).is_ok());
    }
}
