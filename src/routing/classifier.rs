//! Route classification for admission.

use serde::Serialize;
use std::fmt;

use crate::config::RoutesConfig;
use crate::routing::matcher::{AnyMatcher, Matcher};

/// Admission class of a request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    /// Administrative UI or API: strict rate tier, observed, lockout enforced.
    Admin,
    /// Everything else that reaches the origin: default rate tier.
    Standard,
    /// Static assets: never rate limited.
    Exempt,
}

impl RouteClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Standard => "standard",
            Self::Exempt => "exempt",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiled prefix sets. Admin prefixes win over exempt ones.
#[derive(Debug)]
pub struct RouteClassifier {
    admin: AnyMatcher,
    exempt: AnyMatcher,
}

impl RouteClassifier {
    pub fn from_config(config: &RoutesConfig) -> Self {
        Self {
            admin: AnyMatcher::prefixes(&config.admin_prefixes),
            exempt: AnyMatcher::prefixes(&config.exempt_prefixes),
        }
    }

    pub fn classify(&self, path: &str) -> RouteClass {
        if self.admin.matches(path) {
            RouteClass::Admin
        } else if self.exempt.matches(path) {
            RouteClass::Exempt
        } else {
            RouteClass::Standard
        }
    }
}
