//! Security response headers.
//!
//! # Responsibilities
//! - Build the Content-Security-Policy from the configured allow-list
//! - Apply the fixed security header set to every outgoing response
//! - Add cache suppression and an access marker on administrative routes
//!
//! # Design Decisions
//! - Header values are rendered once per policy load, not per request
//! - Headers are inserted (overwriting upstream values), never appended

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

use crate::config::HeadersConfig;

pub const X_ADMIN_ACCESS: HeaderName = HeaderName::from_static("x-admin-access");
pub const X_XSS_PROTECTION: HeaderName = HeaderName::from_static("x-xss-protection");
pub const PERMISSIONS_POLICY: HeaderName = HeaderName::from_static("permissions-policy");

const NO_STORE: &str = "no-store, no-cache, must-revalidate";

/// Pre-rendered security headers.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    standard: Vec<(HeaderName, HeaderValue)>,
    csp: String,
}

impl SecurityHeaders {
    pub fn from_config(config: &HeadersConfig) -> Self {
        let csp = build_csp(config);
        let mut standard = vec![
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
            (X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block")),
            (
                header::REFERRER_POLICY,
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ),
            (
                PERMISSIONS_POLICY,
                HeaderValue::from_static("camera=(), microphone=(), geolocation=()"),
            ),
        ];
        match HeaderValue::from_str(&csp) {
            Ok(value) => standard.push((header::CONTENT_SECURITY_POLICY, value)),
            Err(_) => {
                tracing::error!(csp = %csp, "Content-Security-Policy contains invalid characters, header skipped");
            }
        }
        Self { standard, csp }
    }

    /// The rendered Content-Security-Policy value.
    pub fn csp(&self) -> &str {
        &self.csp
    }

    /// Apply the standard set, plus the admin extras when `admin` is set.
    pub fn apply(&self, headers: &mut HeaderMap, admin: bool) {
        for (name, value) in &self.standard {
            headers.insert(name.clone(), value.clone());
        }
        if admin {
            headers.insert(X_ADMIN_ACCESS, HeaderValue::from_static("true"));
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
        }
    }
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        Self::from_config(&HeadersConfig::default())
    }
}

/// Render the CSP as a single line with collapsed whitespace.
pub fn build_csp(config: &HeadersConfig) -> String {
    let directives = [
        ("default-src", &config.default_src),
        ("script-src", &config.script_src),
        ("style-src", &config.style_src),
        ("font-src", &config.font_src),
        ("img-src", &config.img_src),
        ("connect-src", &config.connect_src),
        ("frame-src", &config.frame_src),
    ];

    let raw = directives
        .iter()
        .filter(|(_, sources)| !sources.is_empty())
        .map(|(name, sources)| format!("{} {};", name, sources.join(" ")))
        .collect::<Vec<_>>()
        .join(" ");

    collapse_whitespace(&raw)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
