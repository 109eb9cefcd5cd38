//! Client identity resolution.
//!
//! # Responsibilities
//! - Derive a client key from proxy address headers
//! - Extract the user agent string
//!
//! # Design Decisions
//! - First value of `X-Forwarded-For` wins, then alternate proxy headers
//! - Never fails: missing or garbled headers resolve to `"unknown"`
//! - Clients behind one shared proxy collapse into one bucket

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key used when no address header is usable.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Address headers consulted after `X-Forwarded-For`, in order.
const FALLBACK_ADDRESS_HEADERS: [&str; 3] = ["x-real-ip", "cf-connecting-ip", "true-client-ip"];

/// Bucket identifier for rate-limit and lockout state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientKey(String);

impl ClientKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_CLIENT.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_CLIENT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

/// Who sent a request, as far as headers can tell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub key: ClientKey,
    pub user_agent: String,
}

/// Resolve the client key and user agent from request headers.
pub fn resolve(headers: &HeaderMap) -> ClientIdentity {
    ClientIdentity {
        key: client_key(headers),
        user_agent: user_agent(headers),
    }
}

/// Client key from `X-Forwarded-For` or the fallback proxy headers.
pub fn client_key(headers: &HeaderMap) -> ClientKey {
    let forwarded = header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or_else(|| {
            FALLBACK_ADDRESS_HEADERS
                .iter()
                .filter_map(|name| header_str(headers, name))
                .map(str::trim)
                .find(|v| !v.is_empty())
        })
        .map(ClientKey::new)
        .unwrap_or_else(ClientKey::unknown)
}

/// `User-Agent` header, or an empty string.
pub fn user_agent(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_first_forwarded_for_value_wins() {
        let h = headers(&[
            ("x-forwarded-for", " 1.2.3.4 , 10.0.0.1, 10.0.0.2"),
            ("x-real-ip", "9.9.9.9"),
        ]);
        assert_eq!(client_key(&h).as_str(), "1.2.3.4");
    }

    #[test]
    fn test_falls_back_through_proxy_headers() {
        let h = headers(&[("x-forwarded-for", " , "), ("cf-connecting-ip", "5.6.7.8")]);
        assert_eq!(client_key(&h).as_str(), "5.6.7.8");

        let h = headers(&[("x-real-ip", ""), ("true-client-ip", "8.8.4.4")]);
        assert_eq!(client_key(&h).as_str(), "8.8.4.4");
    }

    #[test]
    fn test_missing_headers_resolve_to_unknown() {
        let identity = resolve(&HeaderMap::new());
        assert!(identity.key.is_unknown());
        assert_eq!(identity.key.as_str(), UNKNOWN_CLIENT);
        assert_eq!(identity.user_agent, "");
    }

    #[test]
    fn test_non_utf8_header_is_skipped() {
        let mut h = HeaderMap::new();
        h.insert("x-forwarded-for", HeaderValue::from_bytes(b"\xff\xfe").unwrap());
        h.insert("x-real-ip", HeaderValue::from_static("4.4.4.4"));
        assert_eq!(client_key(&h).as_str(), "4.4.4.4");
    }

    #[test]
    fn test_user_agent_extracted() {
        let h = headers(&[("user-agent", "Mozilla/5.0")]);
        assert_eq!(resolve(&h).user_agent, "Mozilla/5.0");
    }
}
