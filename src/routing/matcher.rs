//! Path matching logic.
//!
//! # Responsibilities
//! - Match a request path against a configured prefix
//! - Combine matchers with OR semantics
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Prefixes match on segment boundaries: `/admin` covers `/admin` and
//!   `/admin/users` but not `/administrator`
//! - No regex to guarantee O(n) matching

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Matches a path prefix on segment boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher. A trailing slash is ignored.
    pub fn new(prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        while prefix.len() > 1 && prefix.ends_with('/') {
            prefix.pop();
        }
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

/// Combines multiple matchers with OR semantics.
#[derive(Debug, Default)]
pub struct AnyMatcher {
    matchers: Vec<Box<dyn Matcher>>,
}

impl AnyMatcher {
    pub fn new(matchers: Vec<Box<dyn Matcher>>) -> Self {
        Self { matchers }
    }

    /// One prefix matcher per entry.
    pub fn prefixes<S: AsRef<str>>(prefixes: &[S]) -> Self {
        Self::new(
            prefixes
                .iter()
                .map(|p| Box::new(PathPrefixMatcher::new(p.as_ref())) as Box<dyn Matcher>)
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Matcher for AnyMatcher {
    fn matches(&self, path: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_matcher_respects_segments() {
        let matcher = PathPrefixMatcher::new("/admin");
        assert!(matcher.matches("/admin"));
        assert!(matcher.matches("/admin/"));
        assert!(matcher.matches("/admin/users/42"));
        assert!(!matcher.matches("/administrator"));
        assert!(!matcher.matches("/api/admin"));
        assert!(!matcher.matches("/Admin"));
    }

    #[test]
    fn test_trailing_slash_and_root() {
        assert_eq!(PathPrefixMatcher::new("/studio/").prefix(), "/studio");
        assert!(PathPrefixMatcher::new("/studio/").matches("/studio/desk"));
        assert!(PathPrefixMatcher::new("/").matches("/anything"));
    }

    #[test]
    fn test_file_like_prefix() {
        let matcher = PathPrefixMatcher::new("/favicon.ico");
        assert!(matcher.matches("/favicon.ico"));
        assert!(!matcher.matches("/favicon.icon"));
    }

    #[test]
    fn test_any_matcher() {
        let matcher = AnyMatcher::prefixes(&["/admin", "/studio"]);
        assert!(matcher.matches("/studio/structure"));
        assert!(matcher.matches("/admin"));
        assert!(!matcher.matches("/blog/post"));
        assert!(!AnyMatcher::default().matches("/admin"));
    }
}
