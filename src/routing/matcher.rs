//! Host and path matching logic.
//!
//! # Responsibilities
//! - Match request host (exact match, case-insensitive, `*.` wildcard)
//! - Match path prefix (case-sensitive)
//!
//! # Design Decisions
//! - Host matching is case-insensitive (per HTTP spec)
//! - `*.example.com` matches any single-or-deeper subdomain, not the apex
//! - Path matching is case-sensitive, on whole segments so `/app` does not
//!   swallow `/application`
//! - No regex to guarantee O(n) matching

/// Matches a request host against one configured virtual host.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    pattern: String,
}

impl HostMatcher {
    /// Create a new host matcher.
    /// The pattern is normalized to lowercase for case-insensitive matching.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into().to_lowercase(),
        }
    }

    /// Returns true if `host` (without port) matches this pattern.
    pub fn matches(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        if let Some(suffix) = self.pattern.strip_prefix("*.") {
            host.len() > suffix.len()
                && host.ends_with(suffix)
                && host.as_bytes()[host.len() - suffix.len() - 1] == b'.'
        } else {
            host == self.pattern
        }
    }
}

/// Matches a request path against a configured prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns true if `path` is the prefix itself or a sub-path of it.
    pub fn matches(&self, path: &str) -> bool {
        if self.prefix == "/" {
            return path.starts_with('/');
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with('/'),
            None => false,
        }
    }

    /// Length of the prefix, used for longest-prefix selection.
    pub fn len(&self) -> usize {
        self.prefix.len()
    }

    /// Returns true if the prefix is empty.
    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty()
    }
}

/// Strip the host's port component, if present. IPv6 literals keep their
/// brackets: `[::1]:8080` and `[::1]` both yield `[::1]`.
pub fn host_without_port(host: &str) -> &str {
    if host.starts_with('[') {
        match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        }
    } else {
        host.rsplit_once(':').map(|(name, _)| name).unwrap_or(host)
    }
}
