//! Virtual host matching.
//!
//! # Design Decisions
//! - Host matching is case-insensitive (per HTTP spec)
//! - Port in the Host header is ignored
//! - A route without a virtual host matches any host

use axum::http::{header, HeaderMap};

/// Matches the Host header against a route's virtual host.
#[derive(Debug, Clone)]
pub struct HostMatcher {
    expected_host: Option<String>,
}

impl HostMatcher {
    /// The host is normalized to lowercase for case-insensitive matching.
    pub fn new(host: Option<&str>) -> Self {
        Self {
            expected_host: host
                .filter(|h| !h.is_empty())
                .map(|h| strip_port(h).to_lowercase()),
        }
    }

    /// True for routes bound to a specific host.
    pub fn is_specific(&self) -> bool {
        self.expected_host.is_some()
    }

    pub fn matches(&self, host: Option<&str>) -> bool {
        match &self.expected_host {
            None => true,
            Some(expected) => host
                .map(|h| strip_port(h).eq_ignore_ascii_case(expected))
                .unwrap_or(false),
        }
    }
}

/// Host of a request, from the Host header.
pub fn request_host(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::HOST).and_then(|h| h.to_str().ok())
}

fn strip_port(host: &str) -> &str {
    // IPv6 literals keep their brackets
    if host.starts_with('[') {
        return host.split_once(']').map(|(h, _)| &host[..h.len() + 1]).unwrap_or(host);
    }
    host.rsplit_once(':').map(|(h, _)| h).unwrap_or(host)
}
