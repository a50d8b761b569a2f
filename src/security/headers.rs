//! Header manipulation for proxied traffic.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers, including those named by `Connection`
//! - Append the client IP to X-Forwarded-For
//! - Remove the client's API key before it reaches a backend
//!
//! # Design Decisions
//! - Always operate on a copy; the inbound request stays intact for plugins and logs
//! - Existing X-Forwarded-For values are kept and extended, never replaced

use std::net::IpAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

/// Headers meaningful only for a single connection.
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "proxy-connection",
];

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Remove hop-by-hop headers and every header listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in &listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Trailer names announced by a `Trailer` header.
pub fn announced_trailers(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(header::TRAILER)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect()
}

/// Append `ip` to X-Forwarded-For, comma-joined with prior values.
pub fn append_forwarded_for(headers: &mut HeaderMap, ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), ip)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Prepare a copy of the inbound headers for the upstream request.
pub fn sanitize_request_headers(
    headers: &mut HeaderMap,
    api_key_header: &str,
    client_ip: Option<IpAddr>,
) {
    strip_hop_by_hop(headers);

    if !api_key_header.is_empty() {
        headers.remove(api_key_header);
    }

    if let Some(ip) = client_ip {
        append_forwarded_for(headers, ip);
    }

    // The upstream host comes from the target URI; keep the original for the backend
    if let Some(host) = headers.remove(header::HOST) {
        headers.insert(X_FORWARDED_HOST, host);
    }

    if !headers.contains_key(header::USER_AGENT) {
        headers.insert(header::USER_AGENT, HeaderValue::from_static(""));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(
                HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut map = headers(&[
            ("connection", "keep-alive, X-Custom-Hop"),
            ("keep-alive", "timeout=5"),
            ("x-custom-hop", "1"),
            ("te", "trailers"),
            ("transfer-encoding", "chunked"),
            ("upgrade", "websocket"),
            ("proxy-connection", "keep-alive"),
            ("proxy-authorization", "Basic abc"),
            ("trailer", "x-checksum"),
            ("content-type", "text/plain"),
        ]);
        strip_hop_by_hop(&mut map);

        assert_eq!(map.len(), 1);
        assert_eq!(map.get("content-type").unwrap(), "text/plain");
    }

    #[test]
    fn test_forwarded_for_appends() {
        let mut map = headers(&[("x-forwarded-for", "10.0.0.1")]);
        append_forwarded_for(&mut map, "192.168.1.9".parse().unwrap());
        assert_eq!(map.get(X_FORWARDED_FOR).unwrap(), "10.0.0.1, 192.168.1.9");

        let mut empty = HeaderMap::new();
        append_forwarded_for(&mut empty, "::1".parse().unwrap());
        assert_eq!(empty.get(X_FORWARDED_FOR).unwrap(), "::1");
    }

    #[test]
    fn test_sanitize_request_headers() {
        let mut map = headers(&[
            ("host", "gateway.example.com"),
            ("x-api-key", "secret"),
            ("connection", "close"),
            ("accept", "*/*"),
        ]);
        sanitize_request_headers(&mut map, "x-api-key", Some("1.2.3.4".parse().unwrap()));

        assert!(map.get("x-api-key").is_none());
        assert!(map.get("connection").is_none());
        assert!(map.get("host").is_none());
        assert_eq!(map.get(X_FORWARDED_HOST).unwrap(), "gateway.example.com");
        assert_eq!(map.get(X_FORWARDED_FOR).unwrap(), "1.2.3.4");
        assert_eq!(map.get("user-agent").unwrap(), "");
        assert_eq!(map.get("accept").unwrap(), "*/*");
    }

    #[test]
    fn test_user_agent_kept() {
        let mut map = headers(&[("user-agent", "curl/8.0")]);
        sanitize_request_headers(&mut map, "x-api-key", None);
        assert_eq!(map.get("user-agent").unwrap(), "curl/8.0");
        assert!(map.get(X_FORWARDED_FOR).is_none());
    }

    #[test]
    fn test_announced_trailers() {
        let map = headers(&[("trailer", "X-Checksum, grpc-status")]);
        let names = announced_trailers(&map);
        assert_eq!(names, vec![HeaderName::from_static("x-checksum"), HeaderName::from_static("grpc-status")]);
    }
}
