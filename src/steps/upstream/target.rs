//! Backend resolution: which host the request goes to.

use std::collections::BTreeMap;
use std::net::Ipv6Addr;

use axum::http::uri::Scheme;
use axum::http::HeaderMap;
use url::Url;

use crate::error::GatewayError;
use crate::resource::{Backend, LabelValue, Route, Service};
use crate::store::ServiceStore;

/// Where the upstream request is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    pub scheme: Scheme,
    /// `host[:port]`
    pub authority: String,
    /// Query carried by an endpoint URL.
    pub query: Option<String>,
}

/// Resolve the route's backend to a concrete authority.
///
/// A route with a TLS secret always speaks https.
pub fn resolve_target(
    route: &Route,
    headers: &HeaderMap,
    services: &ServiceStore,
    cluster_ip_routing: bool,
) -> Result<UpstreamTarget, GatewayError> {
    let wants_tls = route
        .target
        .tls_secret
        .as_deref()
        .is_some_and(|s| !s.is_empty());
    let service_scheme = if wants_tls { Scheme::HTTPS } else { Scheme::HTTP };

    match &route.target.backend {
        Backend::Endpoint { url } => endpoint_target(url, wants_tls),
        Backend::Service { name, port } => {
            let service = services.get(&route.namespace, name).ok_or_else(|| {
                GatewayError::NoMatchingServices(format!("service {}/{}", route.namespace, name))
            })?;
            Ok(UpstreamTarget {
                scheme: service_scheme,
                authority: format!("{}:{}", service_host(&service, cluster_ip_routing), port),
                query: None,
            })
        }
        Backend::Dynamic { labels, port } => {
            let selector = build_selector(labels, headers);
            let matched = services.list(&route.namespace, &selector);
            let Some(first) = matched.first() else {
                return Err(GatewayError::NoMatchingServices(format!(
                    "selector {:?} in namespace {}",
                    selector, route.namespace
                )));
            };
            if matched.len() > 1 {
                tracing::warn!(
                    count = matched.len(),
                    chosen = %first.key(),
                    "Multiple services match selector, using the first"
                );
            }
            Ok(UpstreamTarget {
                scheme: service_scheme,
                authority: format!("{}:{}", service_host(first, cluster_ip_routing), port),
                query: None,
            })
        }
    }
}

fn endpoint_target(url: &str, wants_tls: bool) -> Result<UpstreamTarget, GatewayError> {
    let malformed = |reason: String| GatewayError::BackendMalformed {
        url: url.to_string(),
        reason,
    };

    let parsed = Url::parse(url).map_err(|e| malformed(e.to_string()))?;
    let scheme = match parsed.scheme() {
        _ if wants_tls => Scheme::HTTPS,
        "http" => Scheme::HTTP,
        "https" => Scheme::HTTPS,
        other => return Err(malformed(format!("unsupported scheme {}", other))),
    };
    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| malformed("missing host".to_string()))?;

    let authority = match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    Ok(UpstreamTarget {
        scheme,
        authority,
        query: parsed.query().filter(|q| !q.is_empty()).map(str::to_string),
    })
}

/// Selector values, literal or taken from request headers.
///
/// A missing header selects on the empty string.
pub fn build_selector(
    labels: &BTreeMap<String, LabelValue>,
    headers: &HeaderMap,
) -> BTreeMap<String, String> {
    labels
        .iter()
        .map(|(key, value)| {
            let value = match value {
                LabelValue::Literal(v) => v.clone(),
                LabelValue::Header { header } => headers
                    .get(header.as_str())
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

fn service_host(service: &Service, cluster_ip_routing: bool) -> String {
    if cluster_ip_routing {
        let ip = service
            .cluster_ip
            .as_deref()
            .filter(|ip| !ip.is_empty() && *ip != "None");
        match ip {
            Some(ip) if ip.parse::<Ipv6Addr>().is_ok() => return format!("[{}]", ip),
            Some(ip) => return ip.to_string(),
            None => tracing::debug!(service = %service.key(), "Service has no cluster IP, using DNS name"),
        }
    }
    service.dns_name()
}
