//! Forwarding to the backend.
//!
//! # Data Flow
//! ```text
//! ctx.route
//!     → target.rs (endpoint URL | static service | dynamic selector → authority)
//!     → routing::rewrite_target_path + query merge
//!     → security::headers (sanitized copy of inbound headers)
//!     → tls.rs (client certificate and verification policy from the route's secret)
//!     → client.rs (send, bounded by the upstream timeout)
//!     → ctx.response (hop-by-hop headers stripped)
//! ```

pub mod client;
pub mod target;
pub mod tls;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::uri::{Authority, PathAndQuery};
use axum::http::{Request, Uri};
use tracing::field::Empty;
use tracing::Instrument;

pub use client::{HyperUpstream, UpstreamClient};
pub use target::{build_selector, resolve_target, UpstreamTarget};
pub use tls::{client_config_from_secret, TlsConfigCache, TlsPolicy};

use crate::error::GatewayError;
use crate::pipeline::{PipelineContext, Step};
use crate::resource::{Backend, Route};
use crate::routing::{normalize_path, rewrite_target_path, split_query};
use crate::security::{announced_trailers, sanitize_request_headers, strip_hop_by_hop};
use crate::store::Stores;

/// Proxy the request to the route's backend.
///
/// Does nothing when an earlier step already produced a response.
pub struct UpstreamProxy {
    stores: Arc<Stores>,
    client: Arc<dyn UpstreamClient>,
    tls: TlsConfigCache,
}

impl UpstreamProxy {
    pub fn new(stores: Arc<Stores>, client: Arc<dyn UpstreamClient>) -> Self {
        Self {
            stores,
            client,
            tls: TlsConfigCache::new(),
        }
    }
}

#[async_trait]
impl Step for UpstreamProxy {
    fn name(&self) -> &'static str {
        "upstream"
    }

    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), GatewayError> {
        if ctx.response.is_some() {
            return Ok(());
        }
        let route = ctx
            .route
            .clone()
            .ok_or_else(|| GatewayError::ProxyNotFound(ctx.request.uri().path().to_string()))?;
        let settings = ctx.settings.clone();

        let target = resolve_target(
            &route,
            ctx.request.headers(),
            &self.stores.services,
            settings.cluster_ip_routing,
        )?;

        let (target_prefix, target_query) = split_query(&route.target.path);
        // Routes are stored under their normalized source path
        let source = normalize_path(&route.source.path);
        let path = rewrite_target_path(&source, target_prefix, ctx.request.uri().path());
        let path_and_query = match merge_queries(&[
            ctx.request.uri().query(),
            target_query,
            target.query.as_deref(),
        ]) {
            Some(query) => format!("{}?{}", path, query),
            None => path.clone(),
        };

        let authority = Authority::try_from(target.authority.as_str())
            .map_err(|e| address_error(&route, "authority", &target.authority, e))?;
        let path_and_query = PathAndQuery::try_from(path_and_query.as_str())
            .map_err(|e| address_error(&route, "path", &path_and_query, e))?;
        let uri = Uri::builder()
            .scheme(target.scheme.clone())
            .authority(authority)
            .path_and_query(path_and_query)
            .build()
            .map_err(|e| address_error(&route, "uri", &target.authority, e))?;

        let mut headers = ctx.request.headers().clone();
        sanitize_request_headers(
            &mut headers,
            &settings.api_key_header,
            ctx.client_addr.map(|addr| addr.ip()),
        );

        let tls = self.tls.policy_for(&route, &self.stores.secrets)?;

        let trace = ctx.trace.child();
        trace.inject(&mut headers);

        let method = ctx.request.method().clone();
        let span = tracing::info_span!(
            parent: &ctx.span,
            "upstream",
            otel.name = %format!("{} {}", method, path),
            otel.kind = "client",
            http.url = %uri,
            span_id = %trace.span_id_hex(),
            http.status_code = Empty,
            otel.status_code = Empty,
        );

        let body = std::mem::take(ctx.request.body_mut());
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .body(body)
            .map_err(|e| GatewayError::Other(Box::new(e)))?;
        *request.headers_mut() = headers;

        let timeout_secs = settings.upstream_timeout_secs;
        let started = Instant::now();
        let result = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            self.client.send(request, tls),
        )
        .instrument(span.clone())
        .await;
        ctx.metrics.add(
            "upstream_duration_ms",
            started.elapsed().as_secs_f64() * 1000.0,
            false,
        );

        let mut response = match result {
            Err(_) => {
                span.record("otel.status_code", "ERROR");
                return Err(GatewayError::DeadlineExceeded(timeout_secs));
            }
            Ok(Err(err)) => {
                span.record("otel.status_code", "ERROR");
                return Err(err);
            }
            Ok(Ok(response)) => response,
        };

        span.record("http.status_code", response.status().as_u16());
        if response.status().is_server_error() {
            span.record("otel.status_code", "ERROR");
        }

        ctx.announced_trailers = announced_trailers(response.headers());
        strip_hop_by_hop(response.headers_mut());
        ctx.response = Some(response);
        Ok(())
    }
}

/// Error for an upstream URI part that does not parse, naming the part.
fn address_error(route: &Route, part: &str, value: &str, err: impl std::fmt::Display) -> GatewayError {
    match &route.target.backend {
        Backend::Endpoint { url } => GatewayError::BackendMalformed {
            url: url.clone(),
            reason: format!("invalid upstream {} '{}': {}", part, value, err),
        },
        _ => GatewayError::ServiceLookup(format!(
            "invalid upstream {} '{}' for route {}: {}",
            part,
            value,
            route.key(),
            err
        )),
    }
}

/// Join non-empty query strings with `&`, in order.
fn merge_queries(parts: &[Option<&str>]) -> Option<String> {
    let parts: Vec<&str> = parts
        .iter()
        .flatten()
        .copied()
        .filter(|q| !q.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("&"))
    }
}
