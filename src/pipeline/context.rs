//! Per-request state threaded through every step.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderName, Request, Response, StatusCode};
use axum::response::IntoResponse;
use tracing::field::Empty;
use tracing::Span;

use crate::config::ProxySettings;
use crate::http::request_id;
use crate::observability::{RequestMetrics, TraceContext};
use crate::resource::Route;

/// Mutable state for one request.
///
/// Exactly one exists per request and it never leaves the task serving it.
pub struct PipelineContext {
    /// The inbound request. The upstream step takes its body.
    pub request: Request<Body>,

    /// Response from the upstream or the mock store, once known.
    pub response: Option<Response<Body>>,

    /// Response handed back to the client, set by the write step.
    pub output: Option<Response<Body>>,

    /// Route resolved for this request.
    pub route: Option<Arc<Route>>,

    pub metrics: RequestMetrics,

    /// Root span of the request.
    pub span: Span,

    pub trace: TraceContext,

    /// Peer address of the client connection.
    pub client_addr: Option<SocketAddr>,

    /// Settings snapshot taken when the request arrived.
    pub settings: Arc<ProxySettings>,

    /// Trailer names the upstream announced before hop-by-hop stripping.
    pub announced_trailers: Vec<HeaderName>,
}

impl PipelineContext {
    pub fn new(request: Request<Body>, settings: Arc<ProxySettings>) -> Self {
        let trace = TraceContext::from_headers(request.headers());
        let request_id = request_id(request.headers()).unwrap_or("unknown");

        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
            trace_id = %trace.trace_id_hex(),
            route.name = Empty,
            route.namespace = Empty,
            http.status_code = Empty,
            error = Empty,
            otel.status_code = Empty,
        );

        Self {
            request,
            response: None,
            output: None,
            route: None,
            metrics: RequestMetrics::new(),
            span,
            trace,
            client_addr: None,
            settings,
            announced_trailers: Vec::new(),
        }
    }

    pub fn with_client_addr(mut self, addr: SocketAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }

    /// The resolved route. Steps after route validation rely on it.
    pub fn route(&self) -> Option<&Arc<Route>> {
        self.route.as_ref()
    }

    /// Mark the root span as failed.
    pub fn mark_failed(&self, message: &str) {
        self.span.record("error", true);
        self.span.record("otel.status_code", "ERROR");
        tracing::debug!(parent: &self.span, error.message = %message, "Request marked failed");
    }

    /// Response for the client after a successful flow.
    pub fn into_response(self) -> Response<Body> {
        let span = self.span;
        match (self.output, self.response) {
            (Some(out), _) => out,
            (None, Some(resp)) => resp,
            (None, None) => {
                tracing::error!(parent: &span, "Pipeline finished without a response");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
