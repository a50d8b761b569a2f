//! The capability every plugin implements.

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::{Request, Response};
use tracing::Span;

use crate::error::GatewayError;
use crate::observability::RequestMetrics;
use crate::resource::Route;

/// Bumped whenever `GatewayPlugin` or the hook views change shape.
pub const PLUGIN_API_VERSION: u32 = 1;

/// Which hook is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    OnRequest,
    OnResponse,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::OnRequest => "on request",
            Phase::OnResponse => "on response",
        }
    }
}

/// What an `on_request` hook may look at and change.
pub struct RequestHook<'a> {
    pub request: &'a mut Request<Body>,
    pub route: &'a Route,
    pub config: &'a BTreeMap<String, serde_json::Value>,
    pub metrics: &'a mut RequestMetrics,
    pub span: &'a Span,
}

/// What an `on_response` hook may look at and change.
pub struct ResponseHook<'a> {
    pub response: &'a mut Response<Body>,
    pub route: &'a Route,
    pub config: &'a BTreeMap<String, serde_json::Value>,
    pub metrics: &'a mut RequestMetrics,
    pub span: &'a Span,
}

/// Request and response hooks.
///
/// Returning an error stops the request with that error. Panics are caught
/// by the gateway and reported as `PluginRuntimeError`.
pub trait GatewayPlugin: Send + Sync {
    fn on_request(&self, hook: RequestHook<'_>) -> Result<(), GatewayError>;

    fn on_response(&self, hook: ResponseHook<'_>) -> Result<(), GatewayError>;
}
