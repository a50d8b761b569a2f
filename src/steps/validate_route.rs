//! Route resolution.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::pipeline::{PipelineContext, Step};
use crate::routing::{normalize_path, request_host};
use crate::store::Stores;

const UNKNOWN: &str = "unknown";

/// Resolve the route for the request path, or fail with `ProxyNotFound`.
pub struct ValidateRoute {
    stores: Arc<Stores>,
}

impl ValidateRoute {
    pub fn new(stores: Arc<Stores>) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl Step for ValidateRoute {
    fn name(&self) -> &'static str {
        "validate_route"
    }

    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), GatewayError> {
        let path = normalize_path(ctx.request.uri().path());
        let host = request_host(ctx.request.headers()).or_else(|| ctx.request.uri().host());

        let Some(route) = self.stores.paths.lookup(&path, host) else {
            ctx.metrics.tag("route_name", UNKNOWN);
            ctx.metrics.tag("route_namespace", UNKNOWN);
            ctx.span.record("route.name", UNKNOWN);
            ctx.span.record("route.namespace", UNKNOWN);
            return Err(GatewayError::ProxyNotFound(path));
        };

        ctx.span.record("route.name", route.name.as_str());
        ctx.span.record("route.namespace", route.namespace.as_str());
        ctx.metrics.tag("route_name", route.name.as_str());
        ctx.metrics.tag("route_namespace", route.namespace.as_str());
        tracing::debug!(route = %route.key(), path = %path, "Route matched");

        ctx.route = Some(route);
        Ok(())
    }
}
