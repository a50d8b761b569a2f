//! Canned responses for routes with a mock target.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Response, StatusCode};

use crate::error::GatewayError;
use crate::pipeline::{PipelineContext, Step};
use crate::resource::{MockKey, MockResponse};
use crate::routing::{normalize_path, rewrite_target_path, split_query};
use crate::store::Stores;

/// When mock mode is on, answer from the mock store instead of the backend.
pub struct MockSubstitution {
    stores: Arc<Stores>,
}

impl MockSubstitution {
    pub fn new(stores: Arc<Stores>) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl Step for MockSubstitution {
    fn name(&self) -> &'static str {
        "mock_response"
    }

    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), GatewayError> {
        if !ctx.settings.mock_responses {
            return Ok(());
        }
        let Some(route) = ctx.route.clone() else {
            return Ok(());
        };
        let Some(target) = route.mock_target.as_deref().filter(|t| !t.is_empty()) else {
            return Ok(());
        };

        let (target_prefix, _) = split_query(&route.target.path);
        // Routes are stored under their normalized source path
        let source = normalize_path(&route.source.path);
        let path = rewrite_target_path(&source, target_prefix, ctx.request.uri().path());
        let key = MockKey::new(&route.namespace, target, &path, ctx.request.method().as_str());

        let Some(mock) = self.stores.mocks.get(&key) else {
            return Err(GatewayError::MockTargetNotFound {
                target: key.target,
                path: key.path,
                method: key.method,
            });
        };

        let response = build_response(&mock);
        tracing::debug!(mock_target = %key.target, path = %key.path, status = mock.status, "Serving mock response");
        ctx.metrics.tag("status_code", response.status().as_u16());
        ctx.response = Some(response);
        Ok(())
    }
}

fn build_response(mock: &MockResponse) -> Response<Body> {
    let status = StatusCode::from_u16(mock.status).unwrap_or_else(|_| {
        tracing::warn!(status = mock.status, "Mock has an invalid status, using 500");
        StatusCode::INTERNAL_SERVER_ERROR
    });

    let mut response = Response::new(Body::from(mock.body.clone()));
    *response.status_mut() = status;

    for (name, value) in &mock.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().append(name, value);
            }
            _ => tracing::warn!(header = %name, "Skipping invalid mock header"),
        }
    }
    response
}
