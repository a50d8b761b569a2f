//! Turning a finished pipeline run into the client response.
//!
//! # Design Decisions
//! - Errors are rendered once, here, as `{status_code, message, code}` JSON
//! - Metrics are published exactly once per request, success or failure

use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;
use crate::observability::MetricsSink;
use crate::pipeline::PipelineContext;

/// Close out a request: record the final status, publish metrics, build the response.
pub fn finish(
    mut ctx: PipelineContext,
    outcome: Result<(), GatewayError>,
    sink: &dyn MetricsSink,
) -> Response {
    match outcome {
        Ok(()) => {
            sink.publish(&ctx.metrics);
            ctx.into_response()
        }
        Err(err) => {
            let status = err.status();
            ctx.metrics.tag("status_code", status.as_u16());
            ctx.metrics.tag("error_code", u64::from(err.code()));
            ctx.span.record("http.status_code", status.as_u16());
            sink.publish(&ctx.metrics);

            let retryable = err.is_retryable();
            let mut response = err.into_response();
            if retryable {
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
            }
            response
        }
    }
}
