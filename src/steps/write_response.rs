//! Hands the final response to the client.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderValue, Response};
use http_body_util::BodyExt;

use crate::error::GatewayError;
use crate::pipeline::{PipelineContext, Step};

/// Copy status and headers into the client response and stream the body.
pub struct WriteResponse;

#[async_trait]
impl Step for WriteResponse {
    fn name(&self) -> &'static str {
        "write_response"
    }

    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), GatewayError> {
        let upstream = ctx
            .response
            .take()
            .ok_or_else(|| GatewayError::BadGateway("no response to write".to_string()))?;
        let (parts, body) = upstream.into_parts();

        let mut output = Response::new(Body::empty());
        *output.status_mut() = parts.status;
        for (name, value) in parts.headers.iter() {
            output.headers_mut().append(name.clone(), value.clone());
        }

        if !ctx.announced_trailers.is_empty() {
            let names: Vec<&str> = ctx.announced_trailers.iter().map(|n| n.as_str()).collect();
            if let Ok(value) = HeaderValue::from_str(&names.join(", ")) {
                output.headers_mut().insert(header::TRAILER, value);
            }
        }

        let status = parts.status.as_u16();
        ctx.metrics.tag("status_code", status);
        ctx.span.record("http.status_code", status);
        if parts.status.is_server_error() {
            ctx.span.record("otel.status_code", "ERROR");
        }

        // Errors mid-stream can only be logged; the status line is already out
        let span = ctx.span.clone();
        let body = body.map_err(move |err| {
            tracing::warn!(parent: &span, error = %err, "Response body stream failed");
            err
        });
        *output.body_mut() = Body::new(body);

        ctx.output = Some(output);
        Ok(())
    }
}
