//! Ordered step execution.

use std::sync::Arc;

use tracing::Instrument;

use crate::error::GatewayError;
use crate::pipeline::{PipelineContext, Step};

/// An ordered list of steps run for every request.
#[derive(Clone, Default)]
pub struct Flow {
    steps: Vec<Arc<dyn Step>>,
}

impl Flow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step; steps run in the order they are added.
    pub fn then(mut self, step: impl Step + 'static) -> Self {
        self.steps.push(Arc::new(step));
        self
    }

    pub fn push(&mut self, step: Arc<dyn Step>) {
        self.steps.push(step);
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step in order, stopping at the first error.
    ///
    /// On failure the request span is tagged as errored, the error is logged
    /// against it, and the error is returned as the step produced it.
    pub async fn play(&self, ctx: &mut PipelineContext) -> Result<(), GatewayError> {
        for step in &self.steps {
            let span = ctx.span.clone();
            if let Err(err) = step.run(ctx).instrument(span).await {
                ctx.mark_failed(&err.to_string());
                if err.status().is_server_error() {
                    tracing::error!(parent: &ctx.span, step = step.name(), error = %err, "Step failed");
                } else {
                    tracing::warn!(parent: &ctx.span, step = step.name(), error = %err, "Step failed");
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow").field("steps", &self.step_names()).finish()
    }
}
