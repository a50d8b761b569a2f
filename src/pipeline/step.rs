//! The unit of pipeline work.

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::pipeline::PipelineContext;

/// A named, side-effecting operation over the request context.
#[async_trait]
pub trait Step: Send + Sync {
    /// Name used in logs and span events.
    fn name(&self) -> &'static str;

    /// Do the work. An error stops the flow.
    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), GatewayError>;
}
