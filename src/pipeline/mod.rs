//! Request-processing pipeline.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → context.rs (PipelineContext: request, future response, route, metrics, span)
//!     → flow.rs (Flow::play runs each Step in order)
//!     → step.rs (one named unit of work over the context)
//!     → first error stops the flow and is returned unchanged
//! ```
//!
//! # Design Decisions
//! - One context per request, owned by the task serving it
//! - Steps never run concurrently; each sees what its predecessor left
//! - No retry and no rollback: side effects of earlier steps stay

pub mod context;
pub mod flow;
pub mod step;

pub use context::PipelineContext;
pub use flow::Flow;
pub use step::Step;
