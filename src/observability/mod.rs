//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline steps produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (per-request accumulator: name/value/indexed triples)
//!     → tracing.rs (W3C trace context carried to upstreams)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics sink (Prometheus scrape endpoint)
//!     → Distributed tracing (traceparent header on upstream calls)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - The accumulator is task-local; it is flushed once per request
//! - Indexed metrics become labels, the rest become samples

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::logging::init_logging;
pub use self::metrics::{init_metrics, Metric, MetricValue, MetricsSink, PrometheusSink, RequestMetrics};
pub use self::tracing::TraceContext;
