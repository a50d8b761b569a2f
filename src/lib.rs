//! API gateway request pipeline.
//!
//! Routes inbound HTTP requests by path prefix to an external endpoint, a
//! named cluster service, or a label-selected service, running route-scoped
//! plugins around the upstream call.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pipeline;
pub mod plugins;
pub mod resource;
pub mod routing;
pub mod security;
pub mod steps;
pub mod store;

pub use config::GatewayConfig;
pub use error::{GatewayError, GatewayResult};
pub use lifecycle::{Gateway, Shutdown};
