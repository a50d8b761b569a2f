//! The gateway's request steps.
//!
//! # Data Flow
//! ```text
//! validate_route.rs   (PathStore lookup → ctx.route, or ProxyNotFound)
//!     → plugin_dispatch.rs (on_request hooks, in route order)
//!     → mock_response.rs   (canned response when mock mode is on)
//!     → upstream/          (target resolution, header sanitation, TLS, call)
//!     → plugin_dispatch.rs (on_response hooks, in route order)
//!     → write_response.rs  (client-facing response, streamed body)
//! ```
//!
//! # Design Decisions
//! - Every step reads collaborators through `Arc`s handed in at construction
//! - Steps after the mock step skip work they have nothing to do for

pub mod mock_response;
pub mod plugin_dispatch;
pub mod upstream;
pub mod validate_route;
pub mod write_response;

use std::sync::Arc;

pub use mock_response::MockSubstitution;
pub use plugin_dispatch::PluginDispatch;
pub use upstream::{HyperUpstream, TlsConfigCache, UpstreamClient, UpstreamProxy};
pub use validate_route::ValidateRoute;
pub use write_response::WriteResponse;

use crate::pipeline::Flow;
use crate::plugins::PluginRegistry;
use crate::store::Stores;

/// Build the standard six-step flow.
pub fn gateway_flow(
    stores: Arc<Stores>,
    plugins: Arc<PluginRegistry>,
    client: Arc<dyn UpstreamClient>,
) -> Flow {
    Flow::new()
        .then(ValidateRoute::new(stores.clone()))
        .then(PluginDispatch::on_request(plugins.clone()))
        .then(MockSubstitution::new(stores.clone()))
        .then(UpstreamProxy::new(stores, client))
        .then(PluginDispatch::on_response(plugins))
        .then(WriteResponse)
}
