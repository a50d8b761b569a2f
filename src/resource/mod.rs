//! Routing resource model.
//!
//! # Data Flow
//! ```text
//! watch subsystem / resource snapshot file
//!     → route.rs, service.rs, secret.rs, mock.rs (typed objects)
//!     → snapshot.rs (ResourceSet: one full sync)
//!     → store/ (keyed, concurrently readable caches)
//! ```
//!
//! # Design Decisions
//! - Objects are immutable once pushed; updates replace the whole object
//! - The backend of a route is a sum type, so exactly one mode is set
//! - Pipeline code only ever reads these types

pub mod mock;
pub mod route;
pub mod secret;
pub mod service;
pub mod snapshot;

pub use mock::{MockKey, MockResponse};
pub use route::{Backend, LabelValue, PluginRef, Route, RouteSource, RouteTarget};
pub use secret::{Secret, SecretType, CA_BUNDLE_KEY, TLS_CERT_KEY, TLS_PRIVATE_KEY};
pub use service::Service;
pub use snapshot::ResourceSet;

/// Namespaced object identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

pub(crate) fn default_namespace() -> String {
    "default".to_string()
}
