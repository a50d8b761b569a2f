//! Concurrent resource caches.
//!
//! # Data Flow
//! ```text
//! watch subsystem (external) / ResourceSet file
//!     → Stores::apply (full sync: upsert all, delete the rest)
//!     → path_store.rs, service_store.rs, secret_store.rs, mock_store.rs
//!
//! Request tasks:
//!     → read-only lookups, no task-level locking
//! ```
//!
//! # Design Decisions
//! - DashMap shards keep reads on unrelated keys from blocking on writes
//! - Objects are stored as `Arc<T>` and replaced whole, so no reader sees a half update
//! - One writer (the watch task), many readers
//! - Stores are injected into the pipeline, never global

pub mod mock_store;
pub mod path_store;
pub mod secret_store;
pub mod service_store;

use std::sync::Arc;

pub use mock_store::MockStore;
pub use path_store::PathStore;
pub use secret_store::SecretStore;
pub use service_store::ServiceStore;

use crate::resource::ResourceSet;

/// Every cache the pipeline reads from.
#[derive(Debug, Default)]
pub struct Stores {
    pub paths: PathStore,
    pub services: ServiceStore,
    pub secrets: SecretStore,
    pub mocks: MockStore,
}

impl Stores {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Bring every store in line with the given snapshot.
    pub fn apply(&self, set: ResourceSet) {
        let (routes, services, secrets, mocks) =
            (set.routes.len(), set.services.len(), set.secrets.len(), set.mocks.len());

        self.paths.replace_all(set.routes);
        self.services.replace_all(set.services);
        self.secrets.replace_all(set.secrets);
        self.mocks.replace_all(set.mocks);

        tracing::info!(routes, services, secrets, mocks, "Resource stores synced");
    }
}
