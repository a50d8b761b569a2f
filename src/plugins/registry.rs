//! Per-(name, version) cache of loaded plugins.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use crate::error::GatewayError;
use crate::plugins::api::GatewayPlugin;
use crate::plugins::source::{PluginId, PluginSource};

type Slot = Arc<OnceCell<Arc<dyn GatewayPlugin>>>;

/// Resolves plugin references, loading each at most once.
///
/// Concurrent first requests for the same plugin wait on one load. A failed
/// load leaves the slot empty so the next request tries again.
pub struct PluginRegistry {
    source: Arc<dyn PluginSource>,
    cache: DashMap<PluginId, Slot>,
}

impl PluginRegistry {
    pub fn new(source: impl PluginSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
            cache: DashMap::new(),
        }
    }

    pub async fn resolve(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> Result<Arc<dyn GatewayPlugin>, GatewayError> {
        let id = PluginId::new(name, version);
        // Clone the slot out so the shard lock is not held across the load
        let slot: Slot = self.cache.entry(id.clone()).or_default().clone();

        let plugin = slot
            .get_or_try_init(|| {
                let source = self.source.clone();
                let id = id.clone();
                async move {
                    let label = id.to_string();
                    tokio::task::spawn_blocking(move || source.load(&id))
                        .await
                        .map_err(|e| GatewayError::PluginCouldNotLoad {
                            plugin: label,
                            reason: format!("loader task failed: {}", e),
                        })?
                }
            })
            .await?;

        Ok(plugin.clone())
    }

    /// Number of plugins successfully loaded so far.
    pub fn loaded(&self) -> usize {
        self.cache.iter().filter(|r| r.value().initialized()).count()
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry").field("loaded", &self.loaded()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::api::{RequestHook, ResponseHook};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Noop;

    impl GatewayPlugin for Noop {
        fn on_request(&self, _hook: RequestHook<'_>) -> Result<(), GatewayError> {
            Ok(())
        }

        fn on_response(&self, _hook: ResponseHook<'_>) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    /// Counts loads and fails the first `fail_first` of them.
    struct Counting {
        loads: Arc<AtomicUsize>,
        fail_first: usize,
    }

    impl PluginSource for Counting {
        fn load(&self, id: &PluginId) -> Result<Arc<dyn GatewayPlugin>, GatewayError> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            if n < self.fail_first {
                return Err(GatewayError::PluginCouldNotLoad {
                    plugin: id.to_string(),
                    reason: "transient".into(),
                });
            }
            Ok(Arc::new(Noop))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_resolve_loads_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(PluginRegistry::new(Counting {
            loads: loads.clone(),
            fail_first: 0,
        }));

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                registry.resolve("auth", Some("1.0.0")).await.is_ok()
            }));
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(registry.loaded(), 1);
    }

    #[tokio::test]
    async fn test_versions_are_distinct() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = PluginRegistry::new(Counting {
            loads: loads.clone(),
            fail_first: 0,
        });

        registry.resolve("auth", Some("1.0.0")).await.unwrap();
        registry.resolve("auth", Some("2.0.0")).await.unwrap();
        registry.resolve("auth", None).await.unwrap();
        registry.resolve("auth", Some("")).await.unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = PluginRegistry::new(Counting {
            loads: loads.clone(),
            fail_first: 1,
        });

        assert!(matches!(
            registry.resolve("auth", None).await,
            Err(GatewayError::PluginCouldNotLoad { .. })
        ));
        assert!(registry.resolve("auth", None).await.is_ok());
        assert!(registry.resolve("auth", None).await.is_ok());
        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }
}
