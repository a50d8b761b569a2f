//! Path Store: normalized source path → routes.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::resource::{ObjectKey, Route};
use crate::routing::matcher::HostMatcher;
use crate::routing::path::{normalize_path, prefixes};

/// A route with its precomputed host matcher.
#[derive(Debug, Clone)]
struct Entry {
    route: Arc<Route>,
    host: HostMatcher,
}

/// Routes keyed by their normalized source path.
///
/// Several routes may share a path when they differ by virtual host. Within
/// one path, host-specific routes are checked first, then by namespace/name.
#[derive(Debug, Default)]
pub struct PathStore {
    by_path: DashMap<String, Arc<Vec<Entry>>>,
    paths_by_key: DashMap<ObjectKey, String>,
}

impl PathStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a route.
    pub fn set(&self, route: Route) {
        let key = route.key();
        let path = normalize_path(&route.source.path);

        if let Some(previous) = self.paths_by_key.insert(key.clone(), path.clone()) {
            if previous != path {
                self.remove_from_path(&previous, &key);
            }
        }

        let entry = Entry {
            host: HostMatcher::new(route.source.virtual_host.as_deref()),
            route: Arc::new(route),
        };

        let mut slot = self.by_path.entry(path.clone()).or_default();
        let mut entries: Vec<Entry> = slot
            .iter()
            .filter(|e| e.route.key() != key)
            .cloned()
            .collect();
        entries.push(entry);
        entries.sort_by(|a, b| {
            b.host
                .is_specific()
                .cmp(&a.host.is_specific())
                .then_with(|| a.route.key().cmp(&b.route.key()))
        });
        *slot = Arc::new(entries);

        tracing::debug!(route = %key, path = %path, "Route stored");
    }

    /// Remove a route. Returns true if it was present.
    pub fn delete(&self, key: &ObjectKey) -> bool {
        match self.paths_by_key.remove(key) {
            Some((_, path)) => {
                self.remove_from_path(&path, key);
                tracing::debug!(route = %key, path = %path, "Route deleted");
                true
            }
            None => false,
        }
    }

    fn remove_from_path(&self, path: &str, key: &ObjectKey) {
        if let Some(mut slot) = self.by_path.get_mut(path) {
            let remaining: Vec<Entry> = slot
                .iter()
                .filter(|e| &e.route.key() != key)
                .cloned()
                .collect();
            *slot = Arc::new(remaining);
        }
        self.by_path.remove_if(path, |_, entries| entries.is_empty());
    }

    /// Longest-prefix lookup for an already normalized path.
    pub fn get(&self, normalized_path: &str) -> Option<Arc<Route>> {
        self.lookup(normalized_path, None)
    }

    /// Longest-prefix lookup honoring virtual hosts.
    pub fn lookup(&self, normalized_path: &str, host: Option<&str>) -> Option<Arc<Route>> {
        for prefix in prefixes(normalized_path) {
            // Clone the Arc so the shard lock is released before matching
            let entries = match self.by_path.get(prefix) {
                Some(slot) => slot.clone(),
                None => continue,
            };
            if let Some(entry) = entries.iter().find(|e| e.host.matches(host)) {
                return Some(entry.route.clone());
            }
        }
        None
    }

    /// Full sync against a snapshot.
    pub fn replace_all(&self, routes: Vec<Route>) {
        let keep: HashSet<ObjectKey> = routes.iter().map(Route::key).collect();
        for route in routes {
            self.set(route);
        }
        let stale: Vec<ObjectKey> = self
            .paths_by_key
            .iter()
            .map(|r| r.key().clone())
            .filter(|k| !keep.contains(k))
            .collect();
        for key in stale {
            self.delete(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.paths_by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths_by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Backend, RouteSource, RouteTarget};

    fn route(name: &str, path: &str, host: Option<&str>) -> Route {
        Route {
            name: name.into(),
            namespace: "default".into(),
            source: RouteSource {
                path: path.into(),
                virtual_host: host.map(String::from),
            },
            target: RouteTarget {
                backend: Backend::Endpoint {
                    url: "http://example.com".into(),
                },
                path: "/".into(),
                tls_secret: None,
                disable_cn_verification: false,
            },
            mock_target: None,
            plugins: Vec::new(),
        }
    }

    #[test]
    fn test_prefix_lookup() {
        let store = PathStore::new();
        store.set(route("root", "/", None));
        store.set(route("api", "/api", None));
        store.set(route("v2", "/api/v2/", None));

        assert_eq!(store.get("/api/v2/users").unwrap().name, "v2");
        assert_eq!(store.get("/api/v1").unwrap().name, "api");
        assert_eq!(store.get("/api").unwrap().name, "api");
        assert_eq!(store.get("/apix").unwrap().name, "root");
        assert_eq!(store.get("/").unwrap().name, "root");
    }

    #[test]
    fn test_missing_route() {
        let store = PathStore::new();
        store.set(route("api", "/api", None));
        assert!(store.get("/other").is_none());
        assert!(store.get("/").is_none());
    }

    #[test]
    fn test_virtual_host_preferred() {
        let store = PathStore::new();
        store.set(route("any", "/shop", None));
        store.set(route("eu", "/shop", Some("eu.example.com")));

        assert_eq!(store.lookup("/shop", Some("eu.example.com")).unwrap().name, "eu");
        assert_eq!(store.lookup("/shop", Some("us.example.com")).unwrap().name, "any");
        assert_eq!(store.lookup("/shop", None).unwrap().name, "any");
    }

    #[test]
    fn test_update_moves_route() {
        let store = PathStore::new();
        store.set(route("api", "/old", None));
        store.set(route("api", "/new", None));

        assert!(store.get("/old").is_none());
        assert_eq!(store.get("/new").unwrap().name, "api");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_and_replace_all() {
        let store = PathStore::new();
        store.set(route("a", "/a", None));
        store.set(route("b", "/b", None));

        assert!(store.delete(&ObjectKey::new("default", "a")));
        assert!(!store.delete(&ObjectKey::new("default", "a")));
        assert!(store.get("/a").is_none());

        store.replace_all(vec![route("c", "/c", None)]);
        assert!(store.get("/b").is_none());
        assert_eq!(store.get("/c/d").unwrap().name, "c");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_concurrent_reads_during_writes() {
        let store = Arc::new(PathStore::new());
        store.set(route("stable", "/stable", None));

        let writer = {
            let store = store.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    store.set(route(&format!("r{}", i % 10), &format!("/churn/{}", i), None));
                }
            })
        };
        for _ in 0..200 {
            assert_eq!(store.get("/stable/x").unwrap().name, "stable");
        }
        writer.join().unwrap();
        assert_eq!(store.len(), 11);
    }
}
