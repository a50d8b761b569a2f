//! Service Store: cluster services by namespace/name.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;

use crate::resource::{ObjectKey, Service};

#[derive(Debug, Default)]
pub struct ServiceStore {
    inner: DashMap<ObjectKey, Arc<Service>>,
}

impl ServiceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, service: Service) {
        self.inner.insert(service.key(), Arc::new(service));
    }

    pub fn delete(&self, key: &ObjectKey) -> bool {
        self.inner.remove(key).is_some()
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<Arc<Service>> {
        self.inner
            .get(&ObjectKey::new(namespace, name))
            .map(|r| r.value().clone())
    }

    /// Services in `namespace` matching every selector entry, sorted by name.
    pub fn list(&self, namespace: &str, selector: &BTreeMap<String, String>) -> Vec<Arc<Service>> {
        let mut matched: Vec<Arc<Service>> = self
            .inner
            .iter()
            .filter(|r| r.key().namespace == namespace && r.value().matches(selector))
            .map(|r| r.value().clone())
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name));
        matched
    }

    pub fn replace_all(&self, services: Vec<Service>) {
        let keep: HashSet<ObjectKey> = services.iter().map(Service::key).collect();
        for service in services {
            self.set(service);
        }
        self.inner.retain(|k, _| keep.contains(k));
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(ns: &str, name: &str, labels: &[(&str, &str)]) -> Service {
        Service {
            name: name.into(),
            namespace: ns.into(),
            cluster_ip: None,
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_list_by_selector() {
        let store = ServiceStore::new();
        store.set(service("shop", "orders-b", &[("app", "orders"), ("tier", "gold")]));
        store.set(service("shop", "orders-a", &[("app", "orders")]));
        store.set(service("other", "orders-c", &[("app", "orders")]));

        let selector: BTreeMap<String, String> = [("app".to_string(), "orders".to_string())].into();
        let found = store.list("shop", &selector);
        let names: Vec<_> = found.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["orders-a", "orders-b"]);

        let gold: BTreeMap<String, String> = [
            ("app".to_string(), "orders".to_string()),
            ("tier".to_string(), "gold".to_string()),
        ]
        .into();
        assert_eq!(store.list("shop", &gold).len(), 1);
        assert!(store.list("nowhere", &selector).is_empty());
    }

    #[test]
    fn test_replace_all() {
        let store = ServiceStore::new();
        store.set(service("shop", "old", &[]));
        store.replace_all(vec![service("shop", "new", &[])]);
        assert!(store.get("shop", "old").is_none());
        assert!(store.get("shop", "new").is_some());
    }
}
