//! Secret Store: TLS material by namespace/name.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::resource::{ObjectKey, Secret};

#[derive(Debug, Default)]
pub struct SecretStore {
    inner: DashMap<ObjectKey, Arc<Secret>>,
}

impl SecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, secret: Secret) {
        self.inner.insert(secret.key(), Arc::new(secret));
    }

    pub fn delete(&self, key: &ObjectKey) -> bool {
        self.inner.remove(key).is_some()
    }

    pub fn get(&self, namespace: &str, name: &str) -> Option<Arc<Secret>> {
        self.inner
            .get(&ObjectKey::new(namespace, name))
            .map(|r| r.value().clone())
    }

    pub fn replace_all(&self, secrets: Vec<Secret>) {
        let keep: HashSet<ObjectKey> = secrets.iter().map(Secret::key).collect();
        for secret in secrets {
            self.set(secret);
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
