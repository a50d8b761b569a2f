//! Mock Store: canned responses by (namespace, target, path, method).

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;

use crate::resource::{MockKey, MockResponse};

#[derive(Debug, Default)]
pub struct MockStore {
    inner: DashMap<MockKey, Arc<MockResponse>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, mock: MockResponse) {
        self.inner.insert(mock.key(), Arc::new(mock));
    }

    pub fn get(&self, key: &MockKey) -> Option<Arc<MockResponse>> {
        self.inner.get(key).map(|r| r.value().clone())
    }

    pub fn replace_all(&self, mocks: Vec<MockResponse>) {
        let keep: HashSet<MockKey> = mocks.iter().map(MockResponse::key).collect();
        for mock in mocks {
            self.set(mock);
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
