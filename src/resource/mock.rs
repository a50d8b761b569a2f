//! Canned responses for mock mode.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::default_namespace;

/// Lookup key: (namespace, mock target, rewritten path, method).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MockKey {
    pub namespace: String,
    pub target: String,
    pub path: String,
    pub method: String,
}

impl MockKey {
    pub fn new(
        namespace: impl Into<String>,
        target: impl Into<String>,
        path: impl Into<String>,
        method: impl AsRef<str>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            target: target.into(),
            path: path.into(),
            method: method.as_ref().to_ascii_uppercase(),
        }
    }
}

/// One recorded response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockResponse {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    pub target: String,

    pub path: String,

    #[serde(default = "default_method")]
    pub method: String,

    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub body: String,
}

impl MockResponse {
    pub fn key(&self) -> MockKey {
        MockKey::new(&self.namespace, &self.target, &self.path, &self.method)
    }
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_status() -> u16 {
    200
}
