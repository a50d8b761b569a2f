//! Cluster service resource.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{default_namespace, ObjectKey};

/// A service as seen by the watch subsystem.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Service {
    pub name: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default)]
    pub cluster_ip: Option<String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl Service {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    /// True if every selector entry is present with the same value.
    pub fn matches(&self, selector: &BTreeMap<String, String>) -> bool {
        selector
            .iter()
            .all(|(k, v)| self.labels.get(k).map(|l| l == v).unwrap_or(false))
    }

    /// In-cluster DNS name.
    pub fn dns_name(&self) -> String {
        format!("{}.{}.svc.cluster.local", self.name, self.namespace)
    }
}
