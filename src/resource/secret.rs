//! Secret resource holding TLS material.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{default_namespace, ObjectKey};

pub const TLS_CERT_KEY: &str = "tls.crt";
pub const TLS_PRIVATE_KEY: &str = "tls.key";
pub const CA_BUNDLE_KEY: &str = "ca.crt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    Tls,
    #[default]
    Opaque,
}

/// A secret. Values are PEM text.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Secret {
    pub name: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default, rename = "type")]
    pub secret_type: SecretType,

    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl Secret {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }
}
