//! Resource snapshot file.
//!
//! Stands in for the cluster watch subsystem when the gateway runs on its
//! own: one TOML file listing every route, service, secret and mock.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{MockResponse, Route, Secret, Service};
use crate::config::loader::ConfigError;

/// Everything the stores should contain after a sync.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ResourceSet {
    pub routes: Vec<Route>,
    pub services: Vec<Service>,
    pub secrets: Vec<Secret>,
    pub mocks: Vec<MockResponse>,
}

impl ResourceSet {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml(&content)
    }
}
