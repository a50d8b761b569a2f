//! Where plugins come from.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;

use crate::error::GatewayError;
use crate::plugins::api::{GatewayPlugin, RequestHook, ResponseHook, PLUGIN_API_VERSION};

pub const API_VERSION_SYMBOL: &str = "_gateway_plugin_api_version";
pub const CREATE_SYMBOL: &str = "_gateway_plugin_create";

/// Plugin identity: name plus optional version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PluginId {
    pub name: String,
    pub version: Option<String>,
}

impl PluginId {
    pub fn new(name: &str, version: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            version: version.filter(|v| !v.is_empty()).map(String::from),
        }
    }

    /// File stem of the artifact: `name` or `name_version`.
    pub fn artifact_stem(&self) -> String {
        match &self.version {
            Some(v) => format!("{}_{}", self.name, v),
            None => self.name.clone(),
        }
    }
}

impl std::fmt::Display for PluginId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}@{}", self.name, v),
            None => f.write_str(&self.name),
        }
    }
}

/// Produces plugin instances. Called at most once per id by the registry
/// unless a previous call failed.
pub trait PluginSource: Send + Sync {
    fn load(&self, id: &PluginId) -> Result<Arc<dyn GatewayPlugin>, GatewayError>;
}

/// Loads plugins from shared libraries in one directory.
#[derive(Debug, Clone)]
pub struct DylibSource {
    directory: PathBuf,
}

impl DylibSource {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    /// `<dir>/<name>[_<version>].<so|dylib|dll>`
    pub fn artifact_path(&self, id: &PluginId) -> PathBuf {
        self.directory.join(format!(
            "{}.{}",
            id.artifact_stem(),
            std::env::consts::DLL_EXTENSION
        ))
    }
}

type ApiVersionFn = unsafe extern "C" fn() -> u32;
#[allow(improper_ctypes_definitions)]
type CreateFn = unsafe extern "C" fn() -> *mut dyn GatewayPlugin;

impl PluginSource for DylibSource {
    fn load(&self, id: &PluginId) -> Result<Arc<dyn GatewayPlugin>, GatewayError> {
        let path = self.artifact_path(id);
        tracing::info!(plugin = %id, path = ?path, "Loading plugin library");

        // Loading runs the library's initializers
        let library = unsafe { Library::new(&path) }.map_err(|e| GatewayError::PluginCouldNotLoad {
            plugin: id.to_string(),
            reason: e.to_string(),
        })?;

        let plugin = unsafe {
            let api_version = library
                .get::<ApiVersionFn>(API_VERSION_SYMBOL.as_bytes())
                .ok()
                .map(|symbol| *symbol);
            let create = library
                .get::<CreateFn>(CREATE_SYMBOL.as_bytes())
                .ok()
                .map(|symbol| *symbol);
            instantiate(id, api_version, create)?
        };

        tracing::info!(plugin = %id, "Plugin loaded");
        Ok(Arc::new(DylibPlugin {
            plugin,
            _library: library,
        }))
    }
}

/// Check a library's entry points and build its plugin.
///
/// # Safety
/// Both functions must come from a library that stays loaded for as long as
/// the returned plugin lives.
unsafe fn instantiate(
    id: &PluginId,
    api_version: Option<ApiVersionFn>,
    create: Option<CreateFn>,
) -> Result<Box<dyn GatewayPlugin>, GatewayError> {
    let api_version = api_version.ok_or_else(|| GatewayError::PluginSymbolNotFound {
        plugin: id.to_string(),
        symbol: API_VERSION_SYMBOL.to_string(),
    })?;
    let found = api_version();
    if found != PLUGIN_API_VERSION {
        return Err(GatewayError::PluginWrongCapability {
            plugin: id.to_string(),
            reason: format!(
                "built for plugin api {}, gateway speaks {}",
                found, PLUGIN_API_VERSION
            ),
        });
    }

    let create = create.ok_or_else(|| GatewayError::PluginSymbolNotFound {
        plugin: id.to_string(),
        symbol: CREATE_SYMBOL.to_string(),
    })?;
    let raw = create();
    if raw.is_null() {
        return Err(GatewayError::PluginWrongCapability {
            plugin: id.to_string(),
            reason: "constructor returned no plugin".to_string(),
        });
    }
    Ok(Box::from_raw(raw))
}

/// A plugin instance and the library its code lives in.
///
/// Field order matters: the instance must drop before the library unloads.
struct DylibPlugin {
    plugin: Box<dyn GatewayPlugin>,
    _library: Library,
}

impl GatewayPlugin for DylibPlugin {
    fn on_request(&self, hook: RequestHook<'_>) -> Result<(), GatewayError> {
        self.plugin.on_request(hook)
    }

    fn on_response(&self, hook: ResponseHook<'_>) -> Result<(), GatewayError> {
        self.plugin.on_response(hook)
    }
}

/// In-process plugins registered by name and version.
#[derive(Default, Clone)]
pub struct StaticPluginSource {
    plugins: HashMap<PluginId, Arc<dyn GatewayPlugin>>,
}

impl StaticPluginSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        name: &str,
        version: Option<&str>,
        plugin: impl GatewayPlugin + 'static,
    ) -> Self {
        self.plugins.insert(PluginId::new(name, version), Arc::new(plugin));
        self
    }
}

impl PluginSource for StaticPluginSource {
    fn load(&self, id: &PluginId) -> Result<Arc<dyn GatewayPlugin>, GatewayError> {
        self.plugins
            .get(id)
            .cloned()
            .ok_or_else(|| GatewayError::PluginCouldNotLoad {
                plugin: id.to_string(),
                reason: "not registered".to_string(),
            })
    }
}
