//! Plugin extension subsystem.
//!
//! # Data Flow
//! ```text
//! Route.plugins[i] (name, version, config)
//!     → registry.rs (cache per (name, version), load once)
//!     → source.rs (DylibSource: <dir>/<name>[_<version>].<ext>, or StaticPluginSource)
//!     → api.rs (GatewayPlugin: on_request / on_response)
//!     → guard.rs (panic boundary → PluginRuntimeError)
//! ```
//!
//! # Design Decisions
//! - Plugin code is untrusted: every hook call goes through the panic boundary
//! - Loading is blocking work and runs off the async workers
//! - Failed loads are not cached, so a later request can retry
//! - Loaded plugins live for the life of the process

pub mod api;
pub mod guard;
pub mod registry;
pub mod source;

pub use api::{GatewayPlugin, Phase, RequestHook, ResponseHook, PLUGIN_API_VERSION};
pub use guard::call_hook;
pub use registry::PluginRegistry;
pub use source::{DylibSource, PluginId, PluginSource, StaticPluginSource};

/// Export a plugin type from a `cdylib` so the gateway can load it.
///
/// ```ignore
/// struct Stamp;
/// impl api_gateway::plugins::GatewayPlugin for Stamp { /* ... */ }
/// api_gateway::declare_plugin!(Stamp, || Stamp);
/// ```
#[macro_export]
macro_rules! declare_plugin {
    ($plugin_type:ty, $constructor:expr) => {
        #[no_mangle]
        pub extern "C" fn _gateway_plugin_api_version() -> u32 {
            $crate::plugins::PLUGIN_API_VERSION
        }

        #[no_mangle]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn _gateway_plugin_create() -> *mut dyn $crate::plugins::GatewayPlugin {
            let constructor: fn() -> $plugin_type = $constructor;
            let plugin: Box<dyn $crate::plugins::GatewayPlugin> = Box::new(constructor());
            Box::into_raw(plugin)
        }
    };
}
