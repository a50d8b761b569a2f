//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → ProxySettings shared via ArcSwap with the pipeline
//!
//! On change:
//!     watcher.rs detects change
//!     → loader.rs loads the new file
//!     → validation.rs validates
//!     → receiver applies it (settings swap, resource sync)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only proxy settings and resources reload live; listener changes need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    GatewayConfig, ListenerConfig, LogFormat, ObservabilityConfig, PluginConfig, ProxySettings,
    ResourcesConfig, TimeoutConfig, TlsConfig,
};
pub use watcher::FileWatcher;
