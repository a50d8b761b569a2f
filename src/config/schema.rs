//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Proxy behaviour that may change at runtime.
    pub proxy: ProxySettings,

    /// Plugin artifact location.
    pub plugins: PluginConfig,

    /// Resource snapshot file.
    pub resources: ResourcesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum requests processed concurrently (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout for upstreams, in seconds.
    pub connect_secs: u64,

    /// Total time allowed for one inbound request, in seconds.
    pub request_secs: u64,

    /// Time allowed for the upstream to produce response headers, in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 60,
            upstream_secs: 30,
        }
    }
}

/// Settings read by the pipeline on every request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySettings {
    /// Serve canned responses for routes that declare a mock target.
    pub mock_responses: bool,

    /// Address static and dynamic services by cluster IP instead of DNS name.
    pub cluster_ip_routing: bool,

    /// Inbound header carrying the client's API key; never forwarded.
    pub api_key_header: String,

    /// Upstream timeout in seconds, filled from `timeouts.upstream_secs`.
    #[serde(skip)]
    pub upstream_timeout_secs: u64,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            mock_responses: false,
            cluster_ip_routing: false,
            api_key_header: "x-api-key".to_string(),
            upstream_timeout_secs: TimeoutConfig::default().upstream_secs,
        }
    }
}

/// Plugin artifact location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Directory holding `<name>[_<version>].<ext>` artifacts.
    pub directory: String,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            directory: "./plugins".to_string(),
        }
    }
}

/// Resource snapshot file standing in for the cluster watch.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResourcesConfig {
    /// Path of the snapshot (TOML). No snapshot means empty stores.
    pub path: Option<String>,

    /// Re-apply the snapshot when the file changes.
    pub watch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Proxy settings with the upstream timeout taken from `[timeouts]`.
    pub fn proxy_settings(&self) -> ProxySettings {
        ProxySettings {
            upstream_timeout_secs: self.timeouts.upstream_secs,
            ..self.proxy.clone()
        }
    }
}
