//! Startup orchestration.
//!
//! # Responsibilities
//! - Build stores, plugin registry, upstream client and flow from config
//! - Load the resource snapshot before traffic is accepted
//! - Start reload watchers for the snapshot and the config file
//! - Bind the listener last and serve until shutdown

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::Router;
use notify::RecommendedWatcher;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{load_config, ConfigError, FileWatcher, GatewayConfig, ProxySettings};
use crate::error::GatewayError;
use crate::http::{AppState, GatewayServer};
use crate::lifecycle::Shutdown;
use crate::net::load_tls_config;
use crate::observability::PrometheusSink;
use crate::plugins::{DylibSource, PluginRegistry, PluginSource};
use crate::resource::ResourceSet;
use crate::steps::{gateway_flow, HyperUpstream, UpstreamClient};
use crate::store::Stores;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Gateway(#[from] GatewayError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("file watch: {0}")]
    Watch(#[from] notify::Error),

    #[error("invalid bind address {0}")]
    Address(String),
}

/// A fully wired gateway, ready to serve.
pub struct Gateway {
    config: GatewayConfig,
    stores: Arc<Stores>,
    settings: Arc<ArcSwap<ProxySettings>>,
    plugins: Arc<PluginRegistry>,
    server: GatewayServer,
    watchers: Vec<RecommendedWatcher>,
}

impl Gateway {
    /// Production wiring: plugins from the configured directory, hyper upstream client.
    pub fn build(config: GatewayConfig) -> Result<Self, StartupError> {
        let source = DylibSource::new(&config.plugins.directory);
        Self::with_plugins(config, source)
    }

    pub fn with_plugins(
        config: GatewayConfig,
        source: impl PluginSource + 'static,
    ) -> Result<Self, StartupError> {
        let client = HyperUpstream::new(Duration::from_secs(config.timeouts.connect_secs))?;
        Self::with_parts(config, source, Arc::new(client))
    }

    pub fn with_parts(
        config: GatewayConfig,
        source: impl PluginSource + 'static,
        client: Arc<dyn UpstreamClient>,
    ) -> Result<Self, StartupError> {
        let stores = Stores::new();
        if let Some(path) = &config.resources.path {
            stores.apply(ResourceSet::load(Path::new(path))?);
        }

        let plugins = Arc::new(PluginRegistry::new(source));
        let flow = gateway_flow(stores.clone(), plugins.clone(), client);
        tracing::info!(steps = ?flow.step_names(), "Gateway flow assembled");

        let settings = Arc::new(ArcSwap::from_pointee(config.proxy_settings()));
        let state = AppState {
            flow: Arc::new(flow),
            settings: settings.clone(),
            sink: Arc::new(PrometheusSink),
        };
        let server = GatewayServer::new(state, &config.listener, &config.timeouts);

        Ok(Self {
            config,
            stores,
            settings,
            plugins,
            server,
            watchers: Vec::new(),
        })
    }

    pub fn stores(&self) -> &Arc<Stores> {
        &self.stores
    }

    pub fn settings(&self) -> &Arc<ArcSwap<ProxySettings>> {
        &self.settings
    }

    pub fn plugins(&self) -> &Arc<PluginRegistry> {
        &self.plugins
    }

    pub fn router(&self) -> Router {
        self.server.router()
    }

    /// Start reload watchers. Must be called inside a Tokio runtime.
    pub fn watch(&mut self, config_path: Option<&Path>) -> Result<(), StartupError> {
        if let (true, Some(path)) = (self.config.resources.watch, self.config.resources.path.as_deref()) {
            let (watcher, mut updates) = FileWatcher::new(Path::new(path), ResourceSet::load);
            self.watchers.push(watcher.run()?);

            let stores = self.stores.clone();
            tokio::spawn(async move {
                while let Some(set) = updates.recv().await {
                    stores.apply(set);
                }
            });
        }

        if let Some(path) = config_path {
            let (watcher, mut updates) = FileWatcher::new(path, load_config);
            self.watchers.push(watcher.run()?);

            let settings = self.settings.clone();
            tokio::spawn(async move {
                while let Some(config) = updates.recv().await {
                    let next = config.proxy_settings();
                    tracing::info!(
                        mock_responses = next.mock_responses,
                        cluster_ip_routing = next.cluster_ip_routing,
                        upstream_timeout_secs = next.upstream_timeout_secs,
                        "Proxy settings reloaded"
                    );
                    settings.store(Arc::new(next));
                }
            });
        }

        Ok(())
    }

    /// Bind the configured listener and serve until `shutdown` fires.
    pub async fn serve(self, shutdown: &Shutdown) -> Result<(), StartupError> {
        let addr: SocketAddr = self
            .config
            .listener
            .bind_address
            .parse()
            .map_err(|_| StartupError::Address(self.config.listener.bind_address.clone()))?;

        match self.config.listener.tls.clone() {
            Some(tls) => {
                let rustls = load_tls_config(&tls).await?;
                let Gateway { server, watchers, .. } = self;
                let result = server.run_tls(addr, rustls, shutdown.subscribe()).await;
                drop(watchers);
                result.map_err(StartupError::from)
            }
            None => {
                let listener = TcpListener::bind(addr).await?;
                self.serve_on(listener, shutdown).await
            }
        }
    }

    /// Serve plain HTTP on an already bound listener.
    pub async fn serve_on(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), StartupError> {
        let Gateway { server, watchers, .. } = self;
        let result = server.run(listener, shutdown.subscribe()).await;
        drop(watchers);
        result.map_err(StartupError::from)
    }
}
