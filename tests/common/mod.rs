//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use api_gateway::config::GatewayConfig;
use api_gateway::lifecycle::{Gateway, Shutdown};
use api_gateway::plugins::StaticPluginSource;
use api_gateway::resource::ResourceSet;
use axum::{extract::Request, routing::any, Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const FIXTURES: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/tls");

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(format!("{}/{}", FIXTURES, name)).unwrap()
}

pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// What the echo backend saw.
#[derive(Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
}

async fn echo(request: Request) -> Json<Echo> {
    let headers = request
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();
    Json(Echo {
        method: request.method().to_string(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(String::from),
        headers,
    })
}

/// Backend that answers every request with a JSON description of it.
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/", any(echo)).route("/{*path}", any(echo));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Echo backend behind TLS, presenting a certificate for `server.backend.internal`.
pub async fn start_tls_echo_backend() -> SocketAddr {
    install_crypto_provider();
    let config = RustlsConfig::from_pem_file(
        format!("{}/server.crt", FIXTURES),
        format!("{}/server.key", FIXTURES),
    )
    .await
    .unwrap();
    serve_tls_echo(config)
}

/// Like `start_tls_echo_backend`, but the handshake requires a client
/// certificate issued by the fixture CA for client authentication.
pub async fn start_mtls_echo_backend() -> SocketAddr {
    install_crypto_provider();
    let mut roots = rustls::RootCertStore::empty();
    for cert in rustls_pemfile::certs(&mut fixture("ca.crt").as_bytes()) {
        roots.add(cert.unwrap()).unwrap();
    }
    let verifier = rustls::server::WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .unwrap();

    let certs = rustls_pemfile::certs(&mut fixture("server.crt").as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let key = rustls_pemfile::private_key(&mut fixture("server.key").as_bytes())
        .unwrap()
        .unwrap();
    let mut config = rustls::ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)
        .unwrap();
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    serve_tls_echo(RustlsConfig::from_config(Arc::new(config)))
}

fn serve_tls_echo(config: RustlsConfig) -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/", any(echo)).route("/{*path}", any(echo));
    tokio::spawn(async move {
        let _ = axum_server::from_tcp_rustls(listener, config)
            .serve(app.into_make_service())
            .await;
    });
    addr
}

/// Backend that writes a fixed raw HTTP/1.1 response, optionally after a delay.
pub async fn start_raw_backend(response: &'static str, delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        tokio::time::sleep(delay).await;
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A gateway serving on an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_gateway(
    config: GatewayConfig,
    resources: &str,
    plugins: StaticPluginSource,
) -> TestGateway {
    install_crypto_provider();
    let gateway = match Gateway::with_plugins(config, plugins) {
        Ok(g) => g,
        Err(e) => panic!("gateway failed to start: {}", e),
    };
    let set = match ResourceSet::from_toml(resources) {
        Ok(set) => set,
        Err(e) => panic!("bad resources: {}", e),
    };
    gateway.stores().apply(set);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let mut stop = shutdown.subscribe();

    tokio::spawn(async move {
        let local = Shutdown::new();
        tokio::select! {
            result = gateway.serve_on(listener, &local) => {
                if let Err(e) = result {
                    eprintln!("gateway stopped: {}", e);
                }
            }
            _ = stop.recv() => {}
        }
    });

    TestGateway { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
