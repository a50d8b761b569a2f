//! Outbound HTTP client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use dashmap::DashMap;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use rustls::ClientConfig;

use super::tls::{default_client_config, TlsPolicy};
use crate::error::GatewayError;

/// Sends one request to a backend.
///
/// The seam between the upstream step and the network, so the step can be
/// exercised without sockets.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn send(
        &self,
        request: Request<Body>,
        tls: Option<TlsPolicy>,
    ) -> Result<Response<Body>, GatewayError>;
}

type HttpsClient = Client<HttpsConnector<HttpConnector>, Body>;

/// hyper connection pools, one per TLS policy plus a default.
pub struct HyperUpstream {
    default: HttpsClient,
    by_policy: DashMap<String, (Arc<ClientConfig>, HttpsClient)>,
    connect_timeout: Duration,
}

impl HyperUpstream {
    pub fn new(connect_timeout: Duration) -> Result<Self, GatewayError> {
        Ok(Self {
            default: build_client(default_client_config()?, connect_timeout),
            by_policy: DashMap::new(),
            connect_timeout,
        })
    }

    fn client_for(&self, tls: Option<&TlsPolicy>) -> HttpsClient {
        let Some(policy) = tls else {
            return self.default.clone();
        };

        if let Some(entry) = self.by_policy.get(&policy.key) {
            let (config, client) = entry.value();
            if Arc::ptr_eq(config, &policy.config) {
                return client.clone();
            }
        }

        let client = build_client(policy.config.as_ref().clone(), self.connect_timeout);
        self.by_policy
            .insert(policy.key.clone(), (policy.config.clone(), client.clone()));
        client
    }
}

fn build_client(config: ClientConfig, connect_timeout: Duration) -> HttpsClient {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(connect_timeout));

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(config)
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new()).build(https)
}

#[async_trait]
impl UpstreamClient for HyperUpstream {
    async fn send(
        &self,
        request: Request<Body>,
        tls: Option<TlsPolicy>,
    ) -> Result<Response<Body>, GatewayError> {
        let client = self.client_for(tls.as_ref());
        match client.request(request).await {
            Ok(response) => Ok(response.map(Body::new)),
            Err(err) => Err(classify(&err)),
        }
    }
}

/// Map a transport failure onto the gateway taxonomy.
fn classify(err: &hyper_util::client::legacy::Error) -> GatewayError {
    use std::error::Error as _;

    let mut detail = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(hyper_err) = cause.downcast_ref::<hyper::Error>() {
            if hyper_err.is_canceled() {
                return GatewayError::Canceled;
            }
        }
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    GatewayError::BadGateway(detail)
}
