//! Upstream mutual TLS with a per-route secret.

use api_gateway::config::GatewayConfig;
use api_gateway::plugins::StaticPluginSource;
use axum::http::StatusCode;

mod common;

use common::{
    client, fixture, start_gateway, start_mtls_echo_backend, start_tls_echo_backend, Echo,
};

fn resources(port: u16, skip_hostname: bool) -> String {
    resources_with_pair(port, skip_hostname, "client.crt", Some("client.key"))
}

/// One TLS route to `127.0.0.1:port`, its secret holding the named fixture
/// certificate, optionally its key, and the fixture CA.
fn resources_with_pair(port: u16, skip_hostname: bool, cert: &str, key: Option<&str>) -> String {
    let key = match key {
        Some(key) => format!("\"tls.key\" = '''\n{}'''", fixture(key)),
        None => String::new(),
    };
    format!(
        r#"
        [[routes]]
        name = "secure"
        [routes.source]
        path = "/secure"
        [routes.target]
        tls_secret = "backend-tls"
        disable_cn_verification = {skip_hostname}
        [routes.target.backend.endpoint]
        url = "https://127.0.0.1:{port}"

        [[secrets]]
        name = "backend-tls"
        type = "tls"
        [secrets.data]
        "tls.crt" = '''
{cert}'''
        {key}
        "ca.crt" = '''
{ca}'''
        "#,
        cert = fixture(cert),
        ca = fixture("ca.crt"),
    )
}

#[tokio::test]
async fn test_chain_verified_without_hostname_check() {
    let backend = start_tls_echo_backend().await;
    let gateway = start_gateway(
        GatewayConfig::default(),
        &resources(backend.port(), true),
        StaticPluginSource::new(),
    )
    .await;

    let response = client().get(gateway.url("/secure/status")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let echo: Echo = response.json().await.unwrap();
    assert_eq!(echo.path, "/status");
}

#[tokio::test]
async fn test_hostname_mismatch_fails_when_checked() {
    let backend = start_tls_echo_backend().await;
    let gateway = start_gateway(
        GatewayConfig::default(),
        &resources(backend.port(), false),
        StaticPluginSource::new(),
    )
    .await;

    let response = client().get(gateway.url("/secure/status")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], 1006);
}

#[tokio::test]
async fn test_client_certificate_reaches_backend() {
    let backend = start_mtls_echo_backend().await;
    let gateway = start_gateway(
        GatewayConfig::default(),
        &resources(backend.port(), true),
        StaticPluginSource::new(),
    )
    .await;

    let response = client().get(gateway.url("/secure/orders")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let echo: Echo = response.json().await.unwrap();
    assert_eq!(echo.path, "/orders");
}

#[tokio::test]
async fn test_backend_rejects_certificate_not_for_client_auth() {
    let backend = start_mtls_echo_backend().await;
    let gateway = start_gateway(
        GatewayConfig::default(),
        &resources_with_pair(backend.port(), true, "server.crt", Some("server.key")),
        StaticPluginSource::new(),
    )
    .await;

    let response = client().get(gateway.url("/secure/orders")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], 1006);
}

#[tokio::test]
async fn test_secret_without_key_pair_is_secret_error() {
    let backend = start_mtls_echo_backend().await;
    let gateway = start_gateway(
        GatewayConfig::default(),
        &resources_with_pair(backend.port(), true, "client.crt", None),
        StaticPluginSource::new(),
    )
    .await;

    let response = client().get(gateway.url("/secure/orders")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], 1011);
}
