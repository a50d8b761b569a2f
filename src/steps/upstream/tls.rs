//! Upstream TLS: client certificates and verification policy from secrets.
//!
//! # Design Decisions
//! - A missing or non-TLS secret means "no client certificate", not an error
//! - With `disable_cn_verification` the chain is still verified against the
//!   CA bundle; only the hostname check is skipped
//! - Built configs are cached per secret and rebuilt when the secret object changes

use std::sync::Arc;

use dashmap::DashMap;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::server::ParsedCertificate;
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::error::GatewayError;
use crate::resource::{ObjectKey, Route, Secret, SecretType, CA_BUNDLE_KEY, TLS_CERT_KEY, TLS_PRIVATE_KEY};
use crate::store::SecretStore;

/// A client TLS configuration plus a stable key naming it.
#[derive(Clone)]
pub struct TlsPolicy {
    pub key: String,
    pub config: Arc<ClientConfig>,
}

impl std::fmt::Debug for TlsPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsPolicy").field("key", &self.key).finish()
    }
}

pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Trust anchors from the operating system.
pub(crate) fn native_roots() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    let loaded = rustls_native_certs::load_native_certs();
    for err in &loaded.errors {
        tracing::warn!(error = %err, "Failed to load a native root certificate");
    }
    let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
    tracing::debug!(added, ignored, "Native root certificates loaded");
    roots
}

/// Client config with no client certificate, trusting the system roots.
pub(crate) fn default_client_config() -> Result<ClientConfig, GatewayError> {
    Ok(ClientConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| GatewayError::CertificateError(e.to_string()))?
        .with_root_certificates(native_roots())
        .with_no_client_auth())
}

/// Build a client config from a TLS secret.
pub fn client_config_from_secret(
    secret: &Secret,
    skip_hostname_check: bool,
) -> Result<ClientConfig, GatewayError> {
    let key = secret.key();
    let cert_pem = secret
        .get(TLS_CERT_KEY)
        .ok_or_else(|| GatewayError::SecretError(format!("{} has no {}", key, TLS_CERT_KEY)))?;
    let key_pem = secret
        .get(TLS_PRIVATE_KEY)
        .ok_or_else(|| GatewayError::SecretError(format!("{} has no {}", key, TLS_PRIVATE_KEY)))?;

    let mut reader = cert_pem.as_bytes();
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<_, _>>()
        .map_err(|e| GatewayError::CertificateError(format!("{}: {}", key, e)))?;
    if certs.is_empty() {
        return Err(GatewayError::CertificateError(format!(
            "{}: no certificate in {}",
            key, TLS_CERT_KEY
        )));
    }

    let mut reader = key_pem.as_bytes();
    let private_key = rustls_pemfile::private_key(&mut reader)
        .map_err(|e| GatewayError::CertificateError(format!("{}: {}", key, e)))?
        .ok_or_else(|| {
            GatewayError::CertificateError(format!("{}: no private key in {}", key, TLS_PRIVATE_KEY))
        })?;

    let roots = match secret.get(CA_BUNDLE_KEY) {
        Some(bundle) => ca_roots(&key, bundle)?,
        None => native_roots(),
    };

    let provider = crypto_provider();
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| GatewayError::CertificateError(e.to_string()))?;

    let builder = if skip_hostname_check {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(ChainOnlyVerifier::new(roots, provider)))
    } else {
        builder.with_root_certificates(roots)
    };

    builder
        .with_client_auth_cert(certs, private_key)
        .map_err(|e| GatewayError::CertificateError(format!("{}: {}", key, e)))
}

fn ca_roots(key: &ObjectKey, bundle: &str) -> Result<RootCertStore, GatewayError> {
    let mut reader = bundle.as_bytes();
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
        .collect::<Result<_, _>>()
        .map_err(|e| GatewayError::CertificateError(format!("{}: {}", key, e)))?;

    let mut roots = RootCertStore::empty();
    let (added, _) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(GatewayError::CertificateError(format!(
            "{}: no usable CA certificate in {}",
            key, CA_BUNDLE_KEY
        )));
    }
    Ok(roots)
}

/// Verifies the server chain against the trust anchors, ignoring its name.
#[derive(Debug)]
struct ChainOnlyVerifier {
    roots: Arc<RootCertStore>,
    provider: Arc<CryptoProvider>,
}

impl ChainOnlyVerifier {
    fn new(roots: RootCertStore, provider: Arc<CryptoProvider>) -> Self {
        Self {
            roots: Arc::new(roots),
            provider,
        }
    }
}

impl ServerCertVerifier for ChainOnlyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let cert = ParsedCertificate::try_from(end_entity)?;
        rustls::client::verify_server_cert_signed_by_trust_anchor(
            &cert,
            &self.roots,
            intermediates,
            now,
            self.provider.signature_verification_algorithms.all,
        )?;
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider.signature_verification_algorithms.supported_schemes()
    }
}

type CacheKey = (ObjectKey, bool);

/// Per-secret cache of built client configs.
#[derive(Default)]
pub struct TlsConfigCache {
    entries: DashMap<CacheKey, (Arc<Secret>, TlsPolicy)>,
}

impl TlsConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// TLS policy for a route, or `None` when the route has no usable secret.
    pub fn policy_for(
        &self,
        route: &Route,
        secrets: &SecretStore,
    ) -> Result<Option<TlsPolicy>, GatewayError> {
        let Some(name) = route.target.tls_secret.as_deref().filter(|n| !n.is_empty()) else {
            return Ok(None);
        };

        let Some(secret) = secrets.get(&route.namespace, name) else {
            tracing::debug!(secret = %name, namespace = %route.namespace, "TLS secret not found, proceeding without client certificate");
            return Ok(None);
        };
        if secret.secret_type != SecretType::Tls {
            tracing::warn!(secret = %secret.key(), "Secret is not of TLS type, proceeding without client certificate");
            return Ok(None);
        }

        let skip_hostname = route.target.disable_cn_verification;
        let cache_key = (secret.key(), skip_hostname);
        if let Some(entry) = self.entries.get(&cache_key) {
            let (cached_secret, policy) = entry.value();
            if Arc::ptr_eq(cached_secret, &secret) {
                return Ok(Some(policy.clone()));
            }
        }

        let config = client_config_from_secret(&secret, skip_hostname)?;
        let policy = TlsPolicy {
            key: format!("{}#{}", secret.key(), if skip_hostname { "chain" } else { "full" }),
            config: Arc::new(config),
        };
        tracing::debug!(policy = %policy.key, "Built upstream TLS config");
        self.entries.insert(cache_key, (secret, policy.clone()));
        Ok(Some(policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::route;
    use std::collections::BTreeMap;

    const CA: &str = include_str!("../../../tests/fixtures/tls/ca.crt");
    const CLIENT_CERT: &str = include_str!("../../../tests/fixtures/tls/client.crt");
    const CLIENT_KEY: &str = include_str!("../../../tests/fixtures/tls/client.key");

    fn install_provider() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }

    fn secret(secret_type: SecretType, data: &[(&str, &str)]) -> Secret {
        Secret {
            name: "backend-tls".into(),
            namespace: "default".into(),
            secret_type,
            data: data
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn tls_route(skip: bool) -> Route {
        route(&format!(
            r#"
            name = "secure"
            [source]
            path = "/secure"
            [target]
            tls_secret = "backend-tls"
            disable_cn_verification = {skip}
            [target.backend.endpoint]
            url = "https://backend.internal"
            "#
        ))
    }

    #[test]
    fn test_missing_secret_means_no_tls() {
        let cache = TlsConfigCache::new();
        let secrets = SecretStore::new();
        assert!(cache.policy_for(&tls_route(false), &secrets).unwrap().is_none());
    }

    #[test]
    fn test_opaque_secret_means_no_tls() {
        let cache = TlsConfigCache::new();
        let secrets = SecretStore::new();
        secrets.set(secret(SecretType::Opaque, &[(TLS_CERT_KEY, CLIENT_CERT)]));
        assert!(cache.policy_for(&tls_route(false), &secrets).unwrap().is_none());
    }

    #[test]
    fn test_missing_key_is_secret_error() {
        let cache = TlsConfigCache::new();
        let secrets = SecretStore::new();
        secrets.set(secret(SecretType::Tls, &[(TLS_CERT_KEY, CLIENT_CERT)]));

        let err = cache.policy_for(&tls_route(false), &secrets).unwrap_err();
        assert!(matches!(err, GatewayError::SecretError(_)));
    }

    #[test]
    fn test_garbage_certificate_is_certificate_error() {
        let err = client_config_from_secret(
            &secret(SecretType::Tls, &[(TLS_CERT_KEY, "not a pem"), (TLS_PRIVATE_KEY, CLIENT_KEY)]),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::CertificateError(_)));

        let err = client_config_from_secret(
            &secret(
                SecretType::Tls,
                &[(TLS_CERT_KEY, CLIENT_CERT), (TLS_PRIVATE_KEY, CLIENT_KEY), (CA_BUNDLE_KEY, "junk")],
            ),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::CertificateError(_)));
    }

    #[test]
    fn test_policy_is_cached_until_secret_changes() {
        install_provider();
        let cache = TlsConfigCache::new();
        let secrets = SecretStore::new();
        let material = [(TLS_CERT_KEY, CLIENT_CERT), (TLS_PRIVATE_KEY, CLIENT_KEY), (CA_BUNDLE_KEY, CA)];
        secrets.set(secret(SecretType::Tls, &material));

        let first = cache.policy_for(&tls_route(true), &secrets).unwrap().unwrap();
        let again = cache.policy_for(&tls_route(true), &secrets).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first.config, &again.config));
        assert_eq!(first.key, "default/backend-tls#chain");

        secrets.set(secret(SecretType::Tls, &material));
        let rebuilt = cache.policy_for(&tls_route(true), &secrets).unwrap().unwrap();
        assert!(!Arc::ptr_eq(&first.config, &rebuilt.config));

        let strict = cache.policy_for(&tls_route(false), &secrets).unwrap().unwrap();
        assert_eq!(strict.key, "default/backend-tls#full");
    }
}
