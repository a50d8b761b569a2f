//! Route resource: source match, backend target, TLS policy, plugin chain.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{default_namespace, ObjectKey};

/// A declarative rule mapping a path prefix to a backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Route {
    pub name: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    pub source: RouteSource,

    pub target: RouteTarget,

    /// Name of the mock target consulted when mock responses are enabled.
    #[serde(default)]
    pub mock_target: Option<String>,

    /// Plugins run in this order on request, and again on response.
    #[serde(default)]
    pub plugins: Vec<PluginRef>,
}

impl Route {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.namespace, &self.name)
    }
}

/// What the route matches on.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteSource {
    /// Request path prefix.
    pub path: String,

    /// Host header the route is restricted to.
    #[serde(default)]
    pub virtual_host: Option<String>,
}

/// Where matched requests go.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteTarget {
    pub backend: Backend,

    /// Prefix substituted for the source path. May carry a query string.
    #[serde(default = "default_target_path")]
    pub path: String,

    /// Secret holding client certificate, key and CA bundle.
    #[serde(default)]
    pub tls_secret: Option<String>,

    /// Validate the chain but skip hostname matching.
    #[serde(default)]
    pub disable_cn_verification: bool,
}

fn default_target_path() -> String {
    "/".to_string()
}

/// Backend mode. Exactly one is set per route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Arbitrary URL outside the cluster.
    Endpoint { url: String },

    /// Named cluster service in the route's namespace.
    Service { name: String, port: u16 },

    /// First service (by name) matching the label selector.
    Dynamic {
        labels: BTreeMap<String, LabelValue>,
        port: u16,
    },
}

/// A selector value, literal or copied from a request header.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum LabelValue {
    Header { header: String },
    Literal(String),
}

/// A plugin listed on a route.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PluginRef {
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
}

impl PluginRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Version, with an empty string treated as absent.
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref().filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_from_toml() {
        let route: Route = toml::from_str(
            r#"
            name = "orders"
            [source]
            path = "/orders"
            [target]
            path = "/api/orders"
            backend = { dynamic = { port = 8080, labels = { app = "orders", tier = { header = "x-tier" } } } }
            [[plugins]]
            name = "auth"
            version = "1.2.0"
            config = { realm = "shop" }
            "#,
        )
        .unwrap();

        assert_eq!(route.namespace, "default");
        assert_eq!(route.key().to_string(), "default/orders");
        match &route.target.backend {
            Backend::Dynamic { labels, port } => {
                assert_eq!(*port, 8080);
                assert_eq!(labels["app"], LabelValue::Literal("orders".into()));
                assert_eq!(
                    labels["tier"],
                    LabelValue::Header {
                        header: "x-tier".into()
                    }
                );
            }
            other => panic!("unexpected backend {:?}", other),
        }
        assert_eq!(route.plugins[0].version(), Some("1.2.0"));
        assert_eq!(route.plugins[0].config["realm"], "shop");
    }

    #[test]
    fn test_empty_version_is_absent() {
        let plugin = PluginRef {
            name: "auth".into(),
            version: Some(String::new()),
            config: Default::default(),
        };
        assert_eq!(plugin.version(), None);
    }
}
