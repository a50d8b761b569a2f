//! Runs the route's plugin chain for one phase.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::GatewayError;
use crate::pipeline::{PipelineContext, Step};
use crate::plugins::{call_hook, Phase, PluginRegistry, RequestHook, ResponseHook};

/// Invoke each plugin's hook, in the order the route lists them.
///
/// The first failing plugin stops the chain and the request.
pub struct PluginDispatch {
    registry: Arc<PluginRegistry>,
    phase: Phase,
}

impl PluginDispatch {
    pub fn on_request(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            phase: Phase::OnRequest,
        }
    }

    pub fn on_response(registry: Arc<PluginRegistry>) -> Self {
        Self {
            registry,
            phase: Phase::OnResponse,
        }
    }
}

#[async_trait]
impl Step for PluginDispatch {
    fn name(&self) -> &'static str {
        match self.phase {
            Phase::OnRequest => "plugins_on_request",
            Phase::OnResponse => "plugins_on_response",
        }
    }

    async fn run(&self, ctx: &mut PipelineContext) -> Result<(), GatewayError> {
        let Some(route) = ctx.route.clone() else {
            return Ok(());
        };
        if self.phase == Phase::OnResponse && ctx.response.is_none() {
            return Ok(());
        }

        for plugin_ref in &route.plugins {
            let plugin = self
                .registry
                .resolve(&plugin_ref.name, plugin_ref.version())
                .await?;

            let span = tracing::info_span!(
                parent: &ctx.span,
                "plugin",
                otel.name = %format!("{} {}", plugin_ref.name, self.phase.label()),
                plugin.name = %plugin_ref.name,
                plugin.version = plugin_ref.version().unwrap_or("latest"),
            );

            let result = span.in_scope(|| match self.phase {
                Phase::OnRequest => call_hook(&plugin_ref.name, self.phase, || {
                    plugin.on_request(RequestHook {
                        request: &mut ctx.request,
                        route: &route,
                        config: &plugin_ref.config,
                        metrics: &mut ctx.metrics,
                        span: &span,
                    })
                }),
                Phase::OnResponse => match ctx.response.as_mut() {
                    Some(response) => call_hook(&plugin_ref.name, self.phase, || {
                        plugin.on_response(ResponseHook {
                            response,
                            route: &route,
                            config: &plugin_ref.config,
                            metrics: &mut ctx.metrics,
                            span: &span,
                        })
                    }),
                    None => Ok(()),
                },
            });

            if let Err(err) = result {
                span.record("otel.status_code", "ERROR");
                return Err(err);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxySettings;
    use crate::plugins::{GatewayPlugin, StaticPluginSource};
    use crate::steps::testing::{context, route};
    use axum::body::Body;
    use axum::http::{HeaderValue, Response, StatusCode};
    use std::sync::Mutex;

    /// Adds a header named after itself, and records call order.
    struct Stamp {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl GatewayPlugin for Stamp {
        fn on_request(&self, hook: RequestHook<'_>) -> Result<(), GatewayError> {
            self.log.lock().unwrap().push(format!("{} req", self.label));
            hook.request
                .headers_mut()
                .insert("x-stamp", HeaderValue::from_static(self.label));
            hook.metrics.tag("stamped_by", self.label);
            Ok(())
        }

        fn on_response(&self, hook: ResponseHook<'_>) -> Result<(), GatewayError> {
            self.log.lock().unwrap().push(format!("{} resp", self.label));
            hook.response
                .headers_mut()
                .append("x-stamp", HeaderValue::from_static(self.label));
            Ok(())
        }
    }

    struct Deny;

    impl GatewayPlugin for Deny {
        fn on_request(&self, _hook: RequestHook<'_>) -> Result<(), GatewayError> {
            Err(GatewayError::Rejected {
                status: StatusCode::UNAUTHORIZED,
                message: "token required".into(),
            })
        }

        fn on_response(&self, _hook: ResponseHook<'_>) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    struct Explode;

    impl GatewayPlugin for Explode {
        fn on_request(&self, _hook: RequestHook<'_>) -> Result<(), GatewayError> {
            panic!("plugin bug");
        }

        fn on_response(&self, _hook: ResponseHook<'_>) -> Result<(), GatewayError> {
            Ok(())
        }
    }

    fn routed(plugins: &str) -> PipelineContext {
        let mut ctx = context("GET", "/api/x", ProxySettings::default());
        ctx.route = Some(Arc::new(route(&format!(
            r#"
            name = "api"
            [source]
            path = "/api"
            [target.backend.endpoint]
            url = "http://backend"
            {plugins}
            "#
        ))));
        ctx
    }

    fn registry(log: &Arc<Mutex<Vec<String>>>) -> Arc<PluginRegistry> {
        let source = StaticPluginSource::new()
            .register("first", None, Stamp { label: "first", log: log.clone() })
            .register("second", Some("v2"), Stamp { label: "second", log: log.clone() })
            .register("deny", None, Deny)
            .register("explode", None, Explode);
        Arc::new(PluginRegistry::new(source))
    }

    const TWO_PLUGINS: &str = r#"
        [[plugins]]
        name = "first"
        [[plugins]]
        name = "second"
        version = "v2"
    "#;

    #[tokio::test]
    async fn test_request_hooks_run_in_route_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let step = PluginDispatch::on_request(registry(&log));
        let mut ctx = routed(TWO_PLUGINS);

        step.run(&mut ctx).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["first req", "second req"]);
        assert_eq!(ctx.request.headers().get("x-stamp").unwrap(), "second");
        assert_eq!(ctx.metrics.entries().len(), 2);
    }

    #[tokio::test]
    async fn test_response_hooks_skip_without_response() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let step = PluginDispatch::on_response(registry(&log));
        let mut ctx = routed(TWO_PLUGINS);

        step.run(&mut ctx).await.unwrap();
        assert!(log.lock().unwrap().is_empty());

        ctx.response = Some(Response::new(Body::empty()));
        step.run(&mut ctx).await.unwrap();
        let stamps: Vec<_> = ctx
            .response
            .as_ref()
            .unwrap()
            .headers()
            .get_all("x-stamp")
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(stamps, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_rejection_stops_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let step = PluginDispatch::on_request(registry(&log));
        let mut ctx = routed(
            r#"
            [[plugins]]
            name = "deny"
            [[plugins]]
            name = "first"
            "#,
        );

        let err = step.run(&mut ctx).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_panic_is_contained() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let step = PluginDispatch::on_request(registry(&log));
        let mut ctx = routed(
            r#"
            [[plugins]]
            name = "explode"
            "#,
        );

        let err = step.run(&mut ctx).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::PluginRuntimeError { ref plugin, phase: "on request", .. } if plugin == "explode"
        ));
    }

    #[tokio::test]
    async fn test_unknown_plugin_fails_load() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let step = PluginDispatch::on_request(registry(&log));
        let mut ctx = routed(
            r#"
            [[plugins]]
            name = "first"
            version = "v9"
            "#,
        );

        let err = step.run(&mut ctx).await.unwrap_err();
        assert!(matches!(err, GatewayError::PluginCouldNotLoad { .. }));
        assert_eq!(err.status().as_u16(), 500);
    }
}
