//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router with one catch-all handler
//! - Wire up middleware (tracing, request ID, concurrency limit)
//! - Serve over plain TCP or TLS with graceful shutdown
//! - Run every request through the gateway flow, bounded by the request timeout

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::Response,
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ListenerConfig, ProxySettings, TimeoutConfig};
use crate::error::GatewayError;
use crate::http::request::client_addr;
use crate::http::response::finish;
use crate::observability::MetricsSink;
use crate::pipeline::{Flow, PipelineContext};

/// How long in-flight requests get to finish once shutdown starts.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub flow: Arc<Flow>,
    /// Swapped whole on config reload; each request reads one snapshot.
    pub settings: Arc<ArcSwap<ProxySettings>>,
    pub sink: Arc<dyn MetricsSink>,
}

/// Handler state: the shared app state plus the per-request bound.
#[derive(Clone)]
struct HandlerState {
    app: AppState,
    request_timeout: Duration,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(state: AppState, listener: &ListenerConfig, timeouts: &TimeoutConfig) -> Self {
        Self {
            router: Self::build_router(state, listener, timeouts),
        }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// The request timeout is applied in the handler, not as a layer, so an
    /// expired request still gets the JSON error body and publishes metrics.
    fn build_router(state: AppState, listener: &ListenerConfig, timeouts: &TimeoutConfig) -> Router {
        let state = HandlerState {
            app: state,
            request_timeout: Duration::from_secs(timeouts.request_secs),
        };
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(ConcurrencyLimitLayer::new(listener.max_connections))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// The router, for serving it some other way.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received, draining connections");
            drain.graceful_shutdown(Some(DRAIN_TIMEOUT));
        });

        tracing::info!(address = %addr, "HTTPS server starting");
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Catch-all handler: one pipeline run per request.
async fn gateway_handler(State(state): State<HandlerState>, request: Request<Body>) -> Response {
    let started = Instant::now();
    let peer = client_addr(&request);
    let HandlerState {
        app: state,
        request_timeout,
    } = state;

    let mut ctx = PipelineContext::new(request, state.settings.load_full());
    if let Some(addr) = peer {
        ctx = ctx.with_client_addr(addr);
    }

    let outcome = match tokio::time::timeout(request_timeout, state.flow.play(&mut ctx)).await {
        Ok(outcome) => outcome,
        Err(_) => {
            let err = GatewayError::DeadlineExceeded(request_timeout.as_secs());
            ctx.mark_failed(&err.to_string());
            tracing::warn!(parent: &ctx.span, timeout_secs = request_timeout.as_secs(), "Request timed out");
            Err(err)
        }
    };
    ctx.metrics.add(
        "request_duration_ms",
        started.elapsed().as_secs_f64() * 1000.0,
        false,
    );

    finish(ctx, outcome, state.sink.as_ref())
}
