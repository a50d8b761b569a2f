//! Gateway error taxonomy and its HTTP translation.
//!
//! Every pipeline step returns `Result<(), GatewayError>`. The flow stops at
//! the first error and hands it back unchanged; only the HTTP boundary turns
//! it into a response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced while processing a proxied request.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// No route matches the normalized request path.
    #[error("no route found for path {0}")]
    ProxyNotFound(String),

    /// Mock mode is on and the route declares a mock target, but no canned entry matches.
    #[error("mock target {target} has no response for {method} {path}")]
    MockTargetNotFound {
        target: String,
        path: String,
        method: String,
    },

    /// Backend service resolution found nothing.
    #[error("no services match {0}")]
    NoMatchingServices(String),

    /// Backend service resolution failed for another reason.
    #[error("service lookup failed: {0}")]
    ServiceLookup(String),

    /// The configured external endpoint cannot be used as an upstream URL.
    #[error("backend endpoint {url} is malformed: {reason}")]
    BackendMalformed { url: String, reason: String },

    /// Upstream transport failure.
    #[error("bad gateway: {0}")]
    BadGateway(String),

    /// The plugin artifact could not be opened.
    #[error("could not load plugin {plugin}: {reason}")]
    PluginCouldNotLoad { plugin: String, reason: String },

    /// The plugin artifact does not export the entry symbol.
    #[error("plugin {plugin} does not export {symbol}")]
    PluginSymbolNotFound { plugin: String, symbol: String },

    /// The plugin artifact loaded but does not provide the hook capability.
    #[error("plugin {plugin} has the wrong shape: {reason}")]
    PluginWrongCapability { plugin: String, reason: String },

    /// A plugin hook panicked.
    #[error("plugin {plugin} failed during {phase}: {reason}")]
    PluginRuntimeError {
        plugin: String,
        phase: &'static str,
        reason: String,
    },

    /// TLS material could not be retrieved.
    #[error("secret error: {0}")]
    SecretError(String),

    /// TLS material could not be turned into a client configuration.
    #[error("certificate error: {0}")]
    CertificateError(String),

    /// The caller went away before the upstream answered.
    #[error("request canceled")]
    Canceled,

    /// The request or its upstream call ran past the configured timeout.
    #[error("deadline exceeded after {0} seconds")]
    DeadlineExceeded(u64),

    /// A plugin refused the request with a status of its choosing.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    /// Anything else. Rendered without detail.
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl GatewayError {
    /// HTTP status the error is rendered with.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::ProxyNotFound(_) | GatewayError::MockTargetNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            GatewayError::NoMatchingServices(_) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::ServiceLookup(_)
            | GatewayError::BackendMalformed { .. }
            | GatewayError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Canceled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST)
            }
            GatewayError::DeadlineExceeded(_) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Rejected { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable numeric code for clients and dashboards.
    pub fn code(&self) -> u32 {
        match self {
            GatewayError::Other(_) => 1000,
            GatewayError::ProxyNotFound(_) => 1001,
            GatewayError::MockTargetNotFound { .. } => 1002,
            GatewayError::NoMatchingServices(_) => 1003,
            GatewayError::ServiceLookup(_) => 1004,
            GatewayError::BackendMalformed { .. } => 1005,
            GatewayError::BadGateway(_) => 1006,
            GatewayError::PluginCouldNotLoad { .. } => 1007,
            GatewayError::PluginSymbolNotFound { .. } => 1008,
            GatewayError::PluginWrongCapability { .. } => 1009,
            GatewayError::PluginRuntimeError { .. } => 1010,
            GatewayError::SecretError(_) => 1011,
            GatewayError::CertificateError(_) => 1012,
            GatewayError::Canceled => 1013,
            GatewayError::DeadlineExceeded(_) => 1014,
            GatewayError::Rejected { .. } => 1015,
        }
    }

    /// Client may retry: the failure came from cancellation or a deadline.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Canceled | GatewayError::DeadlineExceeded(_))
    }

    /// Message safe to show to clients.
    pub fn public_message(&self) -> String {
        match self {
            GatewayError::Other(_) => "unknown error".to_string(),
            other => other.to_string(),
        }
    }
}

/// JSON body returned to clients for failed requests.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    pub code: u32,
}

impl From<&GatewayError> for ErrorBody {
    fn from(err: &GatewayError) -> Self {
        Self {
            status_code: err.status().as_u16(),
            message: err.public_message(),
            code: err.code(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let body = ErrorBody::from(&self);
        (self.status(), Json(body)).into_response()
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
