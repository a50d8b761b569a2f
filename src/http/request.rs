//! Inbound request helpers.
//!
//! # Design Decisions
//! - The request ID is assigned by the tower layer before any handler runs
//! - The peer address comes from axum's `ConnectInfo` when the server provides it

use std::net::SocketAddr;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};

/// Header name for request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Request ID assigned to this request, if any.
pub fn request_id(headers: &HeaderMap) -> Option<&str> {
    headers.get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
}

/// Peer address of the connection that carried the request.
pub fn client_addr<B>(request: &Request<B>) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}
