//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request headers (deep copy)
//!     → headers.rs (strip hop-by-hop, drop API key, X-Forwarded-*)
//!     → upstream request
//!
//! Upstream response headers
//!     → headers.rs (strip hop-by-hop, remember announced trailers)
//!     → client response
//! ```

pub mod headers;

pub use headers::{
    announced_trailers, append_forwarded_for, sanitize_request_headers, strip_hop_by_hop,
    HOP_BY_HOP_HEADERS,
};
