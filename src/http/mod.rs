//! HTTP front door.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum router, tower layers: trace, request ID, timeout, concurrency)
//!     → request.rs (request ID and peer address extraction)
//!     → pipeline::Flow (the gateway steps)
//!     → response.rs (errors → JSON body, metrics published)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{client_addr, request_id, X_REQUEST_ID};
pub use response::finish;
pub use server::{AppState, GatewayServer};
