//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → path.rs (normalize request path)
//!     → store::PathStore (longest prefix lookup)
//!     → matcher.rs (virtual host check per candidate)
//!     → Return: matched Route or ProxyNotFound
//!
//! Upstream path:
//!     source path + target path + escaped request path
//!     → path.rs (rewrite_target_path)
//! ```
//!
//! # Design Decisions
//! - Prefix matching on segment boundaries: "/foo" matches "/foo/bar", not "/foobar"
//! - Deterministic: longest prefix wins, then host-specific over catch-all
//! - Path matching is case-sensitive, host matching is not

pub mod matcher;
pub mod path;

pub use matcher::{request_host, HostMatcher};
pub use path::{normalize_path, rewrite_target_path, split_query};
