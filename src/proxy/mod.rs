//! Request forwarding.
//!
//! # Data Flow
//! ```text
//! RouteDescriptor
//!     → Forwarder::build (validate target, compile rewrite rules)
//!     → Arc<dyn RouteHandler> registered on the dispatch chain
//!
//! Matched request
//!     → handler.rs (pathRewrite, changeOrigin, x-forwarded-*, extra headers)
//!     → hyper client → upstream
//!     → upstream response streamed back (502 on connection failure)
//! ```
//!
//! # Design Decisions
//! - Handlers are built up front so a bad route fails the reload, not a request
//! - One pooled client shared by every handler a forwarder builds
//! - Plain HTTP upstreams only

pub mod forwarder;
pub mod handler;

use std::sync::Arc;

use crate::config::route::RouteDescriptor;
use crate::routing::RouteHandler;

pub use forwarder::HttpForwarder;
pub use handler::HttpProxyHandler;

/// Error building a forwarding handler from a route.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("invalid target `{target}`: {source}")]
    InvalidTarget {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported target scheme `{0}` (only http is supported)")]
    UnsupportedScheme(String),

    #[error("target `{0}` has no host")]
    MissingHost(String),

    #[error("invalid pathRewrite pattern `{pattern}`: {source}")]
    InvalidRewrite {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid header `{name}`")]
    InvalidHeader { name: String },
}

/// Builds forwarding handlers for route descriptors.
pub trait Forwarder: Send + Sync + std::fmt::Debug {
    fn build(&self, route: &RouteDescriptor) -> Result<Arc<dyn RouteHandler>, ForwardError>;
}
