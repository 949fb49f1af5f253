//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace, timeout layers)
//!     → middleware/hot_reload.rs (bootstrap on first request)
//!     → routing::chain (proxy routes installed from the route file)
//!     → server.rs own routes (status endpoint, 404 fallback)
//! ```

pub mod middleware;
pub mod server;

pub use middleware::{hot_reload_middleware, HotReload, HotReloadBuilder, ReloadState};
pub use server::HttpServer;
