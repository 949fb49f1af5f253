//! Proxy hot reload.
//!
//! Axum middleware that installs reverse-proxy routes from a route file and
//! reinstalls them whenever the file changes, without restarting the host.

pub mod config;
pub mod http;
pub mod observability;
pub mod proxy;
pub mod reload;
pub mod routing;

pub use config::schema::ServerConfig;
pub use http::{HotReload, HttpServer};
pub use reload::{ReconcileOutcome, ReloadEvent, ReloadNotifier};
pub use routing::DispatchChain;
