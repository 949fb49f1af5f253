//! Hot reload subsystem.
//!
//! # Data Flow
//! ```text
//! trigger (first request, ChangeEvent::Changed, manual call)
//!     → reconciler.rs (load → shape check → diff → normalize → build)
//!     → route_set.rs (clear old handlers, register new ones on the chain)
//!     → notifier.rs (ReloadEvent::ProxyReloaded to observers)
//! ```
//!
//! # Design Decisions
//! - State (snapshot + installed handlers) belongs to one instance; two
//!   instances never share routes
//! - Failures are logged and leave the previous routes serving; nothing
//!   reaches the request path

pub mod notifier;
pub mod reconciler;
pub mod route_set;

use crate::config::loader::ConfigError;
use crate::proxy::ForwardError;

pub use notifier::{ReloadEvent, ReloadNotifier};
pub use reconciler::{ReconcileOutcome, Reconciler};
pub use route_set::RouteSetManager;

/// Error raised inside a reconciliation pass.
#[derive(Debug, thiserror::Error)]
pub enum ReloadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build proxy route: {0}")]
    Registration(#[from] ForwardError),

    #[error("failed to watch route file: {0}")]
    Watch(#[from] notify::Error),
}
