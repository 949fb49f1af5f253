//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! route file (JSON/TOML)
//!     → loader.rs (read through ConfigFs & parse into serde_json::Value)
//!     → validation.rs (object-or-array shape check)
//!     → diff.rs (structural comparison against last applied value)
//!     → normalize.rs (list form / mapping form → Vec<RouteDescriptor>)
//!     → validation.rs (per-route semantic checks)
//!     → handed to reload::RouteSetManager
//!
//! On change notification:
//!     watcher.rs yields ChangeEvent::Changed
//!     → reload::Reconciler runs the flow above again
//! ```
//!
//! # Design Decisions
//! - The raw value is kept as the snapshot so diffing sees exactly what the file said
//! - Mapping key order is preserved on load so mapping-form routes keep file order
//! - Server settings (bind address, timeouts) live in a separate TOML file and are
//!   loaded once at startup; only the route file is watched

pub mod diff;
pub mod loader;
pub mod normalize;
pub mod route;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use diff::KeyOrder;
pub use loader::{ConfigError, ConfigFs, ConfigLoader, MemoryFs, OsFs};
pub use route::{ForwardOptions, RewriteRule, RouteContext, RouteDescriptor};
pub use schema::{ListenerConfig, ObservabilityConfig, ReloadConfig, ServerConfig, TimeoutConfig};
pub use watcher::{ChangeEvent, ChangeNotifier, ChangeSubscription, ManualNotifier, NotifyWatcher};
