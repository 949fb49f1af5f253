//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, headers)
//!     → chain.rs (offer to each registered RouteHandler in order)
//!         → handler checks matcher.rs (context prefix match)
//!         → Handled(response) or Next(request)
//!     → no handler took it: host's own routes / 404 fallback
//!
//! Route set changes (at reload):
//!     reload::RouteSetManager
//!     → remove old handlers by identity
//!     → use_handler() new ones, in route file order
//! ```
//!
//! # Design Decisions
//! - Deterministic: same input always matches same route
//! - First match wins (route file order)
//! - Handler list swapped atomically per change; requests never see a half-edited list

pub mod chain;
pub mod matcher;

pub use chain::{dispatch_chain_middleware, Dispatch, DispatchChain, RouteHandler};
pub use matcher::{ContextMatcher, Matcher};
