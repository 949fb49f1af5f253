//! Route file reconciliation.
//!
//! # Algorithm
//! ```text
//! load ──fail──▶ log, keep everything                     → Failed
//!   │
//! shape is object/array? ──no──▶ ignore                   → Invalid
//!   │
//! equal to last applied? ──yes──▶ nothing to do           → Unchanged
//!   │
//! normalize + validate + build handlers ──fail──▶ log     → Failed
//!   │
//! store snapshot, clear old handlers, register new ones
//!   │
//! notify observers                                        → Applied
//! ```
//!
//! # Design Decisions
//! - Every handler is built before the old set is cleared, so a route file
//!   with a bad target leaves the previous routes serving
//! - The snapshot is only replaced once the new routes are known to build;
//!   the installed set always corresponds to the snapshot
//! - Reconciliations of one instance are serialized by an async mutex;
//!   rapid events queue up, each one cheap when nothing changed

use std::path::Path;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::diff::{is_unchanged, KeyOrder};
use crate::config::loader::{ConfigError, ConfigLoader};
use crate::config::normalize::normalize;
use crate::config::validation::{is_valid_config, shape_name, validate_routes};
use crate::observability::metrics;
use crate::reload::notifier::ReloadNotifier;
use crate::reload::route_set::RouteSetManager;
use crate::reload::ReloadError;

/// Result of one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A new route set was installed.
    Applied { routes: usize },
    /// The file matches the applied configuration.
    Unchanged,
    /// The file is neither an object nor an array; ignored.
    Invalid,
    /// Loading or applying failed; previous routes kept.
    Failed,
}

impl ReconcileOutcome {
    fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Applied { .. } => "applied",
            ReconcileOutcome::Unchanged => "unchanged",
            ReconcileOutcome::Invalid => "invalid",
            ReconcileOutcome::Failed => "failed",
        }
    }
}

#[derive(Debug)]
struct ReconcileState {
    snapshot: Option<Value>,
    routes: RouteSetManager,
}

/// Loads, diffs and applies the route file for one hot-reload instance.
#[derive(Debug)]
pub struct Reconciler {
    loader: ConfigLoader,
    key_order: KeyOrder,
    notifier: Option<ReloadNotifier>,
    state: Mutex<ReconcileState>,
}

impl Reconciler {
    pub fn new(
        loader: ConfigLoader,
        routes: RouteSetManager,
        key_order: KeyOrder,
        notifier: Option<ReloadNotifier>,
    ) -> Self {
        Self {
            loader,
            key_order,
            notifier,
            state: Mutex::new(ReconcileState { snapshot: None, routes }),
        }
    }

    pub fn path(&self) -> &Path {
        self.loader.path()
    }

    /// Run one reconciliation pass. Never fails; problems are logged.
    pub async fn reconcile(&self) -> ReconcileOutcome {
        let mut state = self.state.lock().await;

        let outcome = match self.apply(&mut state) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    path = %self.loader.path().display(),
                    error = %e,
                    active_routes = state.routes.len(),
                    "Failed to reload proxy routes, keeping current routes"
                );
                ReconcileOutcome::Failed
            }
        };
        drop(state);

        metrics::record_reload(&self.loader.path().display().to_string(), outcome.label());
        if let ReconcileOutcome::Applied { .. } = outcome {
            if let Some(notifier) = &self.notifier {
                notifier.proxy_reloaded();
            }
        }
        outcome
    }

    fn apply(&self, state: &mut ReconcileState) -> Result<ReconcileOutcome, ReloadError> {
        let config = self.loader.load()?;

        if !is_valid_config(&config) {
            tracing::debug!(
                path = %self.loader.path().display(),
                found = shape_name(&config),
                "Route file is not an object or array, ignoring"
            );
            return Ok(ReconcileOutcome::Invalid);
        }

        if is_unchanged(&config, state.snapshot.as_ref(), self.key_order) {
            tracing::debug!(path = %self.loader.path().display(), "Route file unchanged");
            return Ok(ReconcileOutcome::Unchanged);
        }

        let descriptors = normalize(&config)?;
        validate_routes(&descriptors).map_err(ConfigError::Validation)?;
        let handlers = state.routes.prepare(&descriptors)?;

        state.snapshot = Some(config);
        state.routes.clear();
        state.routes.register(handlers);

        let routes = state.routes.len();
        tracing::info!(path = %self.loader.path().display(), routes, "Proxy routes reloaded");
        Ok(ReconcileOutcome::Applied { routes })
    }

    /// Whether any configuration has been applied yet.
    pub async fn has_snapshot(&self) -> bool {
        self.state.lock().await.snapshot.is_some()
    }

    /// The last applied configuration.
    pub async fn snapshot(&self) -> Option<Value> {
        self.state.lock().await.snapshot.clone()
    }

    /// Number of installed route handlers.
    pub async fn active_routes(&self) -> usize {
        self.state.lock().await.routes.len()
    }
}
