//! Active route set management.
//!
//! # Responsibilities
//! - Build one forwarding handler per route descriptor
//! - Register handlers on the dispatch chain and remember them
//! - Remove exactly the handlers this manager registered
//!
//! # Design Decisions
//! - All handlers of a set are built before any is registered, so a bad
//!   route leaves the chain untouched
//! - Removal is by handler identity; handlers registered by others are never touched
//! - Clear then install: between the two a request may find no proxy route
//!   and fall through to the host's own routes
//! - The active route gauge is labelled with the manager's source, so
//!   instances sharing a process report separately

use std::sync::Arc;

use crate::config::route::RouteDescriptor;
use crate::observability::metrics;
use crate::proxy::{ForwardError, Forwarder};
use crate::routing::{DispatchChain, RouteHandler};

/// Owns the handlers currently installed for one hot-reload instance.
#[derive(Debug)]
pub struct RouteSetManager {
    chain: Arc<DispatchChain>,
    forwarder: Arc<dyn Forwarder>,
    active: Vec<Arc<dyn RouteHandler>>,
    /// Metrics label for this set, normally the route file path.
    source: String,
}

impl RouteSetManager {
    pub fn new(chain: Arc<DispatchChain>, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            chain,
            forwarder,
            active: Vec::new(),
            source: String::new(),
        }
    }

    /// Label the `proxy_active_routes` series this manager reports.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Build handlers for `routes` without registering anything.
    pub fn prepare(&self, routes: &[RouteDescriptor]) -> Result<Vec<Arc<dyn RouteHandler>>, ForwardError> {
        routes.iter().map(|route| self.forwarder.build(route)).collect()
    }

    /// Register already-built handlers, in order.
    pub fn register(&mut self, handlers: Vec<Arc<dyn RouteHandler>>) {
        for handler in handlers {
            tracing::debug!(route = %handler.name(), "Registering proxy route");
            self.chain.use_handler(handler.clone());
            self.active.push(handler);
        }
        metrics::set_active_routes(&self.source, self.active.len());
    }

    /// Build and register a handler for each route.
    pub fn install(&mut self, routes: &[RouteDescriptor]) -> Result<usize, ForwardError> {
        let handlers = self.prepare(routes)?;
        let count = handlers.len();
        self.register(handlers);
        Ok(count)
    }

    /// Remove every handler this manager registered.
    pub fn clear(&mut self) {
        for handler in self.active.drain(..) {
            if !self.chain.remove(&handler) {
                tracing::warn!(route = %handler.name(), "Proxy route was already gone from the dispatch chain");
            }
        }
        metrics::set_active_routes(&self.source, 0);
    }

    pub fn active(&self) -> &[Arc<dyn RouteHandler>] {
        &self.active
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
