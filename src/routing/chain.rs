//! Host dispatch chain.
//!
//! # Responsibilities
//! - Hold the ordered list of registered route handlers
//! - Register (`use_handler`) and remove handlers by identity
//! - Offer each request to the handlers in order; first to handle it wins
//!
//! # Design Decisions
//! - Handler list lives in an `ArcSwap`: a request dispatches against one
//!   consistent snapshot, writers publish a new list (copy-on-write via `rcu`)
//! - Removal is by `Arc` pointer identity, never by configuration equality
//! - A request nobody handles is handed back so the host's own routes see it

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http;
use axum::middleware::Next;
use axum::response::Response;
use futures_util::future::BoxFuture;

/// Result of offering a request to a handler.
#[derive(Debug)]
pub enum Dispatch {
    /// The handler produced the response.
    Handled(Response),
    /// Not ours; continue with the next handler.
    Next(http::Request<Body>),
}

/// A handler registered on the dispatch chain.
pub trait RouteHandler: Send + Sync + std::fmt::Debug {
    /// Short label for logs and metrics.
    fn name(&self) -> &str;

    fn handle(&self, req: http::Request<Body>) -> BoxFuture<'_, Dispatch>;
}

/// Ordered, swappable list of route handlers.
#[derive(Debug)]
pub struct DispatchChain {
    handlers: ArcSwap<Vec<Arc<dyn RouteHandler>>>,
}

impl DispatchChain {
    pub fn new() -> Self {
        Self {
            handlers: ArcSwap::from_pointee(Vec::new()),
        }
    }

    /// Append a handler; it sees requests from the next dispatch on.
    pub fn use_handler(&self, handler: Arc<dyn RouteHandler>) {
        self.handlers.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(handler.clone());
            next
        });
    }

    /// Remove `handler` by identity. Returns whether it was registered.
    pub fn remove(&self, handler: &Arc<dyn RouteHandler>) -> bool {
        let mut removed = false;
        self.handlers.rcu(|current| {
            let next: Vec<Arc<dyn RouteHandler>> = current
                .iter()
                .filter(|registered| !same_handler(registered, handler))
                .cloned()
                .collect();
            removed = next.len() != current.len();
            next
        });
        removed
    }

    pub fn contains(&self, handler: &Arc<dyn RouteHandler>) -> bool {
        self.handlers.load().iter().any(|registered| same_handler(registered, handler))
    }

    /// Snapshot of the registered handlers, in dispatch order.
    pub fn handlers(&self) -> Arc<Vec<Arc<dyn RouteHandler>>> {
        self.handlers.load_full()
    }

    pub fn len(&self) -> usize {
        self.handlers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.load().is_empty()
    }

    /// Offer `req` to each handler in order.
    pub async fn dispatch(&self, mut req: http::Request<Body>) -> Dispatch {
        let handlers = self.handlers.load_full();
        for handler in handlers.iter() {
            match handler.handle(req).await {
                Dispatch::Handled(response) => return Dispatch::Handled(response),
                Dispatch::Next(returned) => req = returned,
            }
        }
        Dispatch::Next(req)
    }
}

impl Default for DispatchChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity comparison on the data pointer, ignoring vtables.
pub fn same_handler(a: &Arc<dyn RouteHandler>, b: &Arc<dyn RouteHandler>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Axum middleware running the chain ahead of the host's own routes.
pub async fn dispatch_chain_middleware(
    State(chain): State<Arc<DispatchChain>>,
    req: Request,
    next: Next,
) -> Response {
    match chain.dispatch(req).await {
        Dispatch::Handled(response) => response,
        Dispatch::Next(req) => next.run(req).await,
    }
}
