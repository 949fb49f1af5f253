//! Route context matching.
//!
//! # Responsibilities
//! - Match the request path against a route's context prefix(es)
//! - Any prefix matching is enough (OR semantics across a context list)
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Plain `starts_with`: `/api` also claims `/apis`, as route files expect
//! - No regex to guarantee O(n) matching

use axum::body::Body;
use axum::http::Request;

use crate::config::route::RouteContext;

/// Trait for matching requests against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the request matches this condition.
    fn matches(&self, req: &Request<Body>) -> bool;
}

/// Matches the request path against one or more prefixes.
#[derive(Debug, Clone)]
pub struct ContextMatcher {
    prefixes: Vec<String>,
}

impl ContextMatcher {
    pub fn new(context: &RouteContext) -> Self {
        Self {
            prefixes: context.prefixes().to_vec(),
        }
    }

    /// First prefix that `path` starts with.
    pub fn matched_prefix(&self, path: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .find(|prefix| path.starts_with(prefix.as_str()))
            .map(String::as_str)
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

impl Matcher for ContextMatcher {
    fn matches(&self, req: &Request<Body>) -> bool {
        self.matched_prefix(req.uri().path()).is_some()
    }
}
