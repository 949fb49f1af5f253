//! Route descriptor definitions.
//!
//! A route descriptor is one proxy rule: the path prefix(es) it claims, the
//! upstream it forwards to, and the forwarding options. Field names follow the
//! camelCase spelling used in route files (`changeOrigin`, `pathRewrite`).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Path prefix(es) a route matches against incoming requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RouteContext {
    Single(String),
    Many(Vec<String>),
}

impl RouteContext {
    /// All prefixes of this context, in declaration order.
    pub fn prefixes(&self) -> &[String] {
        match self {
            RouteContext::Single(prefix) => std::slice::from_ref(prefix),
            RouteContext::Many(prefixes) => prefixes,
        }
    }
}

impl fmt::Display for RouteContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefixes().join(","))
    }
}

/// Canonical representation of one proxy rule.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RouteDescriptor {
    /// Path prefix(es) matched by this route.
    pub context: RouteContext,

    /// Upstream base URL (e.g., "http://localhost:3000").
    pub target: String,

    /// Forwarding options.
    #[serde(flatten)]
    pub options: ForwardOptions,
}

impl RouteDescriptor {
    pub fn new(context: RouteContext, target: impl Into<String>) -> Self {
        Self {
            context,
            target: target.into(),
            options: ForwardOptions::default(),
        }
    }
}

/// Options applied when forwarding a matched request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardOptions {
    /// Rewrite the `Host` header to the target's authority.
    #[serde(default)]
    pub change_origin: bool,

    /// Ordered path rewrite rules; the first matching pattern wins.
    ///
    /// Patterns see the request path only. The query string is never matched
    /// or rewritten and is appended to the rewritten path unchanged.
    #[serde(default, with = "rewrite_rules")]
    pub path_rewrite: Vec<RewriteRule>,

    /// Extra headers set on the upstream request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Options this crate does not interpret, kept so they survive normalization.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single `pathRewrite` entry: regex pattern → replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteRule {
    pub pattern: String,
    pub replacement: String,
}

impl RewriteRule {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// `pathRewrite` is written as an object; entry order is rule order.
mod rewrite_rules {
    use serde::de::Error as _;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::{Map, Value};

    use super::RewriteRule;

    pub fn serialize<S: Serializer>(rules: &[RewriteRule], serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(rules.len()))?;
        for rule in rules {
            map.serialize_entry(&rule.pattern, &rule.replacement)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<RewriteRule>, D::Error> {
        let map = Map::<String, Value>::deserialize(deserializer)?;
        map.into_iter()
            .map(|(pattern, value)| match value {
                Value::String(replacement) => Ok(RewriteRule { pattern, replacement }),
                other => Err(D::Error::custom(format!(
                    "pathRewrite value for `{}` must be a string, found {}",
                    pattern, other
                ))),
            })
            .collect()
    }
}
