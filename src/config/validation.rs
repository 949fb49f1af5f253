//! Configuration validation.
//!
//! # Responsibilities
//! - Shape check for loaded route files (object or array)
//! - Semantic checks on normalized routes (non-empty contexts, absolute prefixes, targets)
//! - Value range checks on the server configuration
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function over already-deserialized values
//! - Target URL parsing is left to the forwarder, which owns the URL model

use std::net::SocketAddr;

use serde_json::Value;

use crate::config::route::RouteDescriptor;
use crate::config::schema::ServerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("route {index}: context is empty")]
    EmptyContext { index: usize },

    #[error("route {index}: context `{prefix}` must start with '/'")]
    RelativeContext { index: usize, prefix: String },

    #[error("route {index}: target is empty")]
    EmptyTarget { index: usize },

    #[error("invalid bind address `{0}`")]
    InvalidBindAddress(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("routes path is empty")]
    EmptyRoutesPath,
}

/// Only objects and arrays describe routes; anything else is ignored.
pub fn is_valid_config(value: &Value) -> bool {
    value.is_object() || value.is_array()
}

/// Human-readable JSON type name, for log messages.
pub fn shape_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate normalized routes.
pub fn validate_routes(routes: &[RouteDescriptor]) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for (index, route) in routes.iter().enumerate() {
        let prefixes = route.context.prefixes();
        if prefixes.is_empty() {
            errors.push(ValidationError::EmptyContext { index });
        }
        for prefix in prefixes {
            if !prefix.starts_with('/') {
                errors.push(ValidationError::RelativeContext {
                    index,
                    prefix: prefix.clone(),
                });
            }
        }
        if route.target.trim().is_empty() {
            errors.push(ValidationError::EmptyTarget { index });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the server configuration.
pub fn validate_server_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.request_secs"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.connect_secs"));
    }
    if config.reload.poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroValue("reload.poll_interval_ms"));
    }
    if config.reload.routes_path.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyRoutesPath);
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidBindAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
