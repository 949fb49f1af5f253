//! Route file normalization.
//!
//! Two shapes are accepted:
//!
//! ```text
//! list form:     [{ "context": "/api", "target": "http://localhost:3000" }, ...]
//! mapping form:  { "/api": { "target": "http://localhost:3000" }, ... }
//! ```
//!
//! Mapping entries become `{ "context": <key>, ...options }` in the mapping's
//! insertion order. A `context` inside the options overrides the key.

use serde_json::{Map, Value};

use crate::config::loader::ConfigError;
use crate::config::route::RouteDescriptor;
use crate::config::validation::shape_name;

/// Convert a loaded route file into ordered route descriptors.
pub fn normalize(config: &Value) -> Result<Vec<RouteDescriptor>, ConfigError> {
    route_entries(config)?
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_value(entry).map_err(|source| ConfigError::Route { index, source })
        })
        .collect()
}

/// The list-shaped view of a route file, before typed deserialization.
pub fn route_entries(config: &Value) -> Result<Vec<Value>, ConfigError> {
    match config {
        Value::Array(entries) => Ok(entries.clone()),
        Value::Object(map) => map
            .iter()
            .map(|(context, options)| {
                let options = options.as_object().ok_or_else(|| ConfigError::Options {
                    context: context.clone(),
                })?;
                let mut entry = Map::with_capacity(options.len() + 1);
                entry.insert("context".to_string(), Value::String(context.clone()));
                for (key, value) in options {
                    entry.insert(key.clone(), value.clone());
                }
                Ok(Value::Object(entry))
            })
            .collect(),
        other => Err(ConfigError::Shape(shape_name(other))),
    }
}
