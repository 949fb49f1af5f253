//! Configuration loading from disk.
//!
//! Route files are read through [`ConfigFs`] so embedders (and tests) can
//! substitute the filesystem. Nothing is cached between loads: every call
//! reads the bytes currently on disk.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_server_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("configuration must be an object or an array, found {0}")]
    Shape(&'static str),

    #[error("options for context `{context}` must be an object")]
    Options { context: String },

    #[error("route {index} is invalid: {source}")]
    Route {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Filesystem access used by the loader.
pub trait ConfigFs: Send + Sync + fmt::Debug {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String>;
}

/// The real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFs;

impl ConfigFs for OsFs {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        fs::read_to_string(path)
    }
}

/// In-memory filesystem.
///
/// Useful when routes are generated by the embedding program rather than
/// written by hand, and in tests.
#[derive(Debug, Default)]
pub struct MemoryFs {
    files: Mutex<HashMap<PathBuf, String>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents stored at `path`.
    pub fn write(&self, path: impl AsRef<Path>, contents: impl Into<String>) {
        let path = absolute(path.as_ref());
        self.files
            .lock()
            .expect("memory fs mutex poisoned")
            .insert(path, contents.into());
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = absolute(path.as_ref());
        self.files.lock().expect("memory fs mutex poisoned").remove(&path);
    }
}

impl ConfigFs for MemoryFs {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        self.files
            .lock()
            .expect("memory fs mutex poisoned")
            .get(&absolute(path))
            .cloned()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"))
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Source format, picked from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Toml,
}

impl SourceFormat {
    fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => SourceFormat::Toml,
            _ => SourceFormat::Json,
        }
    }
}

/// Reads and parses the route file into the generic value model.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: PathBuf,
    format: SourceFormat,
    fs: Arc<dyn ConfigFs>,
}

impl ConfigLoader {
    /// Relative paths are resolved against the current directory once, here.
    pub fn new(path: impl AsRef<Path>, fs: Arc<dyn ConfigFs>) -> Self {
        let path = absolute(path.as_ref());
        Self {
            format: SourceFormat::from_path(&path),
            path,
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Read the current file contents and parse them.
    pub fn load(&self) -> Result<Value, ConfigError> {
        let content = self.fs.read_to_string(&self.path).map_err(|source| ConfigError::Io {
            path: self.path.clone(),
            source,
        })?;

        match self.format {
            SourceFormat::Json => Ok(serde_json::from_str(&content)?),
            SourceFormat::Toml => {
                let table: toml::Table = toml::from_str(&content)?;
                Ok(serde_json::to_value(table)?)
            }
        }
    }
}

/// Load and validate the server configuration from a TOML file.
pub fn load_server_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ServerConfig = toml::from_str(&content)?;

    validate_server_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
