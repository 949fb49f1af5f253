//! Axum middleware provided by this crate.

pub mod hot_reload;

pub use hot_reload::{hot_reload_middleware, HotReload, HotReloadBuilder, HotReloadStatus, ReloadState};
