//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router: status endpoint plus 404 fallback
//! - Mount the hot-reload middleware and dispatch chain ahead of them
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener and serve until shutdown

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::schema::ServerConfig;
use crate::config::watcher::NotifyWatcher;
use crate::http::middleware::HotReload;
use crate::proxy::HttpForwarder;
use crate::routing::DispatchChain;

/// Path of the built-in status endpoint.
pub const STATUS_PATH: &str = "/__hot_reload/status";

/// HTTP server hosting one hot-reload instance.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    hot_reload: HotReload,
}

impl HttpServer {
    /// Create a server whose routes come from `config.reload.routes_path`.
    pub fn new(config: ServerConfig) -> Self {
        let hot_reload = HotReload::builder(&config.reload.routes_path)
            .key_order(config.reload.key_order)
            .watcher(Arc::new(NotifyWatcher::new(Duration::from_millis(
                config.reload.poll_interval_ms,
            ))))
            .forwarder(Arc::new(HttpForwarder::new(Duration::from_secs(
                config.timeouts.connect_secs,
            ))))
            .build(Arc::new(DispatchChain::new()));

        Self::with_hot_reload(config, hot_reload)
    }

    /// Create a server around an already configured instance.
    pub fn with_hot_reload(config: ServerConfig, hot_reload: HotReload) -> Self {
        let router = Self::build_router(&config, &hot_reload);
        Self {
            router,
            config,
            hot_reload,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, hot_reload: &HotReload) -> Router {
        let app = Router::new()
            .route(STATUS_PATH, get(reload_status))
            .fallback(not_found)
            .with_state(hot_reload.clone());

        hot_reload
            .layer(app)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` resolves.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes_path = %self.hot_reload.path().display(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        self.hot_reload.shutdown();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn hot_reload(&self) -> &HotReload {
        &self.hot_reload
    }

    /// The fully layered router, for embedding or in-process tests.
    pub fn into_router(self) -> Router {
        self.router
    }
}

async fn reload_status(State(hot_reload): State<HotReload>) -> impl IntoResponse {
    Json(hot_reload.status().await)
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    tracing::debug!(path = %uri.path(), "No proxy route matched");
    (StatusCode::NOT_FOUND, "No matching route found")
}
