//! Hot-reload middleware.
//!
//! # Responsibilities
//! - Bootstrap the route set on the first request an instance sees
//! - Start exactly one watch task per instance
//! - Re-run reconciliation on every `ChangeEvent::Changed`
//! - Always pass the request on to `next`
//!
//! # Design Decisions
//! - Bootstrap is guarded by a `OnceCell`: concurrent first requests all wait
//!   for the same reconciliation and only one watcher is ever started
//! - An instance goes `Active` even when the first load fails; the watcher
//!   picks up a later fix to the file
//! - The watch task holds a `Weak` reference and a shutdown receiver, so
//!   dropping every `HotReload` handle stops it

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use axum::extract::{Request, State};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::Response;
use axum::Router;
use serde::Serialize;
use tokio::sync::{watch, OnceCell};

use crate::config::diff::KeyOrder;
use crate::config::loader::{ConfigFs, ConfigLoader, OsFs};
use crate::config::watcher::{ChangeEvent, ChangeNotifier, ChangeSubscription, NotifyWatcher};
use crate::proxy::{Forwarder, HttpForwarder};
use crate::reload::{ReconcileOutcome, Reconciler, ReloadError, ReloadNotifier, RouteSetManager};
use crate::routing::{dispatch_chain_middleware, DispatchChain};

/// Lifecycle of a hot-reload instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReloadState {
    Uninitialized,
    Active,
}

/// Point-in-time view of an instance, served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct HotReloadStatus {
    pub state: ReloadState,
    pub path: PathBuf,
    pub active_routes: usize,
    pub watching: bool,
}

/// Handle to one hot-reload instance. Clones share state.
#[derive(Debug, Clone)]
pub struct HotReload {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    reconciler: Reconciler,
    chain: Arc<DispatchChain>,
    watcher: Arc<dyn ChangeNotifier>,
    notifier: Option<ReloadNotifier>,
    bootstrap: OnceCell<()>,
    watching: AtomicBool,
    shutdown: watch::Sender<bool>,
}

impl HotReload {
    pub fn builder(path: impl Into<PathBuf>) -> HotReloadBuilder {
        HotReloadBuilder::new(path)
    }

    /// Mount the dispatch chain and the bootstrap middleware on `router`.
    ///
    /// Bootstrap runs first, then the chain, then `router`'s own routes.
    pub fn layer<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            .layer(from_fn_with_state(self.inner.chain.clone(), dispatch_chain_middleware))
            .layer(from_fn_with_state(self.clone(), hot_reload_middleware))
    }

    /// Bootstrap if this is the first call; later calls return immediately.
    pub async fn ensure_started(&self) {
        self.inner
            .bootstrap
            .get_or_init(|| async {
                let outcome = self.inner.reconciler.reconcile().await;
                tracing::info!(
                    path = %self.inner.reconciler.path().display(),
                    outcome = ?outcome,
                    "Proxy hot reload bootstrapped"
                );
                self.start_watcher();
            })
            .await;
    }

    fn start_watcher(&self) {
        match self.inner.watcher.subscribe(self.inner.reconciler.path()) {
            Ok(subscription) => {
                self.inner.watching.store(true, Ordering::Release);
                spawn_watch_task(&self.inner, subscription);
            }
            Err(e) => {
                let error = ReloadError::Watch(e);
                tracing::error!(
                    path = %self.inner.reconciler.path().display(),
                    error = %error,
                    "Route file changes will not be picked up"
                );
            }
        }
    }

    /// Run a reconciliation now, outside of any file event.
    pub async fn reconcile(&self) -> ReconcileOutcome {
        self.inner.reconciler.reconcile().await
    }

    pub fn state(&self) -> ReloadState {
        if self.inner.bootstrap.initialized() {
            ReloadState::Active
        } else {
            ReloadState::Uninitialized
        }
    }

    pub async fn status(&self) -> HotReloadStatus {
        HotReloadStatus {
            state: self.state(),
            path: self.path().to_path_buf(),
            active_routes: self.inner.reconciler.active_routes().await,
            watching: self.is_watching(),
        }
    }

    pub fn path(&self) -> &Path {
        self.inner.reconciler.path()
    }

    pub fn chain(&self) -> &Arc<DispatchChain> {
        &self.inner.chain
    }

    pub fn notifier(&self) -> Option<&ReloadNotifier> {
        self.inner.notifier.as_ref()
    }

    pub fn is_watching(&self) -> bool {
        self.inner.watching.load(Ordering::Acquire)
    }

    pub async fn active_routes(&self) -> usize {
        self.inner.reconciler.active_routes().await
    }

    /// Stop the watch task. Installed routes stay in place.
    pub fn shutdown(&self) {
        let _ = self.inner.shutdown.send(true);
    }
}

fn spawn_watch_task(inner: &Arc<Inner>, mut subscription: ChangeSubscription) {
    let weak: Weak<Inner> = Arc::downgrade(inner);
    let mut shutdown = inner.shutdown.subscribe();
    let path = inner.reconciler.path().to_path_buf();

    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                event = subscription.next() => event,
                _ = shutdown.changed() => break,
            };

            match event {
                Some(ChangeEvent::Changed) => {
                    let Some(inner) = weak.upgrade() else { break };
                    tracing::debug!(path = %path.display(), "Route file changed");
                    inner.reconciler.reconcile().await;
                }
                Some(other) => {
                    tracing::trace!(path = %path.display(), event = ?other, "Ignoring route file event");
                }
                None => break,
            }
        }

        if let Some(inner) = weak.upgrade() {
            inner.watching.store(false, Ordering::Release);
        }
        tracing::debug!(path = %path.display(), "Route file watcher stopped");
    });
}

/// Axum middleware: bootstrap on first use, then continue down the stack.
pub async fn hot_reload_middleware(
    State(hot_reload): State<HotReload>,
    req: Request,
    next: Next,
) -> Response {
    hot_reload.ensure_started().await;
    next.run(req).await
}

/// Builder for [`HotReload`].
#[derive(Debug)]
pub struct HotReloadBuilder {
    path: PathBuf,
    notifier: Option<ReloadNotifier>,
    fs: Arc<dyn ConfigFs>,
    watcher: Arc<dyn ChangeNotifier>,
    forwarder: Arc<dyn Forwarder>,
    key_order: KeyOrder,
}

impl HotReloadBuilder {
    fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            notifier: None,
            fs: Arc::new(OsFs),
            watcher: Arc::new(NotifyWatcher::default()),
            forwarder: Arc::new(HttpForwarder::default()),
            key_order: KeyOrder::default(),
        }
    }

    pub fn notifier(mut self, notifier: ReloadNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn fs(mut self, fs: Arc<dyn ConfigFs>) -> Self {
        self.fs = fs;
        self
    }

    pub fn watcher(mut self, watcher: Arc<dyn ChangeNotifier>) -> Self {
        self.watcher = watcher;
        self
    }

    pub fn forwarder(mut self, forwarder: Arc<dyn Forwarder>) -> Self {
        self.forwarder = forwarder;
        self
    }

    pub fn key_order(mut self, key_order: KeyOrder) -> Self {
        self.key_order = key_order;
        self
    }

    /// Create the instance. Routes are registered on `chain`.
    pub fn build(self, chain: Arc<DispatchChain>) -> HotReload {
        let loader = ConfigLoader::new(self.path, self.fs);
        let routes = RouteSetManager::new(chain.clone(), self.forwarder)
            .with_source(loader.path().display().to_string());
        let reconciler = Reconciler::new(loader, routes, self.key_order, self.notifier.clone());
        let (shutdown, _) = watch::channel(false);

        HotReload {
            inner: Arc::new(Inner {
                reconciler,
                chain,
                watcher: self.watcher,
                notifier: self.notifier,
                bootstrap: OnceCell::new(),
                watching: AtomicBool::new(false),
                shutdown,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    use crate::config::loader::MemoryFs;
    use crate::config::watcher::ManualNotifier;
    use crate::reload::ReloadEvent;

    const PATH: &str = "middleware-test/proxy.config.json";

    struct Fixture {
        fs: Arc<MemoryFs>,
        watcher: Arc<ManualNotifier>,
        notifier: ReloadNotifier,
        hot_reload: HotReload,
    }

    fn fixture() -> Fixture {
        let fs = Arc::new(MemoryFs::new());
        let watcher = Arc::new(ManualNotifier::new());
        let notifier = ReloadNotifier::new();
        let hot_reload = HotReload::builder(PATH)
            .fs(fs.clone())
            .watcher(watcher.clone())
            .notifier(notifier.clone())
            .build(Arc::new(DispatchChain::new()));
        Fixture { fs, watcher, notifier, hot_reload }
    }

    fn app(hot_reload: &HotReload) -> Router {
        hot_reload.layer(Router::new().route("/local", get(|| async { "local" })))
    }

    fn get_request(path: &str) -> HttpRequest<Body> {
        HttpRequest::builder().uri(path).body(Body::empty()).unwrap()
    }

    async fn wait_for_event(rx: &mut tokio::sync::broadcast::Receiver<ReloadEvent>) -> ReloadEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for reload")
            .unwrap()
    }

    #[tokio::test]
    async fn test_first_request_bootstraps() {
        let f = fixture();
        f.fs.write(PATH, r#"[{"context": ["/api"], "target": "http://localhost:3000"}]"#);
        let mut events = f.notifier.subscribe();
        assert_eq!(f.hot_reload.state(), ReloadState::Uninitialized);

        let response = app(&f.hot_reload).oneshot(get_request("/local")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        assert_eq!(f.hot_reload.state(), ReloadState::Active);
        assert!(f.hot_reload.is_watching());
        assert_eq!(f.hot_reload.chain().len(), 1);
        assert_eq!(events.try_recv().unwrap(), ReloadEvent::ProxyReloaded);
        assert_eq!(f.watcher.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_requests_start_one_watcher() {
        let f = fixture();
        f.fs.write(PATH, r#"{"/api": {"target": "http://localhost:3000"}}"#);
        let app = app(&f.hot_reload);

        let requests = (0..16).map(|_| app.clone().oneshot(get_request("/local")));
        for response in futures_util::future::join_all(requests).await {
            assert_eq!(response.unwrap().status(), StatusCode::OK);
        }

        assert_eq!(f.watcher.subscriber_count(), 1);
        assert_eq!(f.hot_reload.chain().len(), 1);
    }

    #[tokio::test]
    async fn test_change_event_reconciles() {
        let f = fixture();
        f.fs.write(PATH, r#"{"/api": {"target": "http://localhost:3000"}}"#);
        let mut events = f.notifier.subscribe();
        f.hot_reload.ensure_started().await;
        wait_for_event(&mut events).await;

        f.fs.write(
            PATH,
            r#"{"/api": {"target": "http://localhost:3000"}, "/v2": {"target": "http://localhost:3001"}}"#,
        );
        f.watcher.notify(ChangeEvent::Other);
        f.watcher.notify(ChangeEvent::Changed);

        assert_eq!(wait_for_event(&mut events).await, ReloadEvent::ProxyReloaded);
        assert_eq!(f.hot_reload.active_routes().await, 2);
    }

    /// Counts reads so tests can tell how many passes ran.
    #[derive(Debug)]
    struct CountingFs {
        inner: MemoryFs,
        reads: AtomicUsize,
    }

    impl ConfigFs for CountingFs {
        fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_to_string(path)
        }
    }

    #[tokio::test]
    async fn test_burst_of_changes_reconciles_once_per_event() {
        let fs = Arc::new(CountingFs { inner: MemoryFs::new(), reads: AtomicUsize::new(0) });
        let watcher = Arc::new(ManualNotifier::new());
        fs.inner.write(PATH, r#"[{"context": "/api", "target": "http://localhost:3000"}]"#);
        let hot_reload = HotReload::builder(PATH)
            .fs(fs.clone())
            .watcher(watcher.clone())
            .build(Arc::new(DispatchChain::new()));
        hot_reload.ensure_started().await;
        assert_eq!(fs.reads.load(Ordering::SeqCst), 1);
        let installed = hot_reload.chain().handlers();

        watcher.notify(ChangeEvent::Changed);
        watcher.notify(ChangeEvent::Changed);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while fs.reads.load(Ordering::SeqCst) < 3 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;

        // No coalescing: each event is its own pass, each one a no-op.
        assert_eq!(fs.reads.load(Ordering::SeqCst), 3);
        assert_eq!(hot_reload.reconcile().await, ReconcileOutcome::Unchanged);
        let after = hot_reload.chain().handlers();
        assert_eq!(after.len(), 1);
        assert!(crate::routing::chain::same_handler(&after[0], &installed[0]));
    }

    #[tokio::test]
    async fn test_failed_bootstrap_recovers_on_change() {
        let f = fixture();
        let mut events = f.notifier.subscribe();

        f.hot_reload.ensure_started().await;
        assert_eq!(f.hot_reload.state(), ReloadState::Active);
        assert!(f.hot_reload.chain().is_empty());

        f.fs.write(PATH, r#"[{"context": "/api", "target": "http://localhost:3000"}]"#);
        f.watcher.notify(ChangeEvent::Changed);

        assert_eq!(wait_for_event(&mut events).await, ReloadEvent::ProxyReloaded);
        assert_eq!(f.hot_reload.chain().len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_watcher() {
        let f = fixture();
        f.fs.write(PATH, "[]");
        f.hot_reload.ensure_started().await;
        assert_eq!(f.watcher.subscriber_count(), 1);

        f.hot_reload.shutdown();
        tokio::time::timeout(Duration::from_secs(2), async {
            while f.watcher.subscriber_count() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("watcher task did not stop");
        assert!(!f.hot_reload.is_watching());
    }
}
