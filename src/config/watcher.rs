//! Route file change notification.
//!
//! The reconciler only needs "the file at this path changed"; how that is
//! detected is a [`ChangeNotifier`]. [`NotifyWatcher`] uses the platform's
//! file events through `notify`; [`ManualNotifier`] is driven by the program
//! (a push-based config service, an admin endpoint, tests).

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use notify::event::{ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// A change reported for the watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// The contents at the path changed. Triggers a reconciliation.
    Changed,
    /// The file was moved away from the path.
    Renamed,
    /// Anything else (access, metadata, removal).
    Other,
}

/// A live subscription. Dropping it stops the underlying watch.
pub struct ChangeSubscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    _guard: Option<Box<dyn Any + Send>>,
}

impl ChangeSubscription {
    /// Wrap a receiver, keeping `guard` alive for as long as the subscription.
    pub fn new(events: mpsc::UnboundedReceiver<ChangeEvent>, guard: impl Any + Send) -> Self {
        Self {
            events,
            _guard: Some(Box::new(guard)),
        }
    }

    pub fn from_receiver(events: mpsc::UnboundedReceiver<ChangeEvent>) -> Self {
        Self { events, _guard: None }
    }

    /// Next event, or `None` once the source is gone.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }
}

impl fmt::Debug for ChangeSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeSubscription").finish_non_exhaustive()
    }
}

/// Source of change notifications for a route file.
pub trait ChangeNotifier: Send + Sync + fmt::Debug {
    fn subscribe(&self, path: &Path) -> Result<ChangeSubscription, notify::Error>;
}

/// File watcher backed by `notify`.
///
/// Watches the parent directory so editors that save by writing a temp file
/// and renaming it over the original keep producing events.
#[derive(Debug, Clone)]
pub struct NotifyWatcher {
    poll_interval: Duration,
}

impl NotifyWatcher {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

impl Default for NotifyWatcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

impl ChangeNotifier for NotifyWatcher {
    fn subscribe(&self, path: &Path) -> Result<ChangeSubscription, notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        let target = path.to_path_buf();
        let dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let filter_target = target.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !event.paths.iter().any(|p| same_file_name(p, &filter_target)) {
                        return;
                    }
                    let change = classify(&event.kind);
                    tracing::trace!(path = ?filter_target, kind = ?event.kind, change = ?change, "Route file event");
                    let _ = tx.send(change);
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(self.poll_interval),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?target, "Route file watcher started");
        Ok(ChangeSubscription::new(rx, watcher))
    }
}

fn same_file_name(candidate: &Path, target: &Path) -> bool {
    candidate == target || (candidate.file_name().is_some() && candidate.file_name() == target.file_name())
}

/// Map a `notify` event kind onto the three cases the reconciler cares about.
fn classify(kind: &EventKind) -> ChangeEvent {
    match kind {
        EventKind::Create(_) => ChangeEvent::Changed,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeEvent::Renamed,
        // A file renamed onto the path is new content at the path.
        EventKind::Modify(ModifyKind::Name(_)) => ChangeEvent::Changed,
        EventKind::Modify(ModifyKind::Metadata(_)) => ChangeEvent::Other,
        EventKind::Modify(_) => ChangeEvent::Changed,
        _ => ChangeEvent::Other,
    }
}

/// Notifier driven explicitly by [`ManualNotifier::notify`].
#[derive(Debug, Default)]
pub struct ManualNotifier {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ChangeEvent>>>,
}

impl ManualNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `event` to every live subscription.
    pub fn notify(&self, event: ChangeEvent) {
        let mut subscribers = self.subscribers.lock().expect("notifier mutex poisoned");
        subscribers.retain(|tx| tx.send(event).is_ok());
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.subscribers.lock().expect("notifier mutex poisoned");
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }
}

impl ChangeNotifier for ManualNotifier {
    fn subscribe(&self, path: &Path) -> Result<ChangeSubscription, notify::Error> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().expect("notifier mutex poisoned").push(tx);
        tracing::debug!(path = ?path, "Manual change subscription registered");
        Ok(ChangeSubscription::from_receiver(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};

    #[test]
    fn test_classify() {
        assert_eq!(classify(&EventKind::Create(CreateKind::File)), ChangeEvent::Changed);
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            ChangeEvent::Changed
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::To))),
            ChangeEvent::Changed
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::From))),
            ChangeEvent::Renamed
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions))),
            ChangeEvent::Other
        );
        assert_eq!(classify(&EventKind::Access(AccessKind::Any)), ChangeEvent::Other);
        assert_eq!(classify(&EventKind::Remove(RemoveKind::File)), ChangeEvent::Other);
    }

    #[test]
    fn test_same_file_name() {
        let target = Path::new("/tmp/conf/proxy.config.json");
        assert!(same_file_name(Path::new("/tmp/conf/proxy.config.json"), target));
        assert!(same_file_name(Path::new("/private/tmp/conf/proxy.config.json"), target));
        assert!(!same_file_name(Path::new("/tmp/conf/other.json"), target));
    }

    #[tokio::test]
    async fn test_manual_notifier_fans_out() {
        let notifier = ManualNotifier::new();
        let mut a = notifier.subscribe(Path::new("/routes.json")).unwrap();
        let mut b = notifier.subscribe(Path::new("/routes.json")).unwrap();
        assert_eq!(notifier.subscriber_count(), 2);

        notifier.notify(ChangeEvent::Changed);
        assert_eq!(a.next().await, Some(ChangeEvent::Changed));
        assert_eq!(b.next().await, Some(ChangeEvent::Changed));

        drop(b);
        assert_eq!(notifier.subscriber_count(), 1);
    }
}
