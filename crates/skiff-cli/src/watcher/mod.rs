//! File system watcher.
//!
//! An explicitly owned watcher instance: roots are registered with a
//! delivery channel and removed with the returned handle; there is no
//! process-wide registry. Raw backend events are routed through an arena of
//! [`tree::WatchNode`]s that owns the coalescing rules (quiet window,
//! attribute filter, child-to-parent suppression) before a [`ChangeEvent`]
//! is emitted.
//!
//! Directory roots are scanned once at registration time, creating one
//! watch per existing subdirectory; every accepted write-class event
//! triggers a re-scan so newly created subdirectories are attached without
//! re-registration.

pub mod tree;

use notify::event::{EventKind, ModifyKind};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use tree::{EventClass, NodeId, NodeKind, Outcome, RootId, WatchTree};

/// What happened to a watched path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Path was created
    Created,
    /// Path content changed
    Modified,
    /// Path was removed
    Removed,
}

/// A coalesced change event, consumed once by the owning subscription.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    /// Path the backend reported
    pub source_path: PathBuf,
    /// When the event was accepted
    pub timestamp: Instant,
    /// Change classification
    pub kind: ChangeKind,
}

/// Handle returned by [`Watcher::register`], used to unregister the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchHandle(RootId);

struct Subscription {
    recursive: bool,
    tx: mpsc::Sender<ChangeEvent>,
}

struct Inner {
    backend: Option<RecommendedWatcher>,
    tree: WatchTree,
    subscriptions: HashMap<RootId, Subscription>,
    next_root: RootId,
}

/// Owned file system watcher.
///
/// Dropping the watcher releases every watch and stops event delivery.
pub struct Watcher {
    inner: Arc<Mutex<Inner>>,
}

impl Watcher {
    /// Create a watcher with its backend and dispatch thread.
    pub fn new() -> Result<Self, notify::Error> {
        let (raw_tx, raw_rx) = std::sync::mpsc::channel::<notify::Result<notify::Event>>();

        let backend = notify::recommended_watcher(move |res| {
            let _ = raw_tx.send(res);
        })?;

        let inner = Arc::new(Mutex::new(Inner {
            backend: Some(backend),
            tree: WatchTree::new(),
            subscriptions: HashMap::new(),
            next_root: 0,
        }));

        // Raw events are handled off the backend's callback so new watches
        // can be attached while an event is being processed.
        let dispatch = Arc::clone(&inner);
        std::thread::Builder::new()
            .name("skiff-watcher".to_string())
            .spawn(move || {
                while let Ok(result) = raw_rx.recv() {
                    match result {
                        Ok(event) => {
                            // Deliveries happen outside the arena lock so a
                            // slow receiver never stalls registration.
                            let deliveries = dispatch.lock().handle_event(event);
                            for (tx, change) in deliveries {
                                if tx.blocking_send(change).is_err() {
                                    tracing::debug!("change event receiver dropped");
                                }
                            }
                        }
                        Err(error) => tracing::warn!("watch backend error: {error}"),
                    }
                }
            })
            .map_err(notify::Error::io)?;

        Ok(Self { inner })
    }

    /// Register a root path.
    ///
    /// For a directory with `recursive` set, existing subdirectories are
    /// scanned and watched immediately. Accepted events are delivered to
    /// `tx`. A path whose watch handle cannot be opened degrades to a
    /// no-op: the returned handle is valid but delivers nothing.
    pub fn register(
        &self,
        path: &Path,
        recursive: bool,
        tx: mpsc::Sender<ChangeEvent>,
    ) -> WatchHandle {
        let mut inner = self.inner.lock();
        let root = inner.next_root;
        inner.next_root += 1;
        inner.subscriptions.insert(root, Subscription { recursive, tx });
        inner.attach(path, root, None, recursive);
        WatchHandle(root)
    }

    /// Release a root registration and every watch it owns.
    pub fn unregister(&self, handle: WatchHandle) {
        let mut inner = self.inner.lock();
        inner.subscriptions.remove(&handle.0);
        let released = inner.tree.remove_root(handle.0);
        if let Some(backend) = inner.backend.as_mut() {
            for path in released {
                let _ = backend.unwatch(&path);
            }
        }
    }

    /// Whether a path currently has a watch node.
    pub fn is_watching(&self, path: &Path) -> bool {
        self.inner.lock().tree.contains(path)
    }

    /// Release all watches and stop the dispatch thread.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.backend = None;
        inner.subscriptions.clear();
        inner.tree = WatchTree::new();
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Inner {
    /// Attach a watch for `path`, and for its subdirectories when
    /// registering recursively.
    fn attach(&mut self, path: &Path, root: RootId, parent: Option<NodeId>, recursive: bool) {
        if self.tree.contains(path) {
            return;
        }

        let kind = if path.is_dir() {
            NodeKind::Directory
        } else {
            NodeKind::File
        };

        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        if let Err(error) = backend.watch(path, RecursiveMode::NonRecursive) {
            // Not fatal: the path is simply unwatched.
            tracing::debug!("unable to watch {}: {error}", path.display());
            return;
        }

        let id = match self.tree.insert(path.to_path_buf(), kind, root, parent) {
            Some(id) => id,
            None => return,
        };

        if kind == NodeKind::Directory && recursive {
            self.scan_subdirectories(path.to_path_buf(), id, root);
        }
    }

    /// Watch subdirectories of `path` that have no node yet.
    fn scan_subdirectories(&mut self, path: PathBuf, parent: NodeId, root: RootId) {
        let Ok(entries) = std::fs::read_dir(&path) else {
            return;
        };
        for entry in entries.flatten() {
            let child = entry.path();
            if child.is_dir() && !self.tree.contains(&child) {
                self.attach(&child, root, Some(parent), true);
            }
        }
    }

    /// Route one raw event through the arena.
    ///
    /// Returns the accepted deliveries; the caller sends them after
    /// releasing the lock.
    fn handle_event(
        &mut self,
        event: notify::Event,
    ) -> Vec<(mpsc::Sender<ChangeEvent>, ChangeEvent)> {
        let class = classify(&event.kind);
        if class == EventClass::Other {
            return Vec::new();
        }
        let change = change_kind(&event.kind);
        let now = Instant::now();
        let mut deliveries = Vec::new();

        for path in &event.paths {
            let Some(id) = self.tree.find_target(path) else {
                continue;
            };
            match self.tree.evaluate(id, class, now) {
                Outcome::Drop => {}
                Outcome::Accept { rescan } => {
                    if let Some(delivery) = self.accepted(id, path.clone(), change, now) {
                        deliveries.push(delivery);
                    }
                    if rescan {
                        self.rescan(id);
                    }
                }
            }
        }
        deliveries
    }

    fn accepted(
        &self,
        id: NodeId,
        source_path: PathBuf,
        kind: ChangeKind,
        timestamp: Instant,
    ) -> Option<(mpsc::Sender<ChangeEvent>, ChangeEvent)> {
        let node = self.tree.get(id)?;
        let subscription = self.subscriptions.get(&node.root)?;
        let event = ChangeEvent {
            source_path,
            timestamp,
            kind,
        };
        Some((subscription.tx.clone(), event))
    }

    /// Pick up subdirectories created since the last scan.
    fn rescan(&mut self, id: NodeId) {
        let Some(node) = self.tree.get(id) else {
            return;
        };
        if node.kind != NodeKind::Directory {
            return;
        }
        let root = node.root;
        let path = node.path.clone();
        let recursive = self
            .subscriptions
            .get(&root)
            .is_some_and(|s| s.recursive);
        if recursive {
            self.scan_subdirectories(path, id, root);
        }
    }
}

fn classify(kind: &EventKind) -> EventClass {
    match kind {
        EventKind::Modify(ModifyKind::Metadata(_)) => EventClass::AttributeOnly,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(_) => EventClass::Write,
        EventKind::Access(_) | EventKind::Any | EventKind::Other => EventClass::Other,
    }
}

fn change_kind(kind: &EventKind) -> ChangeKind {
    match kind {
        EventKind::Create(_) => ChangeKind::Created,
        EventKind::Remove(_) => ChangeKind::Removed,
        _ => ChangeKind::Modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, RemoveKind};

    #[test]
    fn metadata_touch_is_attribute_only() {
        let kind = EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any));
        assert_eq!(classify(&kind), EventClass::AttributeOnly);
    }

    #[test]
    fn content_events_are_write_class() {
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File)),
            EventClass::Write
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File)),
            EventClass::Write
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            EventClass::Write
        );
    }

    #[test]
    fn access_events_are_ignored() {
        assert_eq!(
            classify(&EventKind::Access(AccessKind::Read)),
            EventClass::Other
        );
    }

    #[test]
    fn change_kind_mapping() {
        assert_eq!(
            change_kind(&EventKind::Create(CreateKind::File)),
            ChangeKind::Created
        );
        assert_eq!(
            change_kind(&EventKind::Remove(RemoveKind::File)),
            ChangeKind::Removed
        );
        assert_eq!(
            change_kind(&EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            ChangeKind::Modified
        );
    }

    #[tokio::test]
    async fn register_missing_path_is_a_no_op() {
        let watcher = Watcher::new().unwrap();
        let (tx, mut rx) = mpsc::channel(16);

        let handle = watcher.register(Path::new("/definitely/not/here"), true, tx);
        assert!(!watcher.is_watching(Path::new("/definitely/not/here")));

        // No event delivery for the failed registration.
        assert!(rx.try_recv().is_err());
        watcher.unregister(handle);
    }
}
