//! Arena of watched nodes.
//!
//! One node per live OS watch handle, indexed by numeric id; parents are
//! referenced by id so the tree has no ownership cycles. Children belong to
//! their root registration and are released together with it.
//!
//! The arena also owns the event-acceptance rules: the per-node quiet
//! window, the attribute-only filter for file nodes, and child-to-parent
//! suppression so a write reported by the OS at multiple levels fires once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Repeated events on the same node inside this window are dropped.
pub const QUIET_WINDOW: Duration = Duration::from_secs(1);

/// Identifier of a node in the arena.
pub type NodeId = u64;

/// Identifier of a root registration (subscription).
pub type RootId = u64;

/// What a node points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A single watched file
    File,
    /// A watched directory
    Directory,
}

/// Classification of a raw filesystem event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// Metadata touch without a content write
    AttributeOnly,
    /// Content write, create, remove or rename
    Write,
    /// Anything else the backend reports
    Other,
}

/// Decision for one raw event on one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Suppressed; nothing is emitted
    Drop,
    /// Emit a change event; `rescan` asks the caller to scan the directory
    /// for newly created subdirectories and attach watches to them
    Accept {
        /// Scan for new subdirectories after emitting
        rescan: bool,
    },
}

/// One watched filesystem path.
#[derive(Debug)]
pub struct WatchNode {
    /// Absolute path of the watch
    pub path: PathBuf,
    /// File or directory
    pub kind: NodeKind,
    /// Owning root registration
    pub root: RootId,
    /// Parent node, by id
    pub parent: Option<NodeId>,
    /// Child nodes, directories only
    pub children: Vec<NodeId>,
    /// When the last event on this node was accepted
    last_accepted: Option<Instant>,
    /// Set when a child fired; suppresses this node's own event for the
    /// same logical write, self-clearing after the quiet window
    child_changed_at: Option<Instant>,
}

/// Arena of watch nodes with a path index.
#[derive(Debug, Default)]
pub struct WatchTree {
    nodes: HashMap<NodeId, WatchNode>,
    by_path: HashMap<PathBuf, NodeId>,
    next_id: NodeId,
}

impl WatchTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether a path already has a node.
    pub fn contains(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    /// Insert a node, linking it to its parent.
    ///
    /// Returns `None` when the path is already watched; the invariant is
    /// exactly one node per live watch handle.
    pub fn insert(
        &mut self,
        path: PathBuf,
        kind: NodeKind,
        root: RootId,
        parent: Option<NodeId>,
    ) -> Option<NodeId> {
        if self.by_path.contains_key(&path) {
            return None;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.by_path.insert(path.clone(), id);
        self.nodes.insert(
            id,
            WatchNode {
                path,
                kind,
                root,
                parent,
                children: Vec::new(),
                last_accepted: None,
                child_changed_at: None,
            },
        );
        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                parent_node.children.push(id);
            }
        }
        Some(id)
    }

    /// Access a node.
    pub fn get(&self, id: NodeId) -> Option<&WatchNode> {
        self.nodes.get(&id)
    }

    /// Remove every node owned by a root registration.
    ///
    /// Returns the paths whose OS watch handles must be released.
    pub fn remove_root(&mut self, root: RootId) -> Vec<PathBuf> {
        let doomed: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.root == root)
            .map(|(id, _)| *id)
            .collect();

        let mut paths = Vec::with_capacity(doomed.len());
        for id in doomed {
            if let Some(node) = self.nodes.remove(&id) {
                self.by_path.remove(&node.path);
                paths.push(node.path);
            }
        }
        paths
    }

    /// Find the node a raw event belongs to: the event path itself, or the
    /// directory containing it.
    pub fn find_target(&self, event_path: &Path) -> Option<NodeId> {
        if let Some(id) = self.by_path.get(event_path) {
            return Some(*id);
        }
        event_path
            .parent()
            .and_then(|dir| self.by_path.get(dir))
            .copied()
    }

    /// Decide what to do with a raw event on a node.
    pub fn evaluate(&mut self, id: NodeId, class: EventClass, now: Instant) -> Outcome {
        let Some(node) = self.nodes.get(&id) else {
            return Outcome::Drop;
        };

        // Quiet window, measured from the previous accepted event.
        if let Some(last) = node.last_accepted {
            if now.duration_since(last) < QUIET_WINDOW {
                return Outcome::Drop;
            }
        }

        let kind = node.kind;
        let parent = node.parent;

        match kind {
            NodeKind::File => {
                // The containing directory will usually see the same write;
                // flag it before deciding whether this event survives.
                self.mark_child_changed(parent, now);
                if class == EventClass::AttributeOnly {
                    return Outcome::Drop;
                }
                self.touch(id, now);
                Outcome::Accept { rescan: false }
            }
            NodeKind::Directory => {
                if self.consume_child_changed(id, now) {
                    return Outcome::Drop;
                }
                self.mark_child_changed(parent, now);
                self.touch(id, now);
                Outcome::Accept {
                    rescan: class == EventClass::Write,
                }
            }
        }
    }

    fn touch(&mut self, id: NodeId, now: Instant) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.last_accepted = Some(now);
        }
    }

    fn mark_child_changed(&mut self, parent: Option<NodeId>, now: Instant) {
        if let Some(parent_id) = parent {
            if let Some(parent_node) = self.nodes.get_mut(&parent_id) {
                parent_node.child_changed_at = Some(now);
            }
        }
    }

    /// Check and clear the suppression flag, honoring its self-expiry.
    fn consume_child_changed(&mut self, id: NodeId, now: Instant) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        match node.child_changed_at.take() {
            Some(at) => now.duration_since(at) < QUIET_WINDOW,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_with_dir() -> (WatchTree, NodeId) {
        let mut tree = WatchTree::new();
        let id = tree
            .insert(PathBuf::from("/proj/Sources"), NodeKind::Directory, 1, None)
            .unwrap();
        (tree, id)
    }

    #[test]
    fn one_node_per_path() {
        let (mut tree, _) = tree_with_dir();
        assert!(tree
            .insert(PathBuf::from("/proj/Sources"), NodeKind::Directory, 2, None)
            .is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn quiet_window_drops_second_event() {
        let (mut tree, id) = tree_with_dir();
        let t0 = Instant::now();

        assert_eq!(
            tree.evaluate(id, EventClass::Write, t0),
            Outcome::Accept { rescan: true }
        );
        // 200 ms later: inside the window.
        assert_eq!(
            tree.evaluate(id, EventClass::Write, t0 + Duration::from_millis(200)),
            Outcome::Drop
        );
        // Past the window: accepted again.
        assert_eq!(
            tree.evaluate(id, EventClass::Write, t0 + Duration::from_millis(1200)),
            Outcome::Accept { rescan: true }
        );
    }

    #[test]
    fn quiet_window_is_not_sliding() {
        let (mut tree, id) = tree_with_dir();
        let t0 = Instant::now();

        tree.evaluate(id, EventClass::Write, t0);
        // Dropped events do not extend the window.
        tree.evaluate(id, EventClass::Write, t0 + Duration::from_millis(900));
        assert_eq!(
            tree.evaluate(id, EventClass::Write, t0 + Duration::from_millis(1100)),
            Outcome::Accept { rescan: true }
        );
    }

    #[test]
    fn attribute_only_filtered_for_files() {
        let mut tree = WatchTree::new();
        let id = tree
            .insert(PathBuf::from("/proj/Package.swift"), NodeKind::File, 1, None)
            .unwrap();

        assert_eq!(
            tree.evaluate(id, EventClass::AttributeOnly, Instant::now()),
            Outcome::Drop
        );
        assert_eq!(
            tree.evaluate(id, EventClass::Write, Instant::now()),
            Outcome::Accept { rescan: false }
        );
    }

    #[test]
    fn child_event_suppresses_parent() {
        let mut tree = WatchTree::new();
        let parent = tree
            .insert(PathBuf::from("/proj/Sources"), NodeKind::Directory, 1, None)
            .unwrap();
        let child = tree
            .insert(
                PathBuf::from("/proj/Sources/App"),
                NodeKind::Directory,
                1,
                Some(parent),
            )
            .unwrap();

        let t0 = Instant::now();
        assert_eq!(
            tree.evaluate(child, EventClass::Write, t0),
            Outcome::Accept { rescan: true }
        );
        // The OS reports the same write on the parent directory too.
        assert_eq!(
            tree.evaluate(parent, EventClass::Write, t0 + Duration::from_millis(10)),
            Outcome::Drop
        );
        // Flag was consumed; a later independent write on the parent fires.
        assert_eq!(
            tree.evaluate(parent, EventClass::Write, t0 + Duration::from_millis(20)),
            Outcome::Accept { rescan: true }
        );
    }

    #[test]
    fn suppression_flag_expires() {
        let mut tree = WatchTree::new();
        let parent = tree
            .insert(PathBuf::from("/proj/Sources"), NodeKind::Directory, 1, None)
            .unwrap();
        let child = tree
            .insert(
                PathBuf::from("/proj/Sources/App"),
                NodeKind::Directory,
                1,
                Some(parent),
            )
            .unwrap();

        let t0 = Instant::now();
        tree.evaluate(child, EventClass::Write, t0);
        // Two seconds later the stale flag no longer suppresses the parent.
        assert_eq!(
            tree.evaluate(parent, EventClass::Write, t0 + Duration::from_secs(2)),
            Outcome::Accept { rescan: true }
        );
    }

    #[test]
    fn find_target_prefers_exact_match() {
        let mut tree = WatchTree::new();
        let dir = tree
            .insert(PathBuf::from("/proj/Sources"), NodeKind::Directory, 1, None)
            .unwrap();
        let file = tree
            .insert(
                PathBuf::from("/proj/Sources/main.swift"),
                NodeKind::File,
                2,
                None,
            )
            .unwrap();

        assert_eq!(
            tree.find_target(Path::new("/proj/Sources/main.swift")),
            Some(file)
        );
        // Unwatched file inside a watched directory resolves to the directory.
        assert_eq!(
            tree.find_target(Path::new("/proj/Sources/other.swift")),
            Some(dir)
        );
        assert_eq!(tree.find_target(Path::new("/elsewhere/x")), None);
    }

    #[test]
    fn remove_root_releases_only_its_nodes() {
        let mut tree = WatchTree::new();
        let a = tree
            .insert(PathBuf::from("/proj/Sources"), NodeKind::Directory, 1, None)
            .unwrap();
        tree.insert(
            PathBuf::from("/proj/Sources/App"),
            NodeKind::Directory,
            1,
            Some(a),
        );
        tree.insert(PathBuf::from("/proj/entrypoint"), NodeKind::Directory, 2, None);

        let released = tree.remove_root(1);
        assert_eq!(released.len(), 2);
        assert_eq!(tree.len(), 1);
        assert!(tree.contains(Path::new("/proj/entrypoint")));
        assert!(!tree.contains(Path::new("/proj/Sources")));
    }
}
