//! # Graph Cache
//!
//! Project root -> most recently built graph.
//!
//! Entries are `Arc<BuiltGraph>`: a stored graph is never mutated, only
//! replaced, so a reader holding an `Arc` can never observe a partial
//! build. Readers share the lock; `set` and `invalidate` take it
//! exclusively for the length of one map operation.
//!
//! Each root carries an invalidation epoch. A builder reads the epoch before
//! loading its inputs and stores with [`GraphCache::set_if_current`], so a
//! mutation that lands mid-build is never papered over by the stale result.

use crate::build::BuiltGraph;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Explicit get/set/invalidate cache abstraction.
///
/// Implementations must be safe to share across threads. `invalidate` must
/// be synchronous: the next `get` for that root is a miss.
pub trait GraphCache: Send + Sync {
    /// Look up the graph for `root`. `None` is a miss.
    fn get(&self, root: &Path) -> Option<Arc<BuiltGraph>>;

    /// Store (or replace) the graph for `root`.
    fn set(&self, root: &Path, graph: Arc<BuiltGraph>);

    /// Drop the entry for `root`, if any, and advance its epoch.
    fn invalidate(&self, root: &Path);

    /// Number of invalidations seen for `root`.
    fn epoch(&self, root: &Path) -> u64;

    /// Store `graph` only if no invalidation of `root` happened since
    /// `epoch` was read. Returns whether it was stored.
    fn set_if_current(&self, root: &Path, epoch: u64, graph: Arc<BuiltGraph>) -> bool;
}

// =============================================================================
// SHARED CACHE
// =============================================================================

#[derive(Debug, Default)]
struct Entries {
    graphs: BTreeMap<PathBuf, Arc<BuiltGraph>>,
    epochs: BTreeMap<PathBuf, u64>,
}

impl Entries {
    fn epoch(&self, root: &Path) -> u64 {
        self.epochs.get(root).copied().unwrap_or(0)
    }
}

/// In-memory cache shared by every caller in the process.
#[derive(Debug, Default)]
pub struct SharedGraphCache {
    entries: RwLock<Entries>,
}

impl SharedGraphCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().graphs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().graphs.is_empty()
    }

    /// Drop every entry. Epochs survive so in-flight builds stay stale.
    pub fn clear(&self) {
        let mut entries = self.entries.write();
        let roots: Vec<PathBuf> = entries.graphs.keys().cloned().collect();
        entries.graphs.clear();
        for root in roots {
            let epoch = entries.epochs.entry(root).or_insert(0);
            *epoch = epoch.saturating_add(1);
        }
    }
}

impl GraphCache for SharedGraphCache {
    fn get(&self, root: &Path) -> Option<Arc<BuiltGraph>> {
        self.entries.read().graphs.get(root).cloned()
    }

    fn set(&self, root: &Path, graph: Arc<BuiltGraph>) {
        self.entries.write().graphs.insert(root.to_path_buf(), graph);
    }

    fn invalidate(&self, root: &Path) {
        let mut entries = self.entries.write();
        let epoch = entries.epochs.entry(root.to_path_buf()).or_insert(0);
        *epoch = epoch.saturating_add(1);
        if entries.graphs.remove(root).is_some() {
            tracing::info!(root = %root.display(), "graph cache invalidated");
        }
    }

    fn epoch(&self, root: &Path) -> u64 {
        self.entries.read().epoch(root)
    }

    fn set_if_current(&self, root: &Path, epoch: u64, graph: Arc<BuiltGraph>) -> bool {
        let mut entries = self.entries.write();
        if entries.epoch(root) != epoch {
            tracing::debug!(root = %root.display(), "discarding graph built before invalidation");
            return false;
        }
        entries.graphs.insert(root.to_path_buf(), graph);
        true
    }
}

// =============================================================================
// NO-OP CACHE
// =============================================================================

/// A cache that never stores anything. Every `get` is a miss.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopGraphCache;

impl GraphCache for NoopGraphCache {
    fn get(&self, _root: &Path) -> Option<Arc<BuiltGraph>> {
        None
    }

    fn set(&self, _root: &Path, _graph: Arc<BuiltGraph>) {}

    fn invalidate(&self, _root: &Path) {}

    fn epoch(&self, _root: &Path) -> u64 {
        0
    }

    fn set_if_current(&self, _root: &Path, _epoch: u64, _graph: Arc<BuiltGraph>) -> bool {
        false
    }
}

// =============================================================================
// TESTS
// =============================================================================
