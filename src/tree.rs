//! The tree handle: root ownership, memory accounting, reclamation.

use std::fmt;

use crate::children::ChildTable;
use crate::node::{Node, NO_SYMBOL};

/// Memory usage statistics for a tree, gathered by traversal.
///
/// The traversal is safe to run concurrently with writers; the numbers are a
/// point-in-time snapshot and can only lag behind ongoing insertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStats {
    /// Number of reachable nodes, root included.
    pub num_nodes: usize,
    /// Bytes held by node structures.
    pub node_bytes: usize,
    /// Bytes held by current child tables.
    pub table_bytes: usize,
    /// Bytes held by superseded child tables awaiting tree teardown.
    pub retired_table_bytes: usize,
}

impl MemoryStats {
    /// Total bytes across nodes and tables.
    pub fn total_bytes(&self) -> usize {
        self.node_bytes + self.table_bytes + self.retired_table_bytes
    }
}

/// A lock-free concurrent prefix tree.
///
/// Edges are labelled by positive 64-bit symbols; every node carries a 64-bit
/// signed counter. Traversal descends from [`root`](Tree::root) through
/// [`Node::at`], creating nodes on demand. All operations are linearizable
/// and lock-free; nodes are never reclaimed while the tree is alive.
pub struct Tree {
    root: Box<Node>,
}

impl Tree {
    /// An empty tree: a single root node with counter 0 and no children.
    pub fn new() -> Tree {
        Tree {
            root: Box::new(Node::new(NO_SYMBOL)),
        }
    }

    /// The fixed root node. The root is never replaced or grown away.
    #[inline]
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Number of reachable nodes, root included.
    pub fn node_count(&self) -> usize {
        self.memory_usage().num_nodes
    }

    /// Walk the current tables and tally nodes and table storage.
    pub fn memory_usage(&self) -> MemoryStats {
        let mut stats = MemoryStats::default();
        let mut pending: Vec<*const Node> = vec![self.root.as_ref() as *const Node];
        while let Some(node) = pending.pop() {
            stats.num_nodes += 1;
            stats.node_bytes += std::mem::size_of::<Node>();
            let table = unsafe { &*node }.children_table();
            if table.is_null() {
                continue;
            }
            let table = unsafe { &*table };
            stats.table_bytes += table.bytes();
            let mut retired = table.prev();
            while !retired.is_null() {
                let t = unsafe { &*retired };
                stats.retired_table_bytes += t.bytes();
                retired = t.prev();
            }
            pending.extend(table.occupied().map(|p| p as *const Node));
        }
        stats
    }
}

impl Default for Tree {
    fn default() -> Tree {
        Tree::new()
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("num_nodes", &self.node_count())
            .finish()
    }
}

impl Drop for Tree {
    fn drop(&mut self) {
        // `&mut self` guarantees no concurrent readers; reclaim with an
        // explicit stack rather than recursion so deep trees cannot overflow.
        let mut pending: Vec<*mut Node> = Vec::new();
        unsafe { release_table_chain(self.root.take_children(), &mut pending) };
        while let Some(node) = pending.pop() {
            let node = unsafe { Box::from_raw(node) };
            unsafe { release_table_chain(node.take_children(), &mut pending) };
        }
    }
}

/// Free `table` and its chain of superseded predecessors, queueing the child
/// nodes of the current table for reclamation.
///
/// # Safety
///
/// The caller must be the sole owner of the subtree: every node pointer in
/// the chain must be live, and no other thread may access it afterwards.
/// Occupied slots in superseded tables duplicate slots of the current table,
/// so children are queued from the current table only.
unsafe fn release_table_chain(table: *mut ChildTable, pending: &mut Vec<*mut Node>) {
    if table.is_null() {
        return;
    }
    let table = unsafe { Box::from_raw(table) };
    pending.extend(table.occupied());
    let mut retired = table.prev();
    drop(table);
    while !retired.is_null() {
        let t = unsafe { Box::from_raw(retired) };
        retired = t.prev();
    }
}
