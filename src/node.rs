//! Tree nodes: one atomic counter and one child table each.
//!
//! A node is the only durable handle the tree hands out. References obtained
//! through [`Node::at`] stay valid for the lifetime of the tree and can be
//! retained and shared freely across threads.

use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicI64, AtomicPtr, Ordering};

use crate::children::{ChildTable, SlotOutcome};
use crate::Error;

/// Reserved "no symbol" value: the empty-slot marker and the root's key.
pub(crate) const NO_SYMBOL: u64 = 0;

/// A vertex of the prefix tree.
///
/// Holds a 64-bit signed counter and the table of outgoing edges. All methods
/// take `&self` and are safe to call from any number of threads concurrently.
pub struct Node {
    /// Symbol on the incoming edge; immutable after creation.
    key: u64,
    value: AtomicI64,
    /// Null while the node has no children (the Empty representation).
    children: AtomicPtr<ChildTable>,
}

impl Node {
    pub(crate) fn new(key: u64) -> Node {
        Node {
            key,
            value: AtomicI64::new(0),
            children: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// The symbol on this node's incoming edge, or `0` for the root.
    #[inline]
    pub fn key(&self) -> u64 {
        self.key
    }

    /// The current counter value.
    #[inline]
    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    /// Synonym of [`value`](Node::value).
    #[inline]
    pub fn get(&self) -> i64 {
        self.value()
    }

    /// Overwrite the counter.
    #[inline]
    pub fn set_value(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Atomically increment the counter by one.
    #[inline]
    pub fn inc_value(&self) {
        self.value.fetch_add(1, Ordering::AcqRel);
    }

    /// Atomically increment the counter by one and return the new value.
    #[inline]
    pub fn increment_and_get(&self) -> i64 {
        self.value.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// The child of this node under `symbol`, created with counter 0 if it
    /// does not exist yet. All callers racing on the same symbol receive the
    /// same child.
    ///
    /// # Panics
    ///
    /// Panics if `symbol` is the reserved value `0`. Use
    /// [`try_at`](Node::try_at) for a fallible variant.
    pub fn at(&self, symbol: u64) -> &Node {
        match self.try_at(symbol) {
            Ok(child) => child,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible variant of [`at`](Node::at): rejects the reserved symbol `0`
    /// without modifying the tree.
    pub fn try_at(&self, symbol: u64) -> Result<&Node, Error> {
        if symbol == NO_SYMBOL {
            return Err(Error::InvalidSymbol { symbol });
        }
        // Speculative child, allocated at most once and reused across
        // retries; dropped unused when an existing child wins.
        let mut spare: Option<Box<Node>> = None;
        let child = loop {
            let table = self.children.load(Ordering::Acquire);
            if table.is_null() {
                match self.install_first_table(symbol, &mut spare) {
                    Some(child) => break child,
                    None => continue,
                }
            }
            match unsafe { &*table }.get_or_insert(symbol, &mut spare) {
                SlotOutcome::Found(p) | SlotOutcome::Inserted(p) => break p,
                SlotOutcome::Grow => self.grow(table),
            }
        };
        // The child lives until the tree is dropped, which outlives `self`.
        Ok(unsafe { &*child })
    }

    /// Empty -> Linear(2) transition: publish a fresh table that already
    /// contains the new child. Returns the child on success.
    fn install_first_table(&self, symbol: u64, spare: &mut Option<Box<Node>>) -> Option<*mut Node> {
        let child = Box::into_raw(
            spare
                .take()
                .unwrap_or_else(|| Box::new(Node::new(symbol))),
        );
        let table = Box::into_raw(ChildTable::initial(child));
        match self.children.compare_exchange(
            ptr::null_mut(),
            table,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Some(child),
            Err(_) => {
                // Lost the race for the first table; reclaim both pieces. The
                // discarded table does not own the child it references.
                drop(unsafe { Box::from_raw(table) });
                *spare = Some(unsafe { Box::from_raw(child) });
                None
            }
        }
    }

    /// Replace `old` with its grown successor. Any thread that finds the
    /// table full or frozen performs the growth itself, so a stalled grower
    /// never blocks anyone.
    fn grow(&self, old: *mut ChildTable) {
        if self.children.load(Ordering::Acquire) != old {
            // Someone already advanced past this table.
            return;
        }
        let old_ref = unsafe { &*old };
        let children = old_ref.freeze();
        let successor = Box::into_raw(old_ref.grown(&children));
        if self
            .children
            .compare_exchange(old, successor, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // A concurrent grower published first; its successor holds every
            // child, ours owns nothing and can be dropped whole.
            drop(unsafe { Box::from_raw(successor) });
        }
    }

    /// Detach and return the current child table. Only used during tree
    /// teardown, when no other thread can hold a reference.
    pub(crate) fn take_children(&self) -> *mut ChildTable {
        self.children.swap(ptr::null_mut(), Ordering::Relaxed)
    }

    pub(crate) fn children_table(&self) -> *mut ChildTable {
        self.children.load(Ordering::Acquire)
    }

    /// Current (representation, capacity) of the child table, if any.
    #[cfg(test)]
    pub(crate) fn children_shape(&self) -> Option<(crate::children::Repr, usize)> {
        let table = self.children_table();
        if table.is_null() {
            None
        } else {
            let table = unsafe { &*table };
            Some((table.repr(), table.capacity()))
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("key", &self.key)
            .field("value", &self.value())
            .finish_non_exhaustive()
    }
}
