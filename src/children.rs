//! Child-table representations.
//!
//! A node's child set lives in one of three representations that only ever
//! advance as the set grows:
//!
//! - **Empty**: a null table pointer; no allocation at all.
//! - **Linear**: a small array scanned front to back (capacities 2, 4, 8).
//! - **Hash**: an open-addressed power-of-two array with linear probing
//!   (capacity 16 and up, doubling).
//!
//! A slot is a single word, an `AtomicPtr<Node>`; the node stores its own key,
//! so installing a child is one compare-exchange and readers never observe a
//! half-written (symbol, pointer) pair. Slot states:
//!
//! - null: unused
//! - [`FROZEN`]: poisoned while the table is being replaced
//! - anything else: an occupied slot whose key is `(*node).key()`
//!
//! Occupied slots are immutable. The only transitions a slot can make are
//! null -> occupied (an insertion) and null -> `FROZEN` (a growth freezing the
//! table), which is what makes the growth protocol safe without coordination
//! between concurrent growers.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::node::Node;

/// Linear tables start at this capacity.
pub(crate) const INITIAL_LINEAR_CAPACITY: usize = 2;

/// Largest linear table; the next growth switches to the hash representation.
pub(crate) const MAX_LINEAR_CAPACITY: usize = 8;

/// Capacity of the first hash table. Must be a power of two.
pub(crate) const INITIAL_HASH_CAPACITY: usize = 16;

/// Sentinel stored in a slot to reject insertions while the table is being
/// replaced. Live nodes are heap allocations aligned to at least 8 bytes, so
/// address 1 can never collide with one.
pub(crate) const FROZEN: *mut Node = 1 as *mut Node;

/// Scrambles a symbol into a hash-table index base.
///
/// This is the 64-bit finalizer from MurmurHash3: a bijection over `u64`, so
/// distinct symbols never collapse to one hash. The identity map would do
/// fine on dense sequential symbols but degenerates into one long probe
/// cluster on strided workloads, which flat profiling alphabets are full of.
#[inline]
pub(crate) fn mix64(mut x: u64) -> u64 {
    x ^= x >> 33;
    x = x.wrapping_mul(0xff51_afd7_ed55_8ccd);
    x ^= x >> 33;
    x = x.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    x ^= x >> 33;
    x
}

/// Longest probe sequence tolerated before a hash table grows.
///
/// Scales with the logarithm of the capacity, tracking the expected longest
/// cluster of an open-addressed table at moderate load.
#[inline]
pub(crate) fn probe_limit(capacity: usize) -> usize {
    (2 * capacity.trailing_zeros() as usize).max(8)
}

/// Which layout a table's slot array uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Repr {
    /// Front-to-back scan, first null slot ends the used region.
    Linear,
    /// Open addressing from `mix64(key) & mask` with linear probing.
    Hash,
}

/// Result of a lookup-or-claim pass over a table.
pub(crate) enum SlotOutcome {
    /// The key was already present; the pointer is its child node.
    Found(*mut Node),
    /// The calling thread installed this child node.
    Inserted(*mut Node),
    /// The table is full or frozen; the caller must grow it and retry.
    Grow,
}

/// A node's child table in either the linear or the hash layout.
pub(crate) struct ChildTable {
    repr: Repr,
    slots: Box<[AtomicPtr<Node>]>,
    /// Table this one replaced, or null for a node's first table. Superseded
    /// tables stay readable for late readers and are reclaimed with the tree.
    prev: *mut ChildTable,
}

// The raw `prev` pointer is written once, before the table is published, and
// only read afterwards.
unsafe impl Send for ChildTable {}
unsafe impl Sync for ChildTable {}

impl ChildTable {
    fn with_capacity(repr: Repr, capacity: usize, prev: *mut ChildTable) -> Box<ChildTable> {
        let slots = (0..capacity)
            .map(|_| AtomicPtr::new(ptr::null_mut()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Box::new(ChildTable { repr, slots, prev })
    }

    /// The table installed when a node gains its first child: a Linear(2)
    /// already holding `child` in slot 0. Plain stores are fine here; the
    /// table is private until the caller publishes it with a release CAS.
    pub(crate) fn initial(child: *mut Node) -> Box<ChildTable> {
        let table = Self::with_capacity(Repr::Linear, INITIAL_LINEAR_CAPACITY, ptr::null_mut());
        table.slots[0].store(child, Ordering::Relaxed);
        table
    }

    #[inline]
    pub(crate) fn repr(&self) -> Repr {
        self.repr
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn prev(&self) -> *mut ChildTable {
        self.prev
    }

    /// Heap footprint of this table, slot array included.
    pub(crate) fn bytes(&self) -> usize {
        std::mem::size_of::<ChildTable>()
            + self.slots.len() * std::mem::size_of::<AtomicPtr<Node>>()
    }

    /// Occupied child pointers, in slot order.
    pub(crate) fn occupied(&self) -> impl Iterator<Item = *mut Node> + '_ {
        self.slots
            .iter()
            .map(|slot| slot.load(Ordering::Acquire))
            .filter(|&p| !p.is_null() && p != FROZEN)
    }

    /// Look up `key`, claiming the appropriate unused slot for a new child if
    /// it is absent. `spare` carries a speculative node between retries so a
    /// single `at` call allocates at most once.
    pub(crate) fn get_or_insert(&self, key: u64, spare: &mut Option<Box<Node>>) -> SlotOutcome {
        match self.repr {
            Repr::Linear => self.linear_get_or_insert(key, spare),
            Repr::Hash => self.hash_get_or_insert(key, spare),
        }
    }

    fn linear_get_or_insert(&self, key: u64, spare: &mut Option<Box<Node>>) -> SlotOutcome {
        for slot in self.slots.iter() {
            if let Some(outcome) = resolve_slot(slot, key, spare) {
                return outcome;
            }
        }
        SlotOutcome::Grow
    }

    fn hash_get_or_insert(&self, key: u64, spare: &mut Option<Box<Node>>) -> SlotOutcome {
        let mask = self.slots.len() - 1;
        let mut index = mix64(key) as usize & mask;
        for _ in 0..probe_limit(self.slots.len()) {
            if let Some(outcome) = resolve_slot(&self.slots[index], key, spare) {
                return outcome;
            }
            index = (index + 1) & mask;
        }
        SlotOutcome::Grow
    }

    /// Freeze pass: poisons every unused slot with [`FROZEN`] and returns the
    /// occupied children. Once the pass completes no insertion can succeed in
    /// this table, so the returned set is complete and final.
    pub(crate) fn freeze(&self) -> Vec<*mut Node> {
        let mut children = Vec::with_capacity(self.slots.len());
        for slot in self.slots.iter() {
            let mut current = slot.load(Ordering::Acquire);
            loop {
                if current.is_null() {
                    match slot.compare_exchange(
                        ptr::null_mut(),
                        FROZEN,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => break,
                        // An insertion won the slot; pick the child up below.
                        Err(observed) => current = observed,
                    }
                } else {
                    if current != FROZEN {
                        children.push(current);
                    }
                    break;
                }
            }
        }
        children
    }

    /// Build the successor table in the growth chain, populated with
    /// `children`. The result is private to the caller until published.
    pub(crate) fn grown(&self, children: &[*mut Node]) -> Box<ChildTable> {
        let (repr, mut capacity) = match self.repr {
            Repr::Linear if self.slots.len() < MAX_LINEAR_CAPACITY => {
                (Repr::Linear, self.slots.len() * 2)
            }
            Repr::Linear => (Repr::Hash, INITIAL_HASH_CAPACITY),
            Repr::Hash => (Repr::Hash, self.slots.len() * 2),
        };
        let prev = self as *const ChildTable as *mut ChildTable;
        loop {
            let table = Self::with_capacity(repr, capacity, prev);
            if table.fill(children) {
                return table;
            }
            // A hash successor that cannot place every child within its probe
            // limit doubles again before it is ever published.
            debug_assert_eq!(repr, Repr::Hash);
            capacity *= 2;
        }
    }

    /// Populate an unpublished table. Returns false when a hash table cannot
    /// place every child within its probe limit.
    fn fill(&self, children: &[*mut Node]) -> bool {
        match self.repr {
            Repr::Linear => {
                debug_assert!(children.len() <= self.slots.len());
                for (slot, &child) in self.slots.iter().zip(children) {
                    slot.store(child, Ordering::Relaxed);
                }
                true
            }
            Repr::Hash => {
                let mask = self.slots.len() - 1;
                let limit = probe_limit(self.slots.len());
                'children: for &child in children {
                    let key = unsafe { (*child).key() };
                    let mut index = mix64(key) as usize & mask;
                    for _ in 0..limit {
                        let slot = &self.slots[index];
                        if slot.load(Ordering::Relaxed).is_null() {
                            slot.store(child, Ordering::Relaxed);
                            continue 'children;
                        }
                        index = (index + 1) & mask;
                    }
                    return false;
                }
                true
            }
        }
    }
}

/// Resolve one slot for `key`. Returns the outcome, or `None` when the slot
/// is held by a different key and the caller should continue scanning.
fn resolve_slot(
    slot: &AtomicPtr<Node>,
    key: u64,
    spare: &mut Option<Box<Node>>,
) -> Option<SlotOutcome> {
    let mut current = slot.load(Ordering::Acquire);
    loop {
        if current == FROZEN {
            return Some(SlotOutcome::Grow);
        }
        if current.is_null() {
            let candidate =
                Box::into_raw(spare.take().unwrap_or_else(|| Box::new(Node::new(key))));
            match slot.compare_exchange(
                ptr::null_mut(),
                candidate,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Some(SlotOutcome::Inserted(candidate)),
                Err(observed) => {
                    // Lost the claim; park the candidate and re-examine what
                    // won, which may be a racing insert of the same key.
                    *spare = Some(unsafe { Box::from_raw(candidate) });
                    current = observed;
                }
            }
        } else if unsafe { (*current).key() } == key {
            return Some(SlotOutcome::Found(current));
        } else {
            return None;
        }
    }
}
