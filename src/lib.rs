//! # preftree
//!
//! A lock-free concurrent prefix tree keyed by sequences of positive 64-bit
//! integers, with one atomically-updatable 64-bit counter per node.
//!
//! ## Features
//!
//! - **Lock-free**: no mutexes anywhere; every operation completes through
//!   bounded CAS retries, and contention on one node never blocks another.
//! - **Get-or-create descent**: [`Node::at`] returns the unique child under a
//!   symbol, creating it on first use.
//! - **Adaptive child storage**: a node's children move from no allocation to
//!   a small linear array to an open-addressed hash array as the fanout
//!   grows, without ever invalidating handed-out node references.
//! - **Stable handles**: a [`Node`] reference stays valid for the lifetime of
//!   the [`Tree`] and can be retained and reused across threads.
//!
//! ## Example
//!
//! ```rust
//! use preftree::Tree;
//!
//! let tree = Tree::new();
//! tree.root().at(2).at(12).at(18).set_value(42);
//! assert_eq!(tree.root().at(2).at(12).at(18).value(), 42);
//!
//! std::thread::scope(|scope| {
//!     for _ in 0..4 {
//!         scope.spawn(|| tree.root().at(7).inc_value());
//!     }
//! });
//! assert_eq!(tree.root().at(7).value(), 4);
//! ```
//!
//! There is no deletion: nodes live until the tree is dropped.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

use thiserror::Error as ThisError;

mod children;
pub mod node;
pub mod tree;

pub use node::Node;
pub use tree::{MemoryStats, Tree};

/// Errors surfaced by fallible tree operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ThisError)]
pub enum Error {
    /// A reserved symbol was passed to a descend operation. The tree is not
    /// modified.
    #[error("symbol {symbol} is reserved; symbols must be positive")]
    InvalidSymbol {
        /// The rejected symbol.
        symbol: u64,
    },
}

#[cfg(test)]
mod proptests;
