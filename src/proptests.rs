use std::collections::HashMap;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use crate::{Node, Tree};

/// Actions applied to both the tree and the model.
#[derive(Arbitrary, Debug, Clone)]
enum Action {
    Set { path: Path, value: i64 },
    Inc { path: Path },
    IncrementAndGet { path: Path },
}

/// A symbol path with a custom strategy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Path(Vec<u64>);

impl Arbitrary for Path {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            // Narrow alphabet: stays in the linear representation.
            prop::collection::vec(1u64..=4, 1..4).prop_map(Path),
            // Wide alphabet: forces linear-to-hash transitions.
            prop::collection::vec(1u64..=512, 1..4).prop_map(Path),
            // Sparse huge symbols (forced odd, so never the reserved 0).
            prop::collection::vec(any::<u64>().prop_map(|s| s | 1), 1..3).prop_map(Path),
        ]
        .boxed()
    }
}

fn follow<'t>(tree: &'t Tree, path: &[u64]) -> &'t Node {
    let mut node = tree.root();
    for &symbol in path {
        node = node.at(symbol);
    }
    node
}

proptest! {
    /// Any single-threaded action sequence leaves every touched path with
    /// exactly the model's counter value.
    #[test]
    fn matches_hashmap_model(actions in prop::collection::vec(any::<Action>(), 1..64)) {
        let tree = Tree::new();
        let mut model: HashMap<Vec<u64>, i64> = HashMap::new();
        for action in &actions {
            match action {
                Action::Set { path, value } => {
                    follow(&tree, &path.0).set_value(*value);
                    model.insert(path.0.clone(), *value);
                }
                Action::Inc { path } => {
                    follow(&tree, &path.0).inc_value();
                    let counter = model.entry(path.0.clone()).or_insert(0);
                    *counter = counter.wrapping_add(1);
                }
                Action::IncrementAndGet { path } => {
                    let got = follow(&tree, &path.0).increment_and_get();
                    let counter = model.entry(path.0.clone()).or_insert(0);
                    *counter = counter.wrapping_add(1);
                    prop_assert_eq!(got, *counter);
                }
            }
        }
        for (path, expected) in &model {
            prop_assert_eq!(follow(&tree, path).value(), *expected);
        }
    }

    /// Repeated descents along the same path always reach the same node.
    #[test]
    fn descent_is_idempotent(path in prop::collection::vec(1u64..=64, 1..5)) {
        let tree = Tree::new();
        let first = follow(&tree, &path) as *const Node;
        let again = follow(&tree, &path) as *const Node;
        prop_assert!(std::ptr::eq(first, again));
        // No additional nodes appear on the second pass.
        let count = tree.node_count();
        follow(&tree, &path);
        prop_assert_eq!(tree.node_count(), count);
    }
}
