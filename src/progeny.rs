//! Progeny sizes and memoized clade leaf sets.
//!
//! One iterative depth-first pass lays the leaves out in preorder. The leaves below any node
//! then form a contiguous span of that order, so a node's progeny size is the span length
//! and its clade is a slice -- no per-clade traversal is needed when tallying.

use std::ops::Range;

use crate::tree::{LineageTree, NodeId};
use crate::Result;

/// Preorder leaf layout plus the span covering each node's subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgenyIndex {
    root: NodeId,
    order: Vec<NodeId>,
    // Indexed by `NodeId`.
    spans: Vec<Range<usize>>,
}

enum Visit {
    Enter(NodeId),
    Exit(NodeId),
}

impl ProgenyIndex {
    /// Index `tree` and set `progeny_size` on every node.
    ///
    /// Must be rebuilt whenever the topology changes (i.e. after shaping).
    ///
    /// # Errors
    ///
    /// Returns [`crate::PurityError::MalformedTree`] if `tree` is not a single rooted tree.
    pub fn build(tree: &mut LineageTree) -> Result<Self> {
        let root = tree.validate()?;
        let mut order = Vec::new();
        let mut spans = vec![0..0; tree.len()];

        // Explicit stack: lineage trees padded to uniform depth can be very deep.
        let mut stack = vec![Visit::Enter(root)];
        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(id) => {
                    spans[id.index()].start = order.len();
                    if tree.is_leaf(id) {
                        order.push(id);
                    }
                    stack.push(Visit::Exit(id));
                    for &c in tree.children(id).iter().rev() {
                        stack.push(Visit::Enter(c));
                    }
                }
                Visit::Exit(id) => spans[id.index()].end = order.len(),
            }
        }

        for id in tree.ids().collect::<Vec<_>>() {
            tree.set_progeny_size(id, spans[id.index()].len());
        }
        Ok(Self { root, order, spans })
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Leaves below `node` (the node itself if it is a leaf), in preorder.
    #[must_use]
    pub fn leaves_of(&self, node: NodeId) -> &[NodeId] {
        self.spans
            .get(node.index())
            .map_or(&[][..], |span| &self.order[span.clone()])
    }

    /// Number of leaves below `node`.
    #[must_use]
    pub fn progeny_size(&self, node: NodeId) -> usize {
        self.spans.get(node.index()).map_or(0, |span| span.len())
    }

    /// Number of leaves in the whole tree.
    #[must_use]
    pub fn total_leaves(&self) -> usize {
        self.order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn balanced_tree_sizes() {
        let mut t = LineageTree::from_edges([
            ("root", "A"),
            ("root", "B"),
            ("A", "leaf1"),
            ("A", "leaf2"),
            ("B", "leaf3"),
            ("B", "leaf4"),
        ])
        .unwrap();
        let index = ProgenyIndex::build(&mut t).unwrap();
        let root = t.id_of("root").unwrap();
        let a = t.id_of("A").unwrap();
        assert_eq!(index.root(), root);
        assert_eq!(index.total_leaves(), 4);
        assert_eq!(index.progeny_size(root), 4);
        assert_eq!(index.progeny_size(a), 2);
        assert_eq!(t.progeny_size(a), Some(2));
        assert_eq!(t.progeny_size(t.id_of("leaf3").unwrap()), Some(1));

        let names: Vec<&str> = index.leaves_of(a).iter().map(|&l| t.name(l)).collect();
        assert_eq!(names, vec!["leaf1", "leaf2"]);
    }

    #[test]
    fn dummies_count_their_single_leaf() {
        let mut t = LineageTree::from_edges([("r", "a"), ("r", "x"), ("a", "b")]).unwrap();
        t.assign_depth().unwrap();
        t.extend_to_uniform_depth(2).unwrap();
        let index = ProgenyIndex::build(&mut t).unwrap();
        let dummy = t.id_of("x-1").unwrap();
        assert_eq!(index.progeny_size(dummy), 1);
        assert_eq!(index.total_leaves(), 2);
    }

    #[test]
    fn lone_root_has_no_progeny() {
        let mut t = LineageTree::new();
        let r = t.add_node("r");
        let index = ProgenyIndex::build(&mut t).unwrap();
        assert_eq!(index.progeny_size(r), 0);
        assert!(index.leaves_of(r).is_empty());
    }

    proptest! {
        #[test]
        fn progeny_is_additive(parents in prop::collection::vec(any::<prop::sample::Index>(), 1..80)) {
            let edges: Vec<(String, String)> = parents
                .iter()
                .enumerate()
                .map(|(i, ix)| (format!("n{}", ix.index(i + 1)), format!("n{}", i + 1)))
                .collect();
            let mut t = LineageTree::from_edges(edges).unwrap();
            let index = ProgenyIndex::build(&mut t).unwrap();

            for id in t.ids() {
                let size = index.progeny_size(id);
                prop_assert_eq!(t.progeny_size(id), Some(size));
                if t.is_leaf(id) {
                    prop_assert_eq!(size, 1);
                } else {
                    let sum: usize = t.children(id).iter().map(|&c| index.progeny_size(c)).sum();
                    prop_assert_eq!(size, sum);
                }
                prop_assert!(index.leaves_of(id).iter().all(|&l| t.is_leaf(l)));
            }
            prop_assert_eq!(index.total_leaves(), t.leaves().count());
        }
    }
}
