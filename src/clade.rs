//! Depth cuts and per-clade category tallies.

use crate::meta::TraitView;
use crate::progeny::ProgenyIndex;
use crate::tree::{LineageTree, NodeId};

/// Every node whose depth equals `depth`, in ascending id order.
///
/// Empty for depths past the deepest node, or before depths are assigned. After shaping,
/// the clades of one cut partition the leaf set.
#[must_use]
pub fn cut_at_depth(tree: &LineageTree, depth: usize) -> Vec<NodeId> {
    tree.ids()
        .filter(|&id| tree.depth(id) == Some(depth))
        .collect()
}

/// Leaf counts per category for one clade, aligned with the view's category order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CladeMetaCounts {
    counts: Vec<usize>,
}

impl CladeMetaCounts {
    #[must_use]
    pub fn from_counts(counts: Vec<usize>) -> Self {
        Self { counts }
    }

    #[must_use]
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    #[must_use]
    pub fn get(&self, category: usize) -> usize {
        self.counts.get(category).copied().unwrap_or(0)
    }

    /// Number of labelled leaves in the clade.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Number of categories with a nonzero count.
    #[must_use]
    pub fn observed_categories(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    /// Exactly one category is present.
    #[must_use]
    pub fn is_pure(&self) -> bool {
        self.observed_categories() == 1
    }

    /// Empirical distribution over the categories present (zero counts dropped).
    #[must_use]
    pub fn probabilities(&self) -> Vec<f64> {
        let total = self.total();
        if total == 0 {
            return Vec::new();
        }
        self.counts
            .iter()
            .filter(|&&c| c > 0)
            .map(|&c| c as f64 / total as f64)
            .collect()
    }
}

/// Tally the categories of the leaves below `clade_root`.
///
/// Every category of the view gets an entry, zero if absent from the clade.
#[must_use]
pub fn tally_meta(index: &ProgenyIndex, view: &TraitView, clade_root: NodeId) -> CladeMetaCounts {
    let mut counts = vec![0usize; view.categories().len()];
    for &leaf in index.leaves_of(clade_root) {
        if let Some(c) = view.label(leaf) {
            counts[c] += 1;
        }
    }
    CladeMetaCounts { counts }
}
