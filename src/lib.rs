//! `cladepurity`: depth-resolved clustering of categorical traits on lineage trees.
//!
//! Given a reconstructed lineage tree and a categorical label per sample (cell type,
//! tissue of origin, ...), this crate asks how *pure* the clades are at every depth of the
//! tree: is the label more phylogenetically clustered than its overall frequency would
//! predict?
//!
//! Pipeline:
//! 1. **Shaping** ([`tree`]) -- depth assignment, dummy-branch extension so every leaf sits
//!    at the maximum depth, and reattachment of redundant samples that were collapsed
//!    during tree construction.
//! 2. **Progeny indexing** ([`progeny`]) -- one bottom-up pass memoizing the leaf set of every
//!    node as a contiguous preorder span.
//! 3. **Depth cuts** ([`clade`]) -- all nodes at a depth partition the leaves into clades;
//!    each clade gets a per-category tally.
//! 4. **Scoring** ([`score`]) -- Shannon entropy (bits) of each clade, the entropy expected
//!    under the global label frequencies, a chi-squared divergence and its p-value, weighted
//!    by relative clade size.
//! 5. **Empirical significance** ([`empirical`]) -- bias-corrected rank p-values against
//!    entropies from null (randomized) replicates.
//!
//! [`profile`] wires these together per trait column; [`io`] reads and writes the plain TSV
//! formats used by the `cladepurity` binary.
//!
//! ## Quick example
//!
//! ```rust
//! use cladepurity::{CharacterTable, LineageTree, ProfileParams, ShapedTree, TraitColumn};
//!
//! let tree = LineageTree::from_edges([
//!     ("root", "a"),
//!     ("root", "b"),
//!     ("a", "l1"),
//!     ("a", "l2"),
//!     ("b", "l3"),
//!     ("b", "l4"),
//!     ("l4", "l5"),
//! ])
//! .unwrap();
//! let shaped = ShapedTree::shape(tree, &CharacterTable::new()).unwrap();
//! assert_eq!(shaped.max_depth(), 3);
//!
//! let mut column = TraitColumn::new("tissue");
//! for (leaf, tissue) in [("l1", "gut"), ("l2", "gut"), ("l3", "lung"), ("l5", "lung")] {
//!     column.push(leaf, tissue);
//! }
//!
//! let profile = shaped.profile_trait(&column, &ProfileParams::default()).unwrap();
//! assert_eq!(profile.depths(), vec![1, 2]);
//! // Depth 1 splits the tree into two pure clades.
//! assert!(profile.mean_observed()[0].abs() < 1e-12);
//! ```

#![forbid(unsafe_code)]

use thiserror::Error;

pub mod character;
pub mod clade;
pub mod empirical;
pub mod io;
pub mod meta;
pub mod profile;
pub mod progeny;
pub mod score;
pub mod tree;

pub use character::CharacterTable;
pub use clade::{cut_at_depth, tally_meta, CladeMetaCounts};
pub use empirical::{empirical_p_value, empirical_p_values, NullDistribution};
pub use meta::{MetaFrequencyTable, MetadataTable, TraitColumn, TraitView};
pub use profile::{DepthProfile, ProfileParams, ShapedTree};
pub use progeny::ProgenyIndex;
pub use score::{
    chi_square_p_value, entropy_bits, score_depth, CladeScore, Degeneracy, DepthScore,
    DepthSummary, ScoringMode, DEGENERATE_SENTINEL,
};
pub use tree::{LineageTree, Node, NodeId, NodeOrigin};

/// Errors for tree shaping, trait assignment and significance estimation.
#[derive(Debug, Error)]
pub enum PurityError {
    /// The graph is not a rooted tree (no single root, a second parent, a cycle, or
    /// nodes unreachable from the root).
    #[error("malformed tree: {0}")]
    MalformedTree(String),

    /// A redundant sample shares its character string with no surviving leaf.
    #[error("no surviving leaf shares the character states of redundant sample `{sample}`")]
    NoMatch { sample: String },

    /// Observed and null series have different lengths.
    #[error("input shape mismatch: {observed} observed values vs {null} null replicate sets")]
    InputShape { observed: usize, null: usize },

    /// A leaf has no value in a trait column.
    #[error("leaf `{leaf}` has no value in trait column `{column}`")]
    MissingMeta { leaf: String, column: String },

    #[error("unknown node `{0}`")]
    UnknownNode(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("invalid input: {0}")]
    Invalid(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = core::result::Result<T, PurityError>;
