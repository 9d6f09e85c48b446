//! Categorical trait columns and their per-column view onto a shaped tree.
//!
//! Categories never live on tree nodes. A [`TraitView`] maps leaves to category indices for
//! one column at a time, so a shaped tree can be scored against any number of columns
//! without carrying state from one column into the next.

use std::collections::HashMap;

use crate::io::Table;
use crate::progeny::ProgenyIndex;
use crate::tree::{LineageTree, NodeId};
use crate::{PurityError, Result};

/// One categorical trait: leaf name -> category.
///
/// Categories are ordered by first appearance, including values of samples that are not in
/// the tree; they fix the category order of every tally and the chi-squared degrees of
/// freedom.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraitColumn {
    name: String,
    values: HashMap<String, usize>,
    categories: Vec<String>,
}

impl TraitColumn {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Record `value` for `leaf`. A later value for the same leaf replaces the earlier one.
    pub fn push(&mut self, leaf: &str, value: &str) {
        let idx = match self.categories.iter().position(|c| c == value) {
            Some(i) => i,
            None => {
                self.categories.push(value.to_string());
                self.categories.len() - 1
            }
        };
        self.values.insert(leaf.to_string(), idx);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    #[must_use]
    pub fn get(&self, leaf: &str) -> Option<&str> {
        self.values
            .get(leaf)
            .map(|&i| self.categories[i].as_str())
    }

    fn category_index(&self, leaf: &str) -> Option<usize> {
        self.values.get(leaf).copied()
    }
}

/// All trait columns of a metadata table, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTable {
    columns: Vec<TraitColumn>,
}

impl MetadataTable {
    /// One [`TraitColumn`] per non-index column of `table`.
    ///
    /// Cells are taken verbatim; an empty cell is its own (empty) category.
    #[must_use]
    pub fn from_table(table: &Table) -> Self {
        let mut columns: Vec<TraitColumn> =
            table.columns().iter().map(|c| TraitColumn::new(c)).collect();
        for (leaf, row) in table.rows() {
            for (col, value) in columns.iter_mut().zip(row) {
                col.push(leaf, value);
            }
        }
        Self { columns }
    }

    #[must_use]
    pub fn from_columns(columns: Vec<TraitColumn>) -> Self {
        Self { columns }
    }

    #[must_use]
    pub fn columns(&self) -> &[TraitColumn] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&TraitColumn> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Category assignment of every leaf of a tree for one trait column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraitView {
    column: String,
    categories: Vec<String>,
    // Indexed by `NodeId`; `None` for non-leaves.
    labels: Vec<Option<usize>>,
}

impl TraitView {
    /// Look up the category of every leaf of `tree` in `column`.
    ///
    /// # Errors
    ///
    /// Returns [`PurityError::MissingMeta`] for the first leaf without a value.
    pub fn assign(tree: &LineageTree, column: &TraitColumn) -> Result<Self> {
        let mut labels = vec![None; tree.len()];
        for leaf in tree.leaves() {
            let idx = column
                .category_index(tree.name(leaf))
                .ok_or_else(|| PurityError::MissingMeta {
                    leaf: tree.name(leaf).to_string(),
                    column: column.name.clone(),
                })?;
            labels[leaf.index()] = Some(idx);
        }
        Ok(Self {
            column: column.name.clone(),
            categories: column.categories.clone(),
            labels,
        })
    }

    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Category index of `node`, if it is a labelled leaf.
    #[must_use]
    pub fn label(&self, node: NodeId) -> Option<usize> {
        self.labels.get(node.index()).copied().flatten()
    }
}

/// Overall frequency of each category across all leaves of the tree.
///
/// This is the null model: a clade of `n` leaves is expected to hold `n * frequency(c)`
/// leaves of category `c`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaFrequencyTable {
    frequencies: Vec<f64>,
}

impl MetaFrequencyTable {
    /// Frequencies over the leaves of the whole tree, aligned with `view.categories()`.
    ///
    /// A tree without leaves yields all-zero frequencies.
    #[must_use]
    pub fn from_view(index: &ProgenyIndex, view: &TraitView) -> Self {
        let mut counts = vec![0usize; view.categories().len()];
        let mut total = 0usize;
        for &leaf in index.leaves_of(index.root()) {
            if let Some(c) = view.label(leaf) {
                counts[c] += 1;
                total += 1;
            }
        }
        let frequencies = counts
            .into_iter()
            .map(|c| if total == 0 { 0.0 } else { c as f64 / total as f64 })
            .collect();
        Self { frequencies }
    }

    #[must_use]
    pub fn from_frequencies(frequencies: Vec<f64>) -> Self {
        Self { frequencies }
    }

    #[must_use]
    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    #[must_use]
    pub fn frequency(&self, category: usize) -> f64 {
        self.frequencies.get(category).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}
