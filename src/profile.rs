//! Per-trait depth profiles over a shaped tree.
//!
//! [`ShapedTree::shape`] runs the shaping pipeline once (depth, dummy extension, redundant
//! leaves, progeny index). Each trait column is then scored independently through its own
//! [`TraitView`]; the shaped tree is never mutated again.

use crate::character::CharacterTable;
use crate::empirical::{empirical_p_values, NullDistribution};
use crate::meta::{MetaFrequencyTable, MetadataTable, TraitColumn, TraitView};
use crate::progeny::ProgenyIndex;
use crate::score::{score_depth, DepthScore, DepthSummary, ScoringMode};
use crate::tree::LineageTree;
use crate::Result;

/// Parameters for [`ShapedTree::profile_trait`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileParams {
    pub scoring: ScoringMode,
    /// First depth scored. Depth 0 is the whole tree and carries no clustering signal.
    pub first_depth: usize,
    /// Last depth scored; `None` means `max_depth - 1` (the leaf level is all singletons).
    pub last_depth: Option<usize>,
}

impl Default for ProfileParams {
    fn default() -> Self {
        Self {
            scoring: ScoringMode::PerClade,
            first_depth: 1,
            last_depth: None,
        }
    }
}

/// A lineage tree after shaping, with its progeny index.
#[derive(Debug, Clone)]
pub struct ShapedTree {
    tree: LineageTree,
    index: ProgenyIndex,
    max_depth: usize,
}

impl ShapedTree {
    /// Assign depths, pad leaves to the maximum depth, reattach redundant samples from
    /// `characters`, then index progeny.
    ///
    /// The maximum depth is taken before reattachment; reattached leaves inherit the depth
    /// of their match, so it does not change.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::PurityError::MalformedTree`] and [`crate::PurityError::NoMatch`].
    pub fn shape(mut tree: LineageTree, characters: &CharacterTable) -> Result<Self> {
        let root = tree.assign_depth()?;
        let max_depth = tree.max_depth().unwrap_or(0);
        log::info!(
            "tree rooted at `{}`: {} nodes, max depth {max_depth}",
            tree.name(root),
            tree.len()
        );

        let dummies =
            tree.extend_to_uniform_depth_reserving(max_depth, |name| characters.contains(name))?;
        log::info!("inserted {dummies} dummy node(s)");

        let reattached = tree.reattach_redundant_leaves(characters)?;
        log::info!("reattached {} redundant sample(s)", reattached.len());

        let index = ProgenyIndex::build(&mut tree)?;
        log::info!("{} leaves after shaping", index.total_leaves());
        Ok(Self {
            tree,
            index,
            max_depth,
        })
    }

    #[must_use]
    pub fn tree(&self) -> &LineageTree {
        &self.tree
    }

    #[must_use]
    pub fn index(&self) -> &ProgenyIndex {
        &self.index
    }

    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Category view of this tree's leaves for `column`.
    pub fn trait_view(&self, column: &TraitColumn) -> Result<TraitView> {
        TraitView::assign(&self.tree, column)
    }

    /// Score a single depth for an already-built view.
    #[must_use]
    pub fn score_depth(
        &self,
        view: &TraitView,
        frequencies: &MetaFrequencyTable,
        depth: usize,
        mode: ScoringMode,
    ) -> DepthScore {
        score_depth(&self.tree, &self.index, view, frequencies, depth, mode)
    }

    /// Mean observed/expected entropy, mean chi-squared and its p-value at every depth of
    /// `params`' range.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PurityError::MissingMeta`] if a leaf has no value in `column`.
    pub fn profile_trait(&self, column: &TraitColumn, params: &ProfileParams) -> Result<DepthProfile> {
        let view = self.trait_view(column)?;
        let frequencies = MetaFrequencyTable::from_view(&self.index, &view);
        let categories = view.categories().len();
        let last = params
            .last_depth
            .unwrap_or_else(|| self.max_depth.saturating_sub(1));

        let mut summaries = Vec::new();
        for depth in params.first_depth..=last {
            let summary = self
                .score_depth(&view, &frequencies, depth, params.scoring)
                .summarize(depth, categories);
            if let Some(kind) = summary.degeneracy {
                log::warn!(
                    "trait `{}` depth {depth}: degenerate ({kind:?}), reporting sentinel",
                    column.name()
                );
            }
            summaries.push(summary);
        }
        log::info!(
            "trait `{}`: {categories} categories, {} depth(s) scored",
            column.name(),
            summaries.len()
        );
        Ok(DepthProfile {
            trait_name: column.name().to_string(),
            categories: view.categories().to_vec(),
            summaries,
        })
    }

    /// Profile every column of `metadata`, one after the other.
    ///
    /// A failing column is logged and returned as an error without affecting the others.
    #[must_use]
    pub fn profile_all(
        &self,
        metadata: &MetadataTable,
        params: &ProfileParams,
    ) -> Vec<(String, Result<DepthProfile>)> {
        metadata
            .columns()
            .iter()
            .map(|column| {
                let result = self.profile_trait(column, params);
                if let Err(e) = &result {
                    log::warn!("trait `{}` skipped: {e}", column.name());
                }
                (column.name().to_string(), result)
            })
            .collect()
    }
}

/// Depth-indexed statistics of one trait column.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthProfile {
    pub trait_name: String,
    pub categories: Vec<String>,
    pub summaries: Vec<DepthSummary>,
}

impl DepthProfile {
    #[must_use]
    pub fn depths(&self) -> Vec<usize> {
        self.summaries.iter().map(|s| s.depth).collect()
    }

    #[must_use]
    pub fn mean_observed(&self) -> Vec<f64> {
        self.summaries.iter().map(|s| s.mean_observed).collect()
    }

    #[must_use]
    pub fn mean_expected(&self) -> Vec<f64> {
        self.summaries.iter().map(|s| s.mean_expected).collect()
    }

    #[must_use]
    pub fn mean_chi_square(&self) -> Vec<f64> {
        self.summaries.iter().map(|s| s.mean_chi_square).collect()
    }

    /// Chi-squared p-value of the mean statistic, per depth.
    #[must_use]
    pub fn p_values(&self) -> Vec<f64> {
        self.summaries.iter().map(|s| s.p_value).collect()
    }

    /// Empirical p-values of the mean observed entropies against `null`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PurityError::InputShape`] if `null` lacks a depth of this profile.
    pub fn empirical_p_values(&self, null: &NullDistribution) -> Result<Vec<f64>> {
        let aligned = null.aligned(&self.depths())?;
        empirical_p_values(&self.mean_observed(), &aligned)
    }
}
