//! Per-depth entropy and chi-squared scoring.
//!
//! For every clade `m` of a depth cut with tally `n_c` (total `n`) and progeny size `N_m`:
//!
//! \[
//! H_m = -\sum_c \frac{n_c}{n} \log_2 \frac{n_c}{n}, \qquad
//! E_c = N_m f_c, \qquad
//! \chi^2_m = \sum_{c: f_c > 0} \frac{(E_c - n_c)^2}{E_c}
//! \]
//!
//! where \(f_c\) is the global frequency of category `c`. The expected entropy applies the
//! entropy formula to \(E_c / n\) (same denominator as the observed probabilities). Both
//! entropies are weighted by \(\pi_m = N_m / \sum_{m'} N_{m'}\) over the cut; chi-squared
//! statistics and p-values stay per clade.

use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::clade::{cut_at_depth, tally_meta};
use crate::meta::{MetaFrequencyTable, TraitView};
use crate::progeny::ProgenyIndex;
use crate::tree::{LineageTree, NodeId};

/// Value reported for every statistic of a depth without usable clades.
///
/// Read as "no signal": maximal impurity for the entropies, no significance for the
/// p-value.
pub const DEGENERATE_SENTINEL: f64 = 1.0;

/// How a single-category clade is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScoringMode {
    /// Pure clades are scored like any other (observed entropy 0) and flagged.
    #[default]
    PerClade,
    /// The first pure clade turns the whole depth into
    /// [`Degeneracy::PureClade`], discarding the other clades at that depth.
    Legacy,
}

/// Why a depth produced no per-clade scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degeneracy {
    /// No node (or no leaf below the nodes) at this depth.
    EmptyCut,
    /// [`ScoringMode::Legacy`] met this single-category clade.
    PureClade(NodeId),
}

/// Scores of one clade of a depth cut.
#[derive(Debug, Clone, PartialEq)]
pub struct CladeScore {
    pub node: NodeId,
    pub progeny_size: usize,
    /// \(\pi_m\): share of the cut's leaves below this clade.
    pub weight: f64,
    /// Unweighted observed entropy in bits.
    pub observed_entropy: f64,
    /// Unweighted expected entropy in bits.
    pub expected_entropy: f64,
    pub chi_square: f64,
    pub p_value: f64,
    /// Exactly one category present.
    pub pure: bool,
}

/// Result of scoring one depth.
#[derive(Debug, Clone, PartialEq)]
pub enum DepthScore {
    Scored(Vec<CladeScore>),
    Degenerate(Degeneracy),
}

/// Depth-level aggregate: means over clades, p-value from the mean chi-squared.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthSummary {
    pub depth: usize,
    pub mean_observed: f64,
    pub mean_expected: f64,
    pub mean_chi_square: f64,
    pub p_value: f64,
    pub degeneracy: Option<Degeneracy>,
}

impl DepthScore {
    #[must_use]
    pub fn clades(&self) -> &[CladeScore] {
        match self {
            Self::Scored(c) => c,
            Self::Degenerate(_) => &[],
        }
    }

    /// Observed entropies pre-multiplied by the clade weights.
    #[must_use]
    pub fn observed_entropies(&self) -> Vec<f64> {
        self.clades()
            .iter()
            .map(|c| c.observed_entropy * c.weight)
            .collect()
    }

    /// Expected entropies pre-multiplied by the clade weights.
    #[must_use]
    pub fn expected_entropies(&self) -> Vec<f64> {
        self.clades()
            .iter()
            .map(|c| c.expected_entropy * c.weight)
            .collect()
    }

    #[must_use]
    pub fn chi_squares(&self) -> Vec<f64> {
        self.clades().iter().map(|c| c.chi_square).collect()
    }

    #[must_use]
    pub fn p_values(&self) -> Vec<f64> {
        self.clades().iter().map(|c| c.p_value).collect()
    }

    /// Aggregate the clades of `depth`; degenerate depths report [`DEGENERATE_SENTINEL`].
    #[must_use]
    pub fn summarize(&self, depth: usize, categories: usize) -> DepthSummary {
        match self {
            Self::Degenerate(kind) => DepthSummary {
                depth,
                mean_observed: DEGENERATE_SENTINEL,
                mean_expected: DEGENERATE_SENTINEL,
                mean_chi_square: DEGENERATE_SENTINEL,
                p_value: DEGENERATE_SENTINEL,
                degeneracy: Some(*kind),
            },
            Self::Scored(_) => {
                let mean_chi_square = mean(&self.chi_squares());
                DepthSummary {
                    depth,
                    mean_observed: mean(&self.observed_entropies()),
                    mean_expected: mean(&self.expected_entropies()),
                    mean_chi_square,
                    p_value: chi_square_p_value(mean_chi_square, categories.saturating_sub(1)),
                    degeneracy: None,
                }
            }
        }
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return DEGENERATE_SENTINEL;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Shannon entropy in bits; non-positive entries are skipped.
///
/// The input need not sum to one (expected compositions are normalized by the observed
/// clade total, not their own).
#[must_use]
pub fn entropy_bits(probs: &[f64]) -> f64 {
    let p: Vec<f64> = probs.iter().copied().filter(|&x| x > 0.0).collect();
    logp::entropy_unchecked(&p) / logp::LN_2
}

/// Upper-tail probability of a chi-squared statistic with `df` degrees of freedom.
///
/// Returns 1.0 when there are no degrees of freedom or the statistic is not positive.
#[must_use]
pub fn chi_square_p_value(statistic: f64, df: usize) -> f64 {
    if statistic.is_nan() {
        return f64::NAN;
    }
    if df == 0 || statistic <= 0.0 {
        return 1.0;
    }
    match ChiSquared::new(df as f64) {
        Ok(dist) => dist.sf(statistic).clamp(0.0, 1.0),
        Err(_) => f64::NAN,
    }
}

/// Score every clade of the cut at `depth`.
///
/// `index` must have been built on the shaped `tree`, and `frequencies` on `view`.
#[must_use]
pub fn score_depth(
    tree: &LineageTree,
    index: &ProgenyIndex,
    view: &TraitView,
    frequencies: &MetaFrequencyTable,
    depth: usize,
    mode: ScoringMode,
) -> DepthScore {
    let nodes = cut_at_depth(tree, depth);
    let cut_leaves: usize = nodes.iter().map(|&n| index.progeny_size(n)).sum();
    if cut_leaves == 0 {
        return DepthScore::Degenerate(Degeneracy::EmptyCut);
    }

    let k = view.categories().len();
    let df = k.saturating_sub(1);
    let mut clades = Vec::with_capacity(nodes.len());
    for node in nodes {
        let counts = tally_meta(index, view, node);
        let pure = counts.is_pure();
        if pure && mode == ScoringMode::Legacy {
            return DepthScore::Degenerate(Degeneracy::PureClade(node));
        }

        let progeny_size = index.progeny_size(node);
        let ni = progeny_size as f64;
        let total = counts.total() as f64;

        let expected: Vec<f64> = (0..k).map(|c| ni * frequencies.frequency(c)).collect();
        let expected_probs: Vec<f64> = if total > 0.0 {
            expected.iter().map(|e| e / total).collect()
        } else {
            Vec::new()
        };

        let chi_square: f64 = expected
            .iter()
            .enumerate()
            .filter(|(_, e)| **e > 0.0)
            .map(|(c, &e)| {
                let diff = e - counts.get(c) as f64;
                diff * diff / e
            })
            .sum();

        clades.push(CladeScore {
            node,
            progeny_size,
            weight: ni / cut_leaves as f64,
            observed_entropy: entropy_bits(&counts.probabilities()),
            expected_entropy: entropy_bits(&expected_probs),
            chi_square,
            p_value: chi_square_p_value(chi_square, df),
            pure,
        });
    }
    log::debug!(
        "depth {depth}: scored {} clade(s) over {cut_leaves} leaves",
        clades.len()
    );
    DepthScore::Scored(clades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clade::CladeMetaCounts;
    use crate::meta::TraitColumn;
    use proptest::prelude::*;

    struct Fixture {
        tree: LineageTree,
        index: ProgenyIndex,
        view: TraitView,
        freqs: MetaFrequencyTable,
    }

    fn balanced(labels: [&str; 4]) -> Fixture {
        let mut tree = LineageTree::from_edges([
            ("root", "A"),
            ("root", "B"),
            ("A", "leaf1"),
            ("A", "leaf2"),
            ("B", "leaf3"),
            ("B", "leaf4"),
        ])
        .unwrap();
        tree.assign_depth().unwrap();
        let index = ProgenyIndex::build(&mut tree).unwrap();
        let mut col = TraitColumn::new("c");
        for (leaf, v) in ["leaf1", "leaf2", "leaf3", "leaf4"].into_iter().zip(labels) {
            col.push(leaf, v);
        }
        let view = TraitView::assign(&tree, &col).unwrap();
        let freqs = MetaFrequencyTable::from_view(&index, &view);
        Fixture {
            tree,
            index,
            view,
            freqs,
        }
    }

    impl Fixture {
        fn score(&self, depth: usize, mode: ScoringMode) -> DepthScore {
            score_depth(&self.tree, &self.index, &self.view, &self.freqs, depth, mode)
        }
    }

    #[test]
    fn single_category_tree_has_zero_entropy() {
        let f = balanced(["X", "X", "X", "X"]);
        let s = f.score(1, ScoringMode::PerClade);
        assert_eq!(s.clades().len(), 2);
        for e in s.observed_entropies() {
            assert!(e.abs() < 1e-12);
        }
        let summary = s.summarize(1, f.view.categories().len());
        assert!(summary.mean_observed.abs() < 1e-12);
        assert!(summary.mean_chi_square.abs() < 1e-12);
        assert_eq!(summary.p_value, 1.0);
        assert!(s.clades().iter().all(|c| c.pure));
    }

    #[test]
    fn pure_split_is_zero_at_depth_one_and_one_bit_at_root() {
        let f = balanced(["X", "X", "Y", "Y"]);

        let d1 = f.score(1, ScoringMode::PerClade);
        for e in d1.observed_entropies() {
            assert!(e.abs() < 1e-12);
        }
        // Expected composition is 1 X + 1 Y per clade: 1 bit, weighted by 1/2.
        for e in d1.expected_entropies() {
            assert!((e - 0.5).abs() < 1e-12);
        }
        for c in d1.chi_squares() {
            assert!((c - 2.0).abs() < 1e-12);
        }
        let summary = d1.summarize(1, 2);
        assert!((summary.mean_chi_square - 2.0).abs() < 1e-12);
        // P(chi2_1 > 2) = erfc(1).
        assert!((summary.p_value - 0.157_299_207_050_285_1).abs() < 1e-6);

        let d0 = f.score(0, ScoringMode::PerClade);
        let root = &d0.clades()[0];
        assert_eq!(root.weight, 1.0);
        assert!((root.observed_entropy - 1.0).abs() < 1e-12);
        assert!((root.expected_entropy - 1.0).abs() < 1e-12);
        assert!(root.chi_square.abs() < 1e-12);
    }

    #[test]
    fn legacy_mode_short_circuits_on_a_pure_clade() {
        let f = balanced(["X", "Y", "Y", "Y"]);
        let b = f.tree.id_of("B").unwrap();

        let legacy = f.score(1, ScoringMode::Legacy);
        assert_eq!(legacy, DepthScore::Degenerate(Degeneracy::PureClade(b)));
        let summary = legacy.summarize(1, 2);
        assert_eq!(summary.mean_observed, DEGENERATE_SENTINEL);
        assert_eq!(summary.p_value, DEGENERATE_SENTINEL);
        assert_eq!(summary.degeneracy, Some(Degeneracy::PureClade(b)));

        let corrected = f.score(1, ScoringMode::PerClade);
        let clades = corrected.clades();
        assert_eq!(clades.len(), 2);
        assert!(!clades[0].pure);
        assert!((clades[0].observed_entropy - 1.0).abs() < 1e-12);
        assert!(clades[1].pure);
        assert!(clades[1].observed_entropy.abs() < 1e-12);
    }

    #[test]
    fn empty_cut_is_degenerate() {
        let f = balanced(["X", "X", "Y", "Y"]);
        let s = f.score(9, ScoringMode::PerClade);
        assert_eq!(s, DepthScore::Degenerate(Degeneracy::EmptyCut));
        assert!(s.clades().is_empty());
        let summary = s.summarize(9, 2);
        assert_eq!(summary.mean_chi_square, DEGENERATE_SENTINEL);
    }

    #[test]
    fn weights_follow_clade_size() {
        let mut tree = LineageTree::from_edges([
            ("r", "a"),
            ("r", "b"),
            ("a", "l1"),
            ("a", "l2"),
            ("a", "l3"),
            ("b", "l4"),
        ])
        .unwrap();
        tree.assign_depth().unwrap();
        let index = ProgenyIndex::build(&mut tree).unwrap();
        let mut col = TraitColumn::new("c");
        for (l, v) in [("l1", "X"), ("l2", "Y"), ("l3", "X"), ("l4", "Y")] {
            col.push(l, v);
        }
        let view = TraitView::assign(&tree, &col).unwrap();
        let freqs = MetaFrequencyTable::from_view(&index, &view);
        let s = score_depth(&tree, &index, &view, &freqs, 1, ScoringMode::PerClade);
        let weights: Vec<f64> = s.clades().iter().map(|c| c.weight).collect();
        assert_eq!(weights, vec![0.75, 0.25]);
    }

    #[test]
    fn zero_frequency_categories_are_skipped() {
        let mut tree = LineageTree::from_edges([("r", "a"), ("r", "b")]).unwrap();
        tree.assign_depth().unwrap();
        let index = ProgenyIndex::build(&mut tree).unwrap();
        let mut col = TraitColumn::new("c");
        col.push("a", "X");
        col.push("b", "Y");
        col.push("elsewhere", "Z");
        let view = TraitView::assign(&tree, &col).unwrap();
        let freqs = MetaFrequencyTable::from_view(&index, &view);
        let s = score_depth(&tree, &index, &view, &freqs, 0, ScoringMode::PerClade);
        let root = &s.clades()[0];
        assert!(root.chi_square.is_finite());
        assert!(root.chi_square.abs() < 1e-12);
        assert!((root.expected_entropy - 1.0).abs() < 1e-12);
    }

    #[test]
    fn chi_square_tail_matches_known_quantiles() {
        assert!((chi_square_p_value(3.841_458_820_694_124, 1) - 0.05).abs() < 1e-6);
        assert!((chi_square_p_value(5.991_464_547_107_979, 2) - 0.05).abs() < 1e-6);
        assert_eq!(chi_square_p_value(4.0, 0), 1.0);
        assert_eq!(chi_square_p_value(0.0, 3), 1.0);
        assert!(chi_square_p_value(f64::NAN, 3).is_nan());
    }

    proptest! {
        #[test]
        fn entropy_is_bounded_by_log_categories(counts in prop::collection::vec(0usize..40, 1..12)) {
            let tally = CladeMetaCounts::from_counts(counts.clone());
            prop_assume!(tally.total() > 0);
            let h = entropy_bits(&tally.probabilities());
            prop_assert!(h >= -1e-12);
            prop_assert!(h <= (counts.len() as f64).log2() + 1e-9);
            if tally.is_pure() {
                prop_assert!(h.abs() < 1e-12);
            }
        }

        #[test]
        fn chi_square_p_value_is_a_probability(stat in 0.0f64..200.0, df in 1usize..30) {
            let p = chi_square_p_value(stat, df);
            prop_assert!((0.0..=1.0).contains(&p));
        }
    }
}
