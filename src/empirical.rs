//! Empirical p-values against null (randomized-tree) replicates.
//!
//! The question asked is one-sided: how often does a null replicate look *purer* (lower
//! entropy) than the observed tree? With `r` replicates of which `b` fall strictly below
//! the observation, the bias-corrected estimate is
//!
//! \[
//! \hat p = \frac{1 + b}{r + 1},
//! \]
//!
//! which never reaches zero and equals 1 when there are no replicates.

use std::collections::BTreeMap;

use crate::{PurityError, Result};

/// Empirical p-value of a single observation.
///
/// NaN replicates never count as smaller.
///
/// # Examples
///
/// ```
/// use cladepurity::empirical_p_value;
///
/// let p = empirical_p_value(0.3, &[0.1, 0.2, 0.5, 0.9]);
/// assert!((p - 0.6).abs() < 1e-12);
/// ```
#[must_use]
pub fn empirical_p_value(observed: f64, null: &[f64]) -> f64 {
    let below = null.iter().filter(|&&x| x < observed).count();
    (1 + below) as f64 / (null.len() + 1) as f64
}

/// Empirical p-value per depth: `observed[i]` against the replicates in `null[i]`.
///
/// Replicate sets may differ in size across depths.
///
/// # Errors
///
/// Returns [`PurityError::InputShape`] if the two series have different lengths.
pub fn empirical_p_values<N>(observed: &[f64], null: &[N]) -> Result<Vec<f64>>
where
    N: AsRef<[f64]>,
{
    if observed.len() != null.len() {
        return Err(PurityError::InputShape {
            observed: observed.len(),
            null: null.len(),
        });
    }
    Ok(observed
        .iter()
        .zip(null)
        .map(|(&obs, dist)| empirical_p_value(obs, dist.as_ref()))
        .collect())
}

/// Null entropy replicates keyed by tree depth.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NullDistribution {
    by_depth: BTreeMap<usize, Vec<f64>>,
}

impl NullDistribution {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append replicate values for `depth`.
    pub fn extend<I>(&mut self, depth: usize, values: I)
    where
        I: IntoIterator<Item = f64>,
    {
        self.by_depth.entry(depth).or_default().extend(values);
    }

    #[must_use]
    pub fn get(&self, depth: usize) -> Option<&[f64]> {
        self.by_depth.get(&depth).map(Vec::as_slice)
    }

    #[must_use]
    pub fn depths(&self) -> Vec<usize> {
        self.by_depth.keys().copied().collect()
    }

    /// Replicate sets aligned with `depths`.
    ///
    /// # Errors
    ///
    /// Returns [`PurityError::InputShape`] if any requested depth has no replicates
    /// entry; `null` then counts the depths that were found.
    pub fn aligned(&self, depths: &[usize]) -> Result<Vec<&[f64]>> {
        let found: Vec<&[f64]> = depths.iter().filter_map(|&d| self.get(d)).collect();
        if found.len() != depths.len() {
            return Err(PurityError::InputShape {
                observed: depths.len(),
                null: found.len(),
            });
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bias_corrected_rank() {
        let p = empirical_p_values(&[0.3], &[vec![0.1, 0.2, 0.5, 0.9]]).unwrap();
        assert_eq!(p.len(), 1);
        assert!((p[0] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn ties_do_not_count_as_smaller() {
        assert!((empirical_p_value(0.5, &[0.5, 0.5, 0.5]) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn empty_replicates_give_one() {
        assert_eq!(empirical_p_value(0.1, &[]), 1.0);
    }

    #[test]
    fn nan_replicates_are_ignored_in_the_count() {
        assert!((empirical_p_value(1.0, &[f64::NAN, 0.5]) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn replicate_sets_may_vary_in_size() {
        let null: Vec<Vec<f64>> = vec![vec![0.0], vec![0.0, 0.0, 0.0]];
        let p = empirical_p_values(&[1.0, 1.0], &null).unwrap();
        assert!((p[0] - 1.0).abs() < 1e-12);
        assert!((p[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn length_mismatch_fails_fast() {
        let err = empirical_p_values(&[0.1, 0.2], &[vec![0.3]]).unwrap_err();
        assert!(matches!(err, PurityError::InputShape { observed: 2, null: 1 }));
    }

    #[test]
    fn null_distribution_alignment() {
        let mut nd = NullDistribution::new();
        nd.extend(1, [0.2, 0.4]);
        nd.extend(2, [0.1]);
        nd.extend(1, [0.6]);
        assert_eq!(nd.depths(), vec![1, 2]);
        let aligned = nd.aligned(&[2, 1]).unwrap();
        assert_eq!(aligned[0], &[0.1]);
        assert_eq!(aligned[1], &[0.2, 0.4, 0.6]);
        assert!(matches!(
            nd.aligned(&[1, 3]),
            Err(PurityError::InputShape { observed: 2, null: 1 })
        ));
    }

    proptest! {
        #[test]
        fn p_value_is_monotone_in_observed(
            null in prop::collection::vec(-10.0f64..10.0, 0..50),
            a in -12.0f64..12.0,
            b in -12.0f64..12.0,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let p_lo = empirical_p_value(lo, &null);
            let p_hi = empirical_p_value(hi, &null);
            prop_assert!(p_lo <= p_hi);
            prop_assert!(p_lo > 0.0 && p_hi <= 1.0);
        }
    }
}
