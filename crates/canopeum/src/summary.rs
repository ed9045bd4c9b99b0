//! Site summary figures.
//!
//! Everything here works on already-fetched quantities and is recomputed on
//! every request.

use serde::Serialize;

/// Per-batch inputs to a site summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchFigures {
    /// Sum of the batch's species quantities.
    pub plant_count: i64,
    pub survived_count: Option<i32>,
    pub total_propagation: Option<i32>,
}

/// Sum of quantities, widened so large sites cannot overflow.
pub fn plant_count(quantities: impl IntoIterator<Item = i32>) -> i64 {
    quantities.into_iter().map(i64::from).sum()
}

/// Percentage of the site's plants accounted for by its batches.
///
/// Returns 0 when the site has no plants. Not clamped to 100: a value above
/// 100 means batches declare more plants than the site does.
pub fn sponsor_progress(site_plant_count: i64, batches: &[BatchFigures]) -> f64 {
    if site_plant_count == 0 {
        return 0.0;
    }
    let sponsored: i64 = batches.iter().map(|batch| batch.plant_count).sum();
    sponsored as f64 / site_plant_count as f64 * 100.0
}

pub fn survived_count(batches: &[BatchFigures]) -> i64 {
    batches
        .iter()
        .map(|batch| i64::from(batch.survived_count.unwrap_or(0)))
        .sum()
}

pub fn propagation_count(batches: &[BatchFigures]) -> i64 {
    batches
        .iter()
        .map(|batch| i64::from(batch.total_propagation.unwrap_or(0)))
        .sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteFigures {
    pub plant_count: i64,
    pub sponsor_progress: f64,
    pub survived_count: i64,
    pub propagation_count: i64,
}

impl SiteFigures {
    pub fn compute(site_quantities: impl IntoIterator<Item = i32>, batches: &[BatchFigures]) -> Self {
        let plant_count = plant_count(site_quantities);
        SiteFigures {
            plant_count,
            sponsor_progress: sponsor_progress(plant_count, batches),
            survived_count: survived_count(batches),
            propagation_count: propagation_count(batches),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn batch(plant_count: i64, survived: Option<i32>, propagation: Option<i32>) -> BatchFigures {
        BatchFigures {
            plant_count,
            survived_count: survived,
            total_propagation: propagation,
        }
    }

    #[test]
    fn empty_site_has_no_progress() {
        let figures = SiteFigures::compute(Vec::<i32>::new(), &[batch(10, Some(3), None)]);
        assert_eq!(figures.plant_count, 0);
        assert_eq!(figures.sponsor_progress, 0.0);
        assert_eq!(figures.survived_count, 3);
    }

    #[test]
    fn progress_is_a_percentage_of_site_plants() {
        let figures = SiteFigures::compute([100, 100], &[batch(50, None, None)]);
        assert_eq!(figures.plant_count, 200);
        assert_eq!(figures.sponsor_progress, 25.0);
    }

    #[test]
    fn progress_is_not_capped() {
        let progress = sponsor_progress(10, &[batch(15, None, None), batch(5, None, None)]);
        assert_eq!(progress, 200.0);
    }

    #[test]
    fn missing_counts_are_zero() {
        let batches = [
            batch(0, Some(4), None),
            batch(0, None, Some(7)),
            batch(0, Some(1), Some(2)),
        ];
        assert_eq!(survived_count(&batches), 5);
        assert_eq!(propagation_count(&batches), 9);
    }

    proptest! {
        #[test]
        fn plant_count_is_sum(quantities in prop::collection::vec(0i32..100_000, 0..50)) {
            let expected: i64 = quantities.iter().map(|q| *q as i64).sum();
            prop_assert_eq!(plant_count(quantities), expected);
        }

        #[test]
        fn progress_matches_ratio(
            site in prop::collection::vec(1i32..10_000, 1..20),
            batch_counts in prop::collection::vec(0i64..50_000, 0..10),
        ) {
            let batches: Vec<_> = batch_counts.iter().map(|c| batch(*c, None, None)).collect();
            let figures = SiteFigures::compute(site.clone(), &batches);
            let expected = 100.0 * batch_counts.iter().sum::<i64>() as f64 / figures.plant_count as f64;
            prop_assert!((figures.sponsor_progress - expected).abs() <= 1e-9 * expected.max(1.0));
            prop_assert!(figures.sponsor_progress >= 0.0);
        }
    }
}
