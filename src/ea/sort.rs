//! Genome comparators.
//!
//! Every comparator ranks an invalid score (`NaN` or infinite) below every
//! valid one, whatever the direction.

use super::genome::{Genome, is_valid_score};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Orders genomes best-first by raw or adjusted score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreComparator {
    minimize: bool,
    adjusted: bool,
}

impl ScoreComparator {
    /// Compare raw scores in the given direction.
    #[must_use]
    pub const fn new(minimize: bool) -> Self {
        Self {
            minimize,
            adjusted: false,
        }
    }

    /// Lower raw scores are better.
    #[must_use]
    pub const fn minimize() -> Self {
        Self::new(true)
    }

    /// Higher raw scores are better.
    #[must_use]
    pub const fn maximize() -> Self {
        Self::new(false)
    }

    /// Same direction, comparing adjusted scores.
    #[must_use]
    pub const fn adjusted(self) -> Self {
        Self {
            adjusted: true,
            ..self
        }
    }

    /// True if lower scores are better.
    #[must_use]
    pub const fn should_minimize(&self) -> bool {
        self.minimize
    }

    /// True if the adjusted score is compared.
    #[must_use]
    pub const fn uses_adjusted(&self) -> bool {
        self.adjusted
    }

    /// The score this comparator looks at.
    pub fn key<G: Genome>(&self, genome: &G) -> f64 {
        if self.adjusted {
            genome.adjusted_score()
        } else {
            genome.score()
        }
    }

    /// `Less` if `a` is better than `b`.
    #[must_use]
    pub fn compare_scores(&self, a: f64, b: f64) -> Ordering {
        match (is_valid_score(a), is_valid_score(b)) {
            (false, false) => Ordering::Equal,
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (true, true) => {
                let ord = a.total_cmp(&b);
                if self.minimize { ord } else { ord.reverse() }
            }
        }
    }

    /// `Less` if `a` is better than `b`. Suitable for best-first sorting.
    pub fn compare<G: Genome>(&self, a: &G, b: &G) -> Ordering {
        self.compare_scores(self.key(a), self.key(b))
    }

    /// True if score `a` is strictly better than `b`.
    #[must_use]
    pub fn is_better_score(&self, a: f64, b: f64) -> bool {
        self.compare_scores(a, b) == Ordering::Less
    }

    /// True if `a` is strictly better than `b`.
    pub fn is_better_than<G: Genome>(&self, a: &G, b: &G) -> bool {
        self.compare(a, b) == Ordering::Less
    }

    /// Move `value` towards better by the fraction `bonus`.
    #[must_use]
    pub fn apply_bonus(&self, value: f64, bonus: f64) -> f64 {
        let amount = value.abs() * bonus;
        if self.minimize { value - amount } else { value + amount }
    }

    /// Move `value` towards worse by the fraction `penalty`.
    #[must_use]
    pub fn apply_penalty(&self, value: f64, penalty: f64) -> f64 {
        let amount = value.abs() * penalty;
        if self.minimize { value + amount } else { value - amount }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction() {
        let min = ScoreComparator::minimize();
        let max = ScoreComparator::maximize();
        assert!(min.is_better_score(1.0, 2.0));
        assert!(max.is_better_score(2.0, 1.0));
        assert_eq!(min.compare_scores(1.0, 1.0), Ordering::Equal);
    }

    #[test]
    fn test_invalid_scores_are_worst() {
        for cmp in [ScoreComparator::minimize(), ScoreComparator::maximize()] {
            assert!(cmp.is_better_score(1e9, f64::NAN));
            assert!(cmp.is_better_score(-1e9, f64::INFINITY));
            assert!(cmp.is_better_score(0.0, f64::NEG_INFINITY));
            assert!(!cmp.is_better_score(f64::NAN, 0.0));
            assert_eq!(cmp.compare_scores(f64::NAN, f64::INFINITY), Ordering::Equal);
        }
    }

    #[test]
    fn test_sort_best_first() {
        let cmp = ScoreComparator::minimize();
        let mut scores = vec![3.0, f64::NAN, 1.0, 2.0];
        scores.sort_by(|a, b| cmp.compare_scores(*a, *b));
        assert_eq!(&scores[..3], &[1.0, 2.0, 3.0]);
        assert!(scores[3].is_nan());
    }

    #[test]
    fn test_bonus_and_penalty() {
        let min = ScoreComparator::minimize();
        assert_eq!(min.apply_bonus(10.0, 0.1), 9.0);
        assert_eq!(min.apply_penalty(10.0, 0.1), 11.0);
        let max = ScoreComparator::maximize();
        assert_eq!(max.apply_bonus(10.0, 0.1), 11.0);
        assert_eq!(max.apply_penalty(-10.0, 0.1), -11.0);
    }
}
