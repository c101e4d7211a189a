//! Selection operators.
//!
//! Selection picks a genome to reproduce; anti-selection picks one to
//! eliminate. Both work on a candidate list and return an index into it.

// Truncation bounds are computed from fractions of the candidate count
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use super::genome::{Genome, is_valid_score};
use super::sort::ScoreComparator;
use crate::error::{EaError, EaResult};
use rand::{Rng, RngCore};
use std::fmt;

/// Picks genomes for reproduction and elimination.
pub trait SelectionOperator<G: Genome>: Send + Sync + fmt::Debug {
    /// Index of a genome to reproduce, or `None` if `candidates` is empty.
    ///
    /// Never returns an invalid-score genome while a valid one exists.
    fn perform_selection(
        &self,
        rng: &mut dyn RngCore,
        candidates: &[&G],
        comparator: ScoreComparator,
    ) -> Option<usize>;

    /// Index of a genome to eliminate, or `None` if `candidates` is empty.
    fn perform_anti_selection(
        &self,
        rng: &mut dyn RngCore,
        candidates: &[&G],
        comparator: ScoreComparator,
    ) -> Option<usize>;
}

/// Best of `rounds + 1` random draws.
#[derive(Debug, Clone, Copy)]
pub struct TournamentSelection {
    rounds: usize,
}

impl TournamentSelection {
    /// Create a tournament of `rounds + 1` draws.
    #[must_use]
    pub const fn new(rounds: usize) -> Self {
        Self { rounds }
    }

    /// Rounds per tournament.
    #[must_use]
    pub const fn rounds(&self) -> usize {
        self.rounds
    }
}

/// First valid candidate scanning from `start`, wrapping around.
fn first_valid<G: Genome>(candidates: &[&G], start: usize, comparator: ScoreComparator) -> Option<usize> {
    let n = candidates.len();
    (0..n)
        .map(|offset| (start + offset) % n)
        .find(|&i| is_valid_score(comparator.key(candidates[i])))
}

impl<G: Genome> SelectionOperator<G> for TournamentSelection {
    fn perform_selection(
        &self,
        rng: &mut dyn RngCore,
        candidates: &[&G],
        comparator: ScoreComparator,
    ) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let mut best: Option<usize> = None;
        for _ in 0..=self.rounds {
            let i = rng.gen_range(0..candidates.len());
            if !is_valid_score(comparator.key(candidates[i])) {
                continue;
            }
            if best.is_none_or(|b| comparator.is_better_than(candidates[i], candidates[b])) {
                best = Some(i);
            }
        }
        best.or_else(|| {
            let start = rng.gen_range(0..candidates.len());
            Some(first_valid(candidates, start, comparator).unwrap_or(start))
        })
    }

    fn perform_anti_selection(
        &self,
        rng: &mut dyn RngCore,
        candidates: &[&G],
        comparator: ScoreComparator,
    ) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let mut worst: Option<usize> = None;
        for _ in 0..=self.rounds {
            let i = rng.gen_range(0..candidates.len());
            if !is_valid_score(comparator.key(candidates[i])) {
                return Some(i);
            }
            if worst.is_none_or(|w| comparator.is_better_than(candidates[w], candidates[i])) {
                worst = Some(i);
            }
        }
        worst
    }
}

/// Uniform draw from the best (or worst) fraction of the candidates.
#[derive(Debug, Clone, Copy)]
pub struct TruncationSelection {
    percent: f64,
}

impl TruncationSelection {
    /// Select from the top `percent` of the ranking.
    ///
    /// # Errors
    ///
    /// Returns [`EaError::Configuration`] unless `0 < percent <= 1`.
    pub fn new(percent: f64) -> EaResult<Self> {
        if percent > 0.0 && percent <= 1.0 {
            Ok(Self { percent })
        } else {
            Err(EaError::Configuration(format!(
                "truncation percent {percent} outside (0, 1]"
            )))
        }
    }

    /// Fraction of the ranking selection draws from.
    #[must_use]
    pub const fn percent(&self) -> f64 {
        self.percent
    }

    fn ranked<G: Genome>(candidates: &[&G], comparator: ScoreComparator) -> Vec<usize> {
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| comparator.compare(candidates[a], candidates[b]));
        order
    }

    fn bound(&self, n: usize) -> usize {
        ((n as f64 * self.percent).ceil() as usize).clamp(1, n)
    }
}

impl<G: Genome> SelectionOperator<G> for TruncationSelection {
    fn perform_selection(
        &self,
        rng: &mut dyn RngCore,
        candidates: &[&G],
        comparator: ScoreComparator,
    ) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let order = Self::ranked(candidates, comparator);
        let valid = candidates
            .iter()
            .filter(|g| is_valid_score(comparator.key(**g)))
            .count();
        let mut bound = self.bound(candidates.len());
        if valid > 0 {
            bound = bound.min(valid);
        }
        Some(order[rng.gen_range(0..bound)])
    }

    fn perform_anti_selection(
        &self,
        rng: &mut dyn RngCore,
        candidates: &[&G],
        comparator: ScoreComparator,
    ) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        let order = Self::ranked(candidates, comparator);
        let bound = self.bound(candidates.len());
        Some(order[order.len() - 1 - rng.gen_range(0..bound)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prg::{Program, ProgramContext};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use std::sync::Arc;

    fn genomes(scores: &[f64]) -> Vec<Program> {
        let mut ctx = ProgramContext::with_all_functions();
        ctx.define_variable("x").unwrap();
        let ctx = Arc::new(ctx);
        scores
            .iter()
            .map(|&s| {
                let mut p = Program::from_expression(Arc::clone(&ctx), "x").unwrap();
                p.set_score(s);
                p.set_adjusted_score(s);
                p
            })
            .collect()
    }

    fn refs(genomes: &[Program]) -> Vec<&Program> {
        genomes.iter().collect()
    }

    #[test]
    fn test_tournament_prefers_better() {
        let pop = genomes(&[5.0, 1.0, 3.0, 4.0]);
        let cands = refs(&pop);
        let sel = TournamentSelection::new(8);
        let mut rng = SmallRng::seed_from_u64(1);
        let picks: Vec<usize> = (0..50)
            .map(|_| sel.perform_selection(&mut rng, &cands, ScoreComparator::minimize()).unwrap())
            .collect();
        let best = picks.iter().filter(|&&i| i == 1).count();
        assert!(best > 30, "best picked {best} times");
    }

    #[test]
    fn test_tournament_skips_invalid() {
        let pop = genomes(&[f64::NAN, f64::NAN, f64::NAN, 2.0, f64::INFINITY]);
        let cands = refs(&pop);
        let sel = TournamentSelection::new(0);
        let mut rng = SmallRng::seed_from_u64(2);
        for _ in 0..100 {
            let i = sel
                .perform_selection(&mut rng, &cands, ScoreComparator::maximize())
                .unwrap();
            assert_eq!(i, 3);
        }
    }

    #[test]
    fn test_anti_selection_all_invalid() {
        let pop = genomes(&[f64::NAN, f64::INFINITY, f64::NAN]);
        let cands = refs(&pop);
        let mut rng = SmallRng::seed_from_u64(3);
        let tournament = TournamentSelection::new(3);
        let truncation = TruncationSelection::new(0.5).unwrap();
        for _ in 0..20 {
            let i = tournament
                .perform_anti_selection(&mut rng, &cands, ScoreComparator::minimize())
                .unwrap();
            assert!(!pop[i].score().is_finite());
            let j = truncation
                .perform_anti_selection(&mut rng, &cands, ScoreComparator::minimize())
                .unwrap();
            assert!(!pop[j].score().is_finite());
        }
    }

    #[test]
    fn test_anti_selection_prefers_invalid() {
        let pop = genomes(&[1.0, 2.0, f64::NAN, 3.0]);
        let cands = refs(&pop);
        let sel = TournamentSelection::new(30);
        let mut rng = SmallRng::seed_from_u64(4);
        let i = sel
            .perform_anti_selection(&mut rng, &cands, ScoreComparator::minimize())
            .unwrap();
        assert_eq!(i, 2);
    }

    #[test]
    fn test_truncation_honours_percent() {
        let pop = genomes(&[9.0, 1.0, 8.0, 2.0, 7.0, 3.0, 6.0, 4.0, 5.0, 10.0]);
        let cands = refs(&pop);
        let sel = TruncationSelection::new(0.2).unwrap();
        let mut rng = SmallRng::seed_from_u64(5);
        for _ in 0..50 {
            let i = sel
                .perform_selection(&mut rng, &cands, ScoreComparator::minimize())
                .unwrap();
            assert!(pop[i].score() <= 2.0);
            let j = sel
                .perform_anti_selection(&mut rng, &cands, ScoreComparator::minimize())
                .unwrap();
            assert!(pop[j].score() >= 9.0);
        }
    }

    #[test]
    fn test_truncation_never_selects_invalid() {
        let pop = genomes(&[f64::NAN, 4.0, f64::NAN, f64::NAN]);
        let cands = refs(&pop);
        let sel = TruncationSelection::new(1.0).unwrap();
        let mut rng = SmallRng::seed_from_u64(6);
        for _ in 0..20 {
            let i = sel
                .perform_selection(&mut rng, &cands, ScoreComparator::maximize())
                .unwrap();
            assert_eq!(i, 1);
        }
    }

    #[test]
    fn test_empty_candidates() {
        let cands: Vec<&Program> = Vec::new();
        let mut rng = SmallRng::seed_from_u64(7);
        let sel = TournamentSelection::new(2);
        assert!(sel.perform_selection(&mut rng, &cands, ScoreComparator::minimize()).is_none());
        assert!(TruncationSelection::new(0.0).is_err());
    }
}
