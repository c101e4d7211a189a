//! Species: groups of genomes sharing fitness bookkeeping.

use super::genome::{Genome, is_valid_score};
use super::sort::ScoreComparator;

/// A subgroup of the population.
///
/// Members are kept best-first after every [`Species::sort`], so the leader
/// is always the first member.
#[derive(Debug, Clone)]
pub struct Species<G> {
    members: Vec<G>,
    age: u32,
    best_score: f64,
    gens_no_improvement: u32,
    offspring_count: usize,
    offspring_share: f64,
}

impl<G: Genome> Species<G> {
    /// Create a species around its first member.
    #[must_use]
    pub fn new(leader: G) -> Self {
        let best_score = leader.score();
        Self {
            members: vec![leader],
            age: 0,
            best_score,
            gens_no_improvement: 0,
            offspring_count: 0,
            offspring_share: 0.0,
        }
    }

    /// Rebuild a species from saved state.
    #[must_use]
    pub fn from_parts(members: Vec<G>, age: u32, best_score: f64, gens_no_improvement: u32) -> Self {
        Self {
            members,
            age,
            best_score,
            gens_no_improvement,
            offspring_count: 0,
            offspring_share: 0.0,
        }
    }

    /// Member genomes.
    #[must_use]
    pub fn members(&self) -> &[G] {
        &self.members
    }

    /// Mutable member genomes.
    pub fn members_mut(&mut self) -> &mut Vec<G> {
        &mut self.members
    }

    /// Add a member.
    pub fn add(&mut self, genome: G) {
        self.members.push(genome);
    }

    /// Member count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if the species has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Best member, valid once the species has been sorted.
    #[must_use]
    pub fn leader(&self) -> Option<&G> {
        self.members.first()
    }

    /// Generations this species has existed.
    #[must_use]
    pub fn age(&self) -> u32 {
        self.age
    }

    /// Best raw score ever reached by a member.
    #[must_use]
    pub fn best_score(&self) -> f64 {
        self.best_score
    }

    /// Generations since the best score last improved.
    #[must_use]
    pub fn gens_no_improvement(&self) -> u32 {
        self.gens_no_improvement
    }

    /// Members this species may hold after culling.
    #[must_use]
    pub fn offspring_count(&self) -> usize {
        self.offspring_count
    }

    /// Set the spawn quota.
    pub fn set_offspring_count(&mut self, count: usize) {
        self.offspring_count = count;
    }

    /// Share computed by the last [`Species::calculate_share`].
    #[must_use]
    pub fn offspring_share(&self) -> f64 {
        self.offspring_share
    }

    /// Sort members best-first.
    pub fn sort(&mut self, comparator: ScoreComparator) {
        self.members.sort_by(|a, b| comparator.compare(a, b));
    }

    /// Mean fitness of valid members, oriented so that larger is better.
    ///
    /// When minimizing, each adjusted score counts as `max_score - score`.
    /// Invalid members contribute nothing; a species without valid members
    /// gets a share of zero.
    pub fn calculate_share(&mut self, should_minimize: bool, max_score: f64) -> f64 {
        let (total, count) = self
            .members
            .iter()
            .map(Genome::adjusted_score)
            .filter(|s| is_valid_score(*s))
            .fold((0.0, 0usize), |(total, count), s| {
                let s = if should_minimize { max_score - s } else { s };
                (total + s, count + 1)
            });
        #[allow(clippy::cast_precision_loss)]
        let share = if count == 0 { 0.0 } else { total / count as f64 };
        self.offspring_share = share;
        share
    }

    /// Age the species and track whether the leader improved on the best
    /// score. Call after sorting.
    pub fn update_bookkeeping(&mut self, comparator: ScoreComparator) {
        self.age += 1;
        let Some(leader) = self.members.first() else {
            return;
        };
        let score = leader.score();
        if comparator.is_better_score(score, self.best_score) {
            self.best_score = score;
            self.gens_no_improvement = 0;
        } else {
            self.gens_no_improvement += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prg::{Program, ProgramContext};
    use std::sync::Arc;

    fn scored(ctx: &Arc<ProgramContext>, text: &str, score: f64) -> Program {
        let mut p = Program::from_expression(Arc::clone(ctx), text).unwrap();
        p.set_score(score);
        p.set_adjusted_score(score);
        p
    }

    fn context() -> Arc<ProgramContext> {
        let mut ctx = ProgramContext::with_all_functions();
        ctx.define_variable("x").unwrap();
        Arc::new(ctx)
    }

    #[test]
    fn test_sort_puts_leader_first() {
        let ctx = context();
        let mut species = Species::new(scored(&ctx, "x", 3.0));
        species.add(scored(&ctx, "x+1", f64::NAN));
        species.add(scored(&ctx, "x+2", 1.0));
        species.sort(ScoreComparator::minimize());
        assert_eq!(species.leader().unwrap().score(), 1.0);
        assert!(species.members()[2].score().is_nan());
    }

    #[test]
    fn test_share_ignores_invalid() {
        let ctx = context();
        let mut species = Species::new(scored(&ctx, "x", 2.0));
        species.add(scored(&ctx, "x+1", 4.0));
        species.add(scored(&ctx, "x+2", f64::INFINITY));
        assert_eq!(species.calculate_share(false, 0.0), 3.0);
        assert_eq!(species.calculate_share(true, 10.0), 7.0);

        let mut broken = Species::new(scored(&ctx, "x", f64::NAN));
        assert_eq!(broken.calculate_share(true, 10.0), 0.0);
    }

    #[test]
    fn test_bookkeeping() {
        let ctx = context();
        let cmp = ScoreComparator::minimize();
        let mut species = Species::new(scored(&ctx, "x", f64::NAN));
        species.members_mut()[0] = scored(&ctx, "x", 5.0);
        species.update_bookkeeping(cmp);
        assert_eq!(species.best_score(), 5.0);
        assert_eq!(species.gens_no_improvement(), 0);
        species.update_bookkeeping(cmp);
        assert_eq!(species.gens_no_improvement(), 1);
        assert_eq!(species.age(), 2);
    }
}
