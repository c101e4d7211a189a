//! Scoring plumbing: fitness functions, score adjusters and parallel
//! evaluation of many genomes.

use super::genome::Genome;
use crate::error::EaResult;
use log::trace;
use rayon::prelude::*;
use std::fmt;

/// A fitness function.
pub trait CalculateScore<G>: Send + Sync + fmt::Debug {
    /// Score one genome.
    ///
    /// A genome that fails evaluation in a recoverable way scores `NaN`.
    ///
    /// # Errors
    ///
    /// Only for fatal failures, such as a corrupt program buffer.
    fn calculate_score(&self, genome: &G) -> EaResult<f64>;

    /// True if lower scores are better.
    fn should_minimize(&self) -> bool;

    /// True if genomes must be scored one at a time.
    fn requires_single_threaded(&self) -> bool {
        false
    }
}

/// Adds a bonus or penalty to a genome's raw score.
pub trait AdjustScore<G>: Send + Sync + fmt::Debug {
    /// Amount added to the raw score.
    fn calculate_adjustment(&self, genome: &G) -> f64;
}

/// Set the adjusted score from the raw score and every adjuster.
pub fn adjust_score<G: Genome>(genome: &mut G, adjusters: &[Box<dyn AdjustScore<G>>]) {
    let adjusted = adjusters
        .iter()
        .fold(genome.score(), |score, adjuster| score + adjuster.calculate_adjustment(genome));
    genome.set_adjusted_score(adjusted);
}

/// Score one genome and apply the adjusters.
///
/// # Errors
///
/// Propagates fatal scoring failures.
pub fn score_genome<G: Genome>(
    genome: &mut G,
    score: &dyn CalculateScore<G>,
    adjusters: &[Box<dyn AdjustScore<G>>],
) -> EaResult<()> {
    let s = score.calculate_score(genome)?;
    genome.set_score(s);
    adjust_score(genome, adjusters);
    Ok(())
}

/// Score every genome, in parallel unless the fitness function forbids it.
///
/// # Errors
///
/// Propagates the first fatal scoring failure.
pub fn score_genomes<G: Genome>(
    genomes: &mut [G],
    score: &dyn CalculateScore<G>,
    adjusters: &[Box<dyn AdjustScore<G>>],
) -> EaResult<()> {
    if score.requires_single_threaded() {
        trace!("scoring {} genomes sequentially", genomes.len());
        genomes
            .iter_mut()
            .try_for_each(|g| score_genome(g, score, adjusters))
    } else {
        trace!("scoring {} genomes in parallel", genomes.len());
        genomes
            .par_iter_mut()
            .try_for_each(|g| score_genome(g, score, adjusters))
    }
}
