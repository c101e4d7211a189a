//! The unit of selection.

use crate::prg::Program;
use std::fmt;

/// True for a score that has been computed and is usable for ranking.
#[must_use]
pub fn is_valid_score(score: f64) -> bool {
    score.is_finite()
}

/// A candidate solution under evolutionary search.
///
/// Scores are `NaN` until the genome is evaluated. Cloning is the genome
/// factory's copy operation and must be deep.
pub trait Genome: Clone + Send + Sync + fmt::Debug {
    /// Raw score from the fitness function.
    fn score(&self) -> f64;

    /// Store the raw score.
    fn set_score(&mut self, score: f64);

    /// Score after adjusters have applied bonuses and penalties.
    fn adjusted_score(&self) -> f64;

    /// Store the adjusted score.
    fn set_adjusted_score(&mut self, score: f64);

    /// Size used to cap offspring growth.
    fn size(&self) -> usize;

    /// Generation in which the genome was created.
    fn birth_generation(&self) -> u64;

    /// Record the generation in which the genome was created.
    fn set_birth_generation(&mut self, generation: u64);
}

impl Genome for Program {
    fn score(&self) -> f64 {
        self.score
    }

    fn set_score(&mut self, score: f64) {
        self.score = score;
    }

    fn adjusted_score(&self) -> f64 {
        self.adjusted_score
    }

    fn set_adjusted_score(&mut self, score: f64) {
        self.adjusted_score = score;
    }

    /// Node count.
    fn size(&self) -> usize {
        Program::size(self)
    }

    fn birth_generation(&self) -> u64 {
        Program::birth_generation(self)
    }

    fn set_birth_generation(&mut self, generation: u64) {
        Program::set_birth_generation(self, generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prg::ProgramContext;
    use std::sync::Arc;

    #[test]
    fn test_program_genome_starts_unscored() {
        let mut ctx = ProgramContext::with_all_functions();
        ctx.define_variable("x").unwrap();
        let mut p = Program::from_expression(Arc::new(ctx), "x + 1").unwrap();
        assert!(!is_valid_score(Genome::score(&p)));
        assert!(!is_valid_score(p.adjusted_score()));

        p.set_score(2.0);
        p.set_adjusted_score(2.5);
        assert_eq!(Genome::score(&p), 2.0);
        assert_eq!(Genome::size(&p), 3);

        // Changing the program invalidates its scores
        p.set_root(&crate::prg::ProgramNode::float(1.0));
        assert!(!is_valid_score(Genome::score(&p)));
    }
}
