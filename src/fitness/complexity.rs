//! Size penalty applied on top of the raw score.

// Genome sizes are small
#![allow(clippy::cast_precision_loss)]

use crate::ea::{AdjustScore, Genome};

/// Penalizes genomes larger than a threshold.
///
/// Past `threshold` nodes the penalty grows linearly from `penalty` to
/// `full_penalty` (as a fraction of the raw score), reaching it at
/// `full_threshold` and staying there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexityAdjustedScore {
    /// Size above which the penalty starts.
    pub threshold: usize,
    /// Size at which the full penalty applies.
    pub full_threshold: usize,
    /// Fraction of the score charged just past `threshold`.
    pub penalty: f64,
    /// Fraction of the score charged at `full_threshold`.
    pub full_penalty: f64,
    should_minimize: bool,
}

impl Default for ComplexityAdjustedScore {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ComplexityAdjustedScore {
    /// Default thresholds (10/50 nodes, 0.2/2.0 of the score), oriented so
    /// the penalty always makes a score worse.
    #[must_use]
    pub fn new(should_minimize: bool) -> Self {
        Self {
            threshold: 10,
            full_threshold: 50,
            penalty: 0.2,
            full_penalty: 2.0,
            should_minimize,
        }
    }

    /// Fraction of the score charged for a genome of `size` nodes.
    #[must_use]
    pub fn penalty_fraction(&self, size: usize) -> f64 {
        if size <= self.threshold {
            return 0.0;
        }
        let range = self.full_threshold.saturating_sub(self.threshold).max(1);
        let over = (size - self.threshold).min(range);
        self.penalty + (self.full_penalty - self.penalty) * over as f64 / range as f64
    }
}

impl<G: Genome> AdjustScore<G> for ComplexityAdjustedScore {
    fn calculate_adjustment(&self, genome: &G) -> f64 {
        let amount = genome.score().abs() * self.penalty_fraction(genome.size());
        if self.should_minimize { amount } else { -amount }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ea::adjust_score;
    use crate::prg::{Program, ProgramContext};
    use std::sync::Arc;

    #[test]
    fn test_penalty_curve() {
        let adj = ComplexityAdjustedScore::default();
        assert_eq!(adj.penalty_fraction(10), 0.0);
        assert!((adj.penalty_fraction(30) - 1.1).abs() < 1e-12);
        assert_eq!(adj.penalty_fraction(50), 2.0);
        assert_eq!(adj.penalty_fraction(500), 2.0);
    }

    #[test]
    fn test_small_programs_untouched() {
        let mut ctx = ProgramContext::with_all_functions();
        ctx.define_variable("x").unwrap();
        let mut p = Program::from_expression(Arc::new(ctx), "x + 1").unwrap();
        p.set_score(4.0);
        let adjusters: Vec<Box<dyn AdjustScore<Program>>> =
            vec![Box::new(ComplexityAdjustedScore::default())];
        adjust_score(&mut p, &adjusters);
        assert_eq!(p.adjusted_score(), 4.0);
    }

    #[test]
    fn test_penalty_direction() {
        let mut ctx = ProgramContext::with_all_functions();
        ctx.define_variable("x").unwrap();
        let text = "x + x + x + x + x + x + x + x + x + x + x + x + x + x + x + x + x + x + x + x";
        let mut p = Program::from_expression(Arc::new(ctx), text).unwrap();
        p.set_score(1.0);
        let down = ComplexityAdjustedScore::new(true).calculate_adjustment(&p);
        let up = ComplexityAdjustedScore::new(false).calculate_adjustment(&p);
        assert!(down > 0.0);
        assert_eq!(up, -down);
    }
}
