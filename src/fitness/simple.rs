//! Mean squared error over a training set.

// Pair counts become divisors
#![allow(clippy::cast_precision_loss)]

use super::dataset::TrainingData;
use crate::ea::CalculateScore;
use crate::error::{EaError, EaResult, ProgramError};
use crate::prg::Program;
use std::sync::Arc;

/// Map a program result to a score contribution: recoverable errors give
/// `None` (the genome scores NaN), fatal ones propagate.
pub(crate) fn recoverable(result: Result<f64, ProgramError>) -> EaResult<Option<f64>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_fatal() => Err(EaError::Program(e)),
        Err(_) => Ok(None),
    }
}

/// Scores a program by its mean squared error against the first ideal
/// value of each pair. Lower is better.
#[derive(Debug, Clone)]
pub struct TrainingSetScore {
    data: Arc<dyn TrainingData>,
}

impl TrainingSetScore {
    /// Score against `data`.
    #[must_use]
    pub fn new(data: Arc<dyn TrainingData>) -> Self {
        Self { data }
    }

    /// The training data.
    #[must_use]
    pub fn data(&self) -> &Arc<dyn TrainingData> {
        &self.data
    }
}

impl CalculateScore<Program> for TrainingSetScore {
    fn calculate_score(&self, genome: &Program) -> EaResult<f64> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for pair in self.data.pairs() {
            let Some(actual) = recoverable(genome.compute(&pair.input))? else {
                return Ok(f64::NAN);
            };
            let ideal = pair.ideal.first().copied().unwrap_or(0.0);
            let diff = actual - ideal;
            sum += diff * diff;
            count += 1;
        }
        if count == 0 {
            return Ok(f64::NAN);
        }
        Ok(sum / count as f64)
    }

    fn should_minimize(&self) -> bool {
        true
    }

    fn requires_single_threaded(&self) -> bool {
        !self.data.is_thread_safe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::BasicDataSet;
    use crate::prg::ProgramContext;

    fn setup() -> (Arc<ProgramContext>, TrainingSetScore) {
        let mut ctx = ProgramContext::with_all_functions();
        ctx.define_variable("x").unwrap();
        let mut data = BasicDataSet::new();
        data.add(vec![1.0], vec![2.0]);
        data.add(vec![2.0], vec![4.0]);
        (Arc::new(ctx), TrainingSetScore::new(Arc::new(data)))
    }

    #[test]
    fn test_mean_squared_error() {
        let (ctx, score) = setup();
        let exact = Program::from_expression(Arc::clone(&ctx), "x * 2").unwrap();
        assert_eq!(score.calculate_score(&exact).unwrap(), 0.0);
        // errors of 1 and 2 => (1 + 4) / 2
        let off = Program::from_expression(ctx, "x + 1").unwrap();
        assert_eq!(score.calculate_score(&off).unwrap(), 1.5);
    }

    #[test]
    fn test_broken_program_scores_nan() {
        let (ctx, score) = setup();
        let p = Program::from_expression(ctx, "x / (x - x)").unwrap();
        assert!(score.calculate_score(&p).unwrap().is_nan());
        assert!(score.should_minimize());
        assert!(!score.requires_single_threaded());
    }
}
