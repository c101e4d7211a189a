//! Range-normalized error, so outputs on different scales weigh the same.

// Pair counts become divisors
#![allow(clippy::cast_precision_loss)]

use super::dataset::TrainingData;
use super::simple::recoverable;
use crate::ea::CalculateScore;
use crate::error::{EaError, EaResult};
use crate::prg::Program;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Smallest range an output is normalized by.
pub const MIN_RANGE: f64 = 0.001;

/// How a normalized difference becomes an error term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Mean of squared normalized differences.
    #[default]
    Squared,
    /// Mean of absolute normalized differences.
    Absolute,
}

/// Scores a program by its error against the first ideal value, divided by
/// the spread of that ideal over the training set. Lower is better.
#[derive(Debug, Clone)]
pub struct AdaptiveSimpleFitness {
    data: Arc<dyn TrainingData>,
    ranges: Vec<f64>,
    kind: ErrorKind,
}

impl AdaptiveSimpleFitness {
    /// Measure the min/max of every ideal output in `data`.
    ///
    /// # Errors
    ///
    /// Returns [`EaError::Configuration`] if `data` is empty, has no ideal
    /// outputs, or has pairs of differing ideal width.
    pub fn new(data: Arc<dyn TrainingData>, kind: ErrorKind) -> EaResult<Self> {
        let width = data.ideal_size();
        if data.count() == 0 || width == 0 {
            return Err(EaError::Configuration(
                "adaptive fitness needs at least one pair with an ideal value".into(),
            ));
        }
        let mut low = vec![f64::INFINITY; width];
        let mut high = vec![f64::NEG_INFINITY; width];
        for (row, pair) in data.pairs().enumerate() {
            if pair.ideal.len() != width {
                return Err(EaError::Configuration(format!(
                    "pair {row} has {} ideal values, expected {width}",
                    pair.ideal.len()
                )));
            }
            for (i, &v) in pair.ideal.iter().enumerate() {
                low[i] = low[i].min(v);
                high[i] = high[i].max(v);
            }
        }
        let ranges = low
            .iter()
            .zip(&high)
            .map(|(lo, hi)| (hi - lo).max(MIN_RANGE))
            .collect();
        Ok(Self { data, ranges, kind })
    }

    /// Normalizing range for each ideal output.
    #[must_use]
    pub fn ranges(&self) -> &[f64] {
        &self.ranges
    }
}

impl CalculateScore<Program> for AdaptiveSimpleFitness {
    fn calculate_score(&self, genome: &Program) -> EaResult<f64> {
        let range = self.ranges.first().copied().unwrap_or(MIN_RANGE);
        let mut sum = 0.0;
        for pair in self.data.pairs() {
            let Some(actual) = recoverable(genome.compute(&pair.input))? else {
                return Ok(f64::NAN);
            };
            let ideal = pair.ideal.first().copied().unwrap_or(0.0);
            let diff = (actual - ideal) / range;
            sum += match self.kind {
                ErrorKind::Squared => diff * diff,
                ErrorKind::Absolute => diff.abs(),
            };
        }
        Ok(sum / self.data.count() as f64)
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

    fn context() -> Arc<ProgramContext> {
        let mut ctx = ProgramContext::with_all_functions();
        ctx.define_variable("x").unwrap();
        Arc::new(ctx)
    }

    #[test]
    fn test_normalized_by_range() {
        let mut data = BasicDataSet::new();
        data.add(vec![0.0], vec![0.0]);
        data.add(vec![1.0], vec![10.0]);
        let fitness = AdaptiveSimpleFitness::new(Arc::new(data), ErrorKind::Absolute).unwrap();
        assert_eq!(fitness.ranges(), &[10.0]);
        // off by 5 everywhere => 0.5 normalized
        let p = Program::from_expression(context(), "x * 10 + 5").unwrap();
        assert!((fitness.calculate_score(&p).unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_range_floor() {
        let mut data = BasicDataSet::new();
        data.add(vec![0.0], vec![3.0]);
        data.add(vec![1.0], vec![3.0]);
        let fitness = AdaptiveSimpleFitness::new(Arc::new(data), ErrorKind::Squared).unwrap();
        assert_eq!(fitness.ranges(), &[MIN_RANGE]);
        let p = Program::from_expression(context(), "3").unwrap();
        assert_eq!(fitness.calculate_score(&p).unwrap(), 0.0);
    }

    #[test]
    fn test_empty_data_rejected() {
        let data = Arc::new(BasicDataSet::new());
        assert!(AdaptiveSimpleFitness::new(data, ErrorKind::Squared).is_err());
    }

    #[test]
    fn test_ragged_ideals_rejected() {
        let mut data = BasicDataSet::new();
        data.add(vec![1.0], vec![1.0]);
        data.add(vec![2.0], vec![]);
        let err = AdaptiveSimpleFitness::new(Arc::new(data), ErrorKind::Squared).unwrap_err();
        assert!(matches!(err, EaError::Configuration(_)));
    }
}
