//! Evolutionary operators and the weighted list the driver draws from.

use crate::error::{EaError, EaResult};
use rand::RngCore;
use rand::distributions::{Distribution, WeightedIndex};
use std::fmt;

/// Produces offspring from parents.
///
/// Operators never modify their parents; they clone and change the clones.
pub trait EvolutionaryOperator<G>: Send + Sync + fmt::Debug {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Parents consumed per call.
    fn parents_needed(&self) -> usize;

    /// Offspring produced per call.
    fn offspring_produced(&self) -> usize;

    /// Build offspring from `parents`, which holds exactly
    /// [`EvolutionaryOperator::parents_needed`] genomes.
    ///
    /// # Errors
    ///
    /// Fails if the operator cannot build a child from these parents.
    fn perform_operation(&self, rng: &mut dyn RngCore, parents: &[&G]) -> EaResult<Vec<G>>;
}

/// Operators with selection probabilities.
#[derive(Debug)]
pub struct OperationList<G> {
    operators: Vec<(f64, Box<dyn EvolutionaryOperator<G>>)>,
    weights: Option<WeightedIndex<f64>>,
}

impl<G> Default for OperationList<G> {
    fn default() -> Self {
        Self {
            operators: Vec::new(),
            weights: None,
        }
    }
}

impl<G> OperationList<G> {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operator drawn with relative weight `probability`.
    ///
    /// Weights need not sum to one.
    ///
    /// # Errors
    ///
    /// Returns [`EaError::Configuration`] for a negative or non-finite
    /// weight, or if every weight is zero.
    pub fn add(&mut self, probability: f64, operator: Box<dyn EvolutionaryOperator<G>>) -> EaResult<()> {
        if !probability.is_finite() || probability < 0.0 {
            return Err(EaError::Configuration(format!(
                "invalid probability {probability} for {}",
                operator.name()
            )));
        }
        self.operators.push((probability, operator));
        match WeightedIndex::new(self.operators.iter().map(|(p, _)| *p)) {
            Ok(weights) => {
                self.weights = Some(weights);
                Ok(())
            }
            Err(e) => {
                self.operators.pop();
                Err(EaError::Configuration(format!("operator weights: {e}")))
            }
        }
    }

    /// Number of operators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    /// True if no operator has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    /// Largest parent count of any operator.
    #[must_use]
    pub fn max_parents(&self) -> usize {
        self.operators
            .iter()
            .map(|(_, op)| op.parents_needed())
            .max()
            .unwrap_or(0)
    }

    /// Largest offspring count of any operator.
    #[must_use]
    pub fn max_offspring(&self) -> usize {
        self.operators
            .iter()
            .map(|(_, op)| op.offspring_produced())
            .max()
            .unwrap_or(0)
    }

    /// Draw an operator by weight.
    pub fn pick(&self, rng: &mut dyn RngCore) -> Option<&dyn EvolutionaryOperator<G>> {
        let index = self.weights.as_ref()?.sample(rng);
        self.operators.get(index).map(|(_, op)| op.as_ref())
    }
}
