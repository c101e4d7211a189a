//! Weighted sum of several fitness functions.

use crate::ea::CalculateScore;
use crate::error::{EaError, EaResult};
use std::fmt;

/// Combines objectives as `Σ weight · score`.
///
/// Every objective must optimize in the same direction.
pub struct MultiObjectiveFitness<G> {
    objectives: Vec<(f64, Box<dyn CalculateScore<G>>)>,
}

impl<G> fmt::Debug for MultiObjectiveFitness<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiObjectiveFitness")
            .field("objectives", &self.objectives)
            .finish()
    }
}

impl<G> Default for MultiObjectiveFitness<G> {
    fn default() -> Self {
        Self { objectives: Vec::new() }
    }
}

impl<G> MultiObjectiveFitness<G> {
    /// Create an empty combination.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an objective with `weight`.
    ///
    /// # Errors
    ///
    /// Returns [`EaError::Configuration`] if the weight is not finite or the
    /// objective's direction differs from those already added.
    pub fn add(&mut self, weight: f64, objective: Box<dyn CalculateScore<G>>) -> EaResult<()> {
        if !weight.is_finite() {
            return Err(EaError::Configuration(format!("invalid objective weight {weight}")));
        }
        if let Some((_, first)) = self.objectives.first() {
            if first.should_minimize() != objective.should_minimize() {
                return Err(EaError::Configuration(format!(
                    "objective {objective:?} does not agree on minimize/maximize"
                )));
            }
        }
        self.objectives.push((weight, objective));
        Ok(())
    }

    /// Builder form of [`MultiObjectiveFitness::add`].
    ///
    /// # Errors
    ///
    /// See [`MultiObjectiveFitness::add`].
    pub fn with(mut self, weight: f64, objective: Box<dyn CalculateScore<G>>) -> EaResult<Self> {
        self.add(weight, objective)?;
        Ok(self)
    }

    /// Number of objectives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    /// True if no objective has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }
}

impl<G> CalculateScore<G> for MultiObjectiveFitness<G> {
    fn calculate_score(&self, genome: &G) -> EaResult<f64> {
        if self.objectives.is_empty() {
            return Err(EaError::Configuration("no objectives to score".into()));
        }
        let mut total = 0.0;
        for (weight, objective) in &self.objectives {
            total += weight * objective.calculate_score(genome)?;
        }
        Ok(total)
    }

    fn should_minimize(&self) -> bool {
        self.objectives
            .first()
            .is_none_or(|(_, objective)| objective.should_minimize())
    }

    fn requires_single_threaded(&self) -> bool {
        self.objectives
            .iter()
            .any(|(_, objective)| objective.requires_single_threaded())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed {
        value: f64,
        minimize: bool,
    }

    impl CalculateScore<u32> for Fixed {
        fn calculate_score(&self, _genome: &u32) -> EaResult<f64> {
            Ok(self.value)
        }

        fn should_minimize(&self) -> bool {
            self.minimize
        }
    }

    fn fixed(value: f64, minimize: bool) -> Box<dyn CalculateScore<u32>> {
        Box::new(Fixed { value, minimize })
    }

    #[test]
    fn test_weighted_sum() {
        let fitness = MultiObjectiveFitness::new()
            .with(0.5, fixed(2.0, true))
            .unwrap()
            .with(0.5, fixed(4.0, true))
            .unwrap();
        assert_eq!(fitness.calculate_score(&0).unwrap(), 3.0);
        assert!(fitness.should_minimize());
    }

    #[test]
    fn test_direction_mismatch() {
        let mut fitness = MultiObjectiveFitness::new();
        fitness.add(1.0, fixed(1.0, false)).unwrap();
        let err = fitness.add(1.0, fixed(1.0, true)).unwrap_err();
        assert!(matches!(err, EaError::Configuration(_)));
        assert_eq!(fitness.len(), 1);
        assert!(!fitness.should_minimize());
    }

    #[test]
    fn test_empty_is_an_error() {
        let fitness: MultiObjectiveFitness<u32> = MultiObjectiveFitness::new();
        assert!(fitness.calculate_score(&0).is_err());
    }
}
