//! Subtree crossover.

use super::program::Program;
use crate::ea::EvolutionaryOperator;
use crate::error::EaResult;
use rand::{Rng, RngCore};

/// Replace a random subtree of the first parent with a random subtree of
/// the second.
///
/// The two picks are independent and their types are not matched. An
/// ill-typed child fails evaluation with a recoverable error and scores NaN.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubtreeCrossover;

impl SubtreeCrossover {
    /// Build one child from `father` and `mother`.
    ///
    /// # Errors
    ///
    /// Fails on a malformed buffer, and recoverably with
    /// [`ProgramError::TooDeep`](crate::ProgramError::TooDeep) if the child
    /// would nest too deep.
    pub fn cross(&self, rng: &mut dyn RngCore, father: &Program, mother: &Program) -> EaResult<Program> {
        let target = father.node_index(rng.gen_range(0..father.size().max(1)))?;
        let source = mother.node_index(rng.gen_range(0..mother.size().max(1)))?;
        let donor = mother.subtree(source)?.to_vec();
        let mut child = father.clone();
        child.replace_subtree(target, &donor)?;
        Ok(child)
    }
}

impl EvolutionaryOperator<Program> for SubtreeCrossover {
    fn name(&self) -> &'static str {
        "subtree-crossover"
    }

    fn parents_needed(&self) -> usize {
        2
    }

    fn offspring_produced(&self) -> usize {
        1
    }

    fn perform_operation(&self, rng: &mut dyn RngCore, parents: &[&Program]) -> EaResult<Vec<Program>> {
        Ok(vec![self.cross(rng, parents[0], parents[1])?])
    }
}
