//! Mutation operators for programs.
//!
//! Both operators clone their parent and change the clone, so the parent's
//! buffer is never touched.

use super::context::ProgramContext;
use super::generator::ProgramGenerator;
use super::opcode::Opcode;
use super::program::Program;
use super::value::ExpressionValue;
use crate::ea::EvolutionaryOperator;
use crate::error::{EaError, EaResult};
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;
use std::sync::Arc;

/// Perturb float constants with gaussian noise.
///
/// Integer constants are left alone.
#[derive(Debug, Clone, Copy)]
pub struct ConstMutation {
    frequency: f64,
    sigma: f64,
}

impl ConstMutation {
    /// Create a mutation that touches each float constant with probability
    /// `frequency`, adding `N(0, 1) * sigma`.
    ///
    /// # Errors
    ///
    /// Returns [`EaError::Configuration`] if `frequency` is outside `[0, 1]`
    /// or `sigma` is negative or not finite.
    pub fn new(frequency: f64, sigma: f64) -> EaResult<Self> {
        if !(0.0..=1.0).contains(&frequency) {
            return Err(EaError::Configuration(format!(
                "constant mutation frequency {frequency} outside [0, 1]"
            )));
        }
        if !sigma.is_finite() || sigma < 0.0 {
            return Err(EaError::Configuration(format!("invalid constant mutation sigma {sigma}")));
        }
        Ok(Self { frequency, sigma })
    }

    /// Mutate `program` in place.
    ///
    /// # Errors
    ///
    /// Fails only on a malformed buffer.
    pub fn mutate(&self, rng: &mut dyn RngCore, program: &mut Program) -> EaResult<()> {
        for index in program.traverse()? {
            let (opcode, _) = program.header(index)?;
            if opcode != Opcode::Const {
                continue;
            }
            if let ExpressionValue::Float(v) = program.constant(index)? {
                if rng.gen_bool(self.frequency) {
                    let noise: f64 = rng.sample(StandardNormal);
                    program.set_float_constant(index, v + noise * self.sigma)?;
                }
            }
        }
        Ok(())
    }
}

impl EvolutionaryOperator<Program> for ConstMutation {
    fn name(&self) -> &'static str {
        "const-mutation"
    }

    fn parents_needed(&self) -> usize {
        1
    }

    fn offspring_produced(&self) -> usize {
        1
    }

    fn perform_operation(&self, rng: &mut dyn RngCore, parents: &[&Program]) -> EaResult<Vec<Program>> {
        let mut child = parents[0].clone();
        self.mutate(rng, &mut child)?;
        Ok(vec![child])
    }
}

/// Replace one random node with a freshly grown subtree.
#[derive(Debug, Clone)]
pub struct SubtreeMutation {
    generator: ProgramGenerator,
}

impl SubtreeMutation {
    /// Create a mutation growing subtrees up to `max_depth` levels below the
    /// replaced node.
    ///
    /// # Errors
    ///
    /// Fails if the context enables no opcodes or `max_depth` reaches the
    /// tree depth limit.
    pub fn new(context: Arc<ProgramContext>, max_depth: usize) -> EaResult<Self> {
        Ok(Self {
            generator: ProgramGenerator::new(context, max_depth)?,
        })
    }

    /// Mutate `program` in place.
    ///
    /// # Errors
    ///
    /// Fails on a malformed buffer, if no opcode produces the slot's type or
    /// if the result would nest too deep. The program is unchanged on error.
    pub fn mutate(&self, rng: &mut dyn RngCore, program: &mut Program) -> EaResult<()> {
        let ordinal = rng.gen_range(0..program.size().max(1));
        let index = program.node_index(ordinal)?;
        let types = program.expected_types(index)?;
        let subtree = self
            .generator
            .create_node(rng, self.generator.max_depth(), types)?;
        program.replace_subtree(index, &subtree.to_buffer())?;
        Ok(())
    }
}

impl EvolutionaryOperator<Program> for SubtreeMutation {
    fn name(&self) -> &'static str {
        "subtree-mutation"
    }

    fn parents_needed(&self) -> usize {
        1
    }

    fn offspring_produced(&self) -> usize {
        1
    }

    fn perform_operation(&self, rng: &mut dyn RngCore, parents: &[&Program]) -> EaResult<Vec<Program>> {
        let mut child = parents[0].clone();
        self.mutate(rng, &mut child)?;
        Ok(vec![child])
    }
}
