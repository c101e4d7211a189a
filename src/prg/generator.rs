//! Random program generation.
//!
//! Trees are built top-down from the types each slot requires, so freshly
//! generated programs are well typed. Operators with two or more children
//! pick one operand type and use it for every child.

use super::context::ProgramContext;
use super::eval::MAX_TREE_DEPTH;
use super::node::ProgramNode;
use super::opcode::Opcode;
use super::program::Program;
use super::value::{ExpressionValue, TypeSet, ValueType};
use crate::ea::CalculateScore;
use crate::error::{EaError, EaResult, ProgramError, PrgResult};
use log::debug;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Tree-shaping strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GenerationMethod {
    /// Any opcode at any depth; leaves forced at the depth limit.
    #[default]
    Grow,
    /// Only functions until the depth limit, then leaves.
    Full,
    /// Random depth in `1..=max_depth`, grow or full with equal odds.
    RampedHalfAndHalf,
}

/// Generates random programs for a context.
#[derive(Debug, Clone)]
pub struct ProgramGenerator {
    context: Arc<ProgramContext>,
    max_depth: usize,
    method: GenerationMethod,
    min_const: f64,
    max_const: f64,
    max_generation_errors: usize,
}

impl ProgramGenerator {
    /// Create a grow generator with constants in `[-10, 10)`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::NoOpcodes`] if the context enables nothing and
    /// [`ProgramError::TooDeep`] if trees could nest past [`MAX_TREE_DEPTH`].
    pub fn new(context: Arc<ProgramContext>, max_depth: usize) -> PrgResult<Self> {
        if context.opcodes().is_empty() {
            return Err(ProgramError::NoOpcodes("an empty context".into()));
        }
        if max_depth >= MAX_TREE_DEPTH {
            return Err(ProgramError::TooDeep {
                depth: max_depth + 1,
                max: MAX_TREE_DEPTH,
            });
        }
        Ok(Self {
            context,
            max_depth,
            method: GenerationMethod::Grow,
            min_const: -10.0,
            max_const: 10.0,
            max_generation_errors: 500,
        })
    }

    /// Use a different tree-shaping strategy.
    #[must_use]
    pub fn with_method(mut self, method: GenerationMethod) -> Self {
        self.method = method;
        self
    }

    /// Range for random numeric constants.
    ///
    /// # Errors
    ///
    /// Returns [`EaError::Configuration`] unless both bounds and their span
    /// are finite.
    pub fn with_const_range(mut self, min: f64, max: f64) -> EaResult<Self> {
        check_const_range(min, max)?;
        self.min_const = min.min(max);
        self.max_const = max.max(min);
        Ok(self)
    }

    /// Attempts allowed per genome before population generation gives up.
    #[must_use]
    pub fn with_max_generation_errors(mut self, max: usize) -> Self {
        self.max_generation_errors = max.max(1);
        self
    }

    /// The shared context.
    #[must_use]
    pub fn context(&self) -> &Arc<ProgramContext> {
        &self.context
    }

    /// Configured depth limit.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Generate one program returning the context's result type.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::NoOpcodes`] if some required type has no opcode.
    pub fn generate(&self, rng: &mut dyn RngCore) -> PrgResult<Program> {
        let (depth, full) = match self.method {
            GenerationMethod::Grow => (self.max_depth, false),
            GenerationMethod::Full => (self.max_depth, true),
            GenerationMethod::RampedHalfAndHalf => {
                (rng.gen_range(1..=self.max_depth.max(1)), rng.gen_bool(0.5))
            }
        };
        let types = TypeSet::single(self.context.result().variable_type);
        let root = self.build(rng, depth, types, full)?;
        Ok(Program::from_node(Arc::clone(&self.context), &root))
    }

    /// Build a random subtree (grow method) producing one of `types`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::NoOpcodes`] if some required type has no opcode.
    pub fn create_node(
        &self,
        rng: &mut dyn RngCore,
        depth_remaining: usize,
        types: TypeSet,
    ) -> PrgResult<ProgramNode> {
        self.build(rng, depth_remaining, types, false)
    }

    fn build(
        &self,
        rng: &mut dyn RngCore,
        depth_remaining: usize,
        types: TypeSet,
        full: bool,
    ) -> PrgResult<ProgramNode> {
        if depth_remaining == 0 {
            return self.create_terminal_node(rng, types);
        }

        let mut candidates = self.context.find_opcodes(types, !full, true);
        if candidates.is_empty() && full {
            candidates = self.context.find_opcodes(types, true, false);
        }
        let opcode = *candidates
            .choose(rng)
            .ok_or_else(|| ProgramError::NoOpcodes(format!("{types:?}")))?;

        if opcode.is_leaf() {
            return self.create_leaf(rng, opcode, types);
        }

        let template = opcode.template();
        let mut children = Vec::with_capacity(template.arity());
        if template.is_operator() && template.arity() >= 2 {
            let shared = template.param_types(0, types);
            let chosen: Vec<ValueType> = shared.iter().collect();
            let child_type = chosen
                .choose(rng)
                .map_or(shared, |t| TypeSet::single(*t));
            for _ in 0..template.arity() {
                children.push(self.build(rng, depth_remaining - 1, child_type, full)?);
            }
        } else {
            for slot in 0..template.arity() {
                let child_types = template.param_types(slot, types);
                children.push(self.build(rng, depth_remaining - 1, child_types, full)?);
            }
        }
        ProgramNode::operator(opcode, children)
    }

    /// Build a random leaf producing one of `types`.
    ///
    /// # Errors
    ///
    /// Returns [`ProgramError::NoOpcodes`] if no enabled leaf fits.
    pub fn create_terminal_node(&self, rng: &mut dyn RngCore, types: TypeSet) -> PrgResult<ProgramNode> {
        let candidates = self.context.find_opcodes(types, true, false);
        let opcode = *candidates
            .choose(rng)
            .ok_or_else(|| ProgramError::NoOpcodes(format!("terminals of {types:?}")))?;
        self.create_leaf(rng, opcode, types)
    }

    fn create_leaf(&self, rng: &mut dyn RngCore, opcode: Opcode, types: TypeSet) -> PrgResult<ProgramNode> {
        match opcode {
            Opcode::Var => {
                let vars = self.context.find_variables_by_types(types);
                let index = *vars
                    .choose(rng)
                    .ok_or_else(|| ProgramError::NoOpcodes(format!("variables of {types:?}")))?;
                Ok(ProgramNode::variable(index))
            }
            _ => {
                let choices: Vec<ValueType> = types.iter().collect();
                let value_type = *choices
                    .choose(rng)
                    .ok_or_else(|| ProgramError::NoOpcodes("constants of no type".into()))?;
                Ok(ProgramNode::constant(self.random_constant(rng, value_type)))
            }
        }
    }

    fn random_number(&self, rng: &mut dyn RngCore) -> f64 {
        if self.max_const > self.min_const {
            rng.gen_range(self.min_const..self.max_const)
        } else {
            self.min_const
        }
    }

    // Integer constants truncate the float range
    #[allow(clippy::cast_possible_truncation)]
    fn random_constant(&self, rng: &mut dyn RngCore, value_type: ValueType) -> ExpressionValue {
        match value_type {
            ValueType::Float => ExpressionValue::Float(self.random_number(rng)),
            ValueType::Int => ExpressionValue::Int(self.random_number(rng) as i64),
            ValueType::Bool => ExpressionValue::Bool(rng.gen_bool(0.5)),
            ValueType::Str => {
                let c = char::from(b'a' + rng.gen_range(0..26u8));
                ExpressionValue::Str(c.to_string())
            }
        }
    }

    /// Generate a program that scores finitely and renders differently from
    /// everything in `seen`.
    ///
    /// # Errors
    ///
    /// Returns [`EaError::Generation`] after `max_generation_errors` attempts
    /// and propagates fatal scoring errors.
    pub fn attempt_create_genome(
        &self,
        rng: &mut dyn RngCore,
        score: &dyn CalculateScore<Program>,
        seen: &mut HashSet<String>,
    ) -> EaResult<Program> {
        for _ in 0..self.max_generation_errors {
            let program = self.generate(rng)?;
            let s = score.calculate_score(&program)?;
            if !s.is_finite() {
                continue;
            }
            let key = program.to_string();
            if seen.insert(key) {
                return Ok(program);
            }
        }
        Err(EaError::Generation(format!(
            "could not generate a valid genome after {} tries",
            self.max_generation_errors
        )))
    }

    /// Generate `count` distinct, valid programs.
    ///
    /// # Errors
    ///
    /// See [`ProgramGenerator::attempt_create_genome`].
    pub fn generate_population(
        &self,
        rng: &mut dyn RngCore,
        count: usize,
        score: &dyn CalculateScore<Program>,
    ) -> EaResult<Vec<Program>> {
        let mut seen = HashSet::with_capacity(count);
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.attempt_create_genome(rng, score, &mut seen)?);
        }
        debug!("generated {} programs ({:?}, depth {})", out.len(), self.method, self.max_depth);
        Ok(out)
    }
}

/// Reject constant bounds that `gen_range` cannot sample between.
pub(crate) fn check_const_range(min: f64, max: f64) -> EaResult<()> {
    if !min.is_finite() || !max.is_finite() || !(max - min).is_finite() {
        return Err(EaError::Configuration(format!(
            "constant range [{min}, {max}) must be finite with a finite span"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitness::ZeroEvalScore;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn context() -> Arc<ProgramContext> {
        let mut ctx = ProgramContext::new();
        ctx.enable_numeric_operators(true);
        ctx.enable_trig_functions();
        ctx.define_variable("x").unwrap();
        Arc::new(ctx)
    }

    #[test]
    fn test_generated_programs_evaluate() {
        let generator = ProgramGenerator::new(context(), 4).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..50 {
            let p = generator.generate(&mut rng).unwrap();
            assert!(p.depth().unwrap() <= 5);
            assert_eq!(p.node_len(0).unwrap(), p.len());
            // Protected division and float-only opcodes never raise
            assert!(p.compute(&[0.5]).is_ok(), "{p}");
        }
    }

    #[test]
    fn test_full_method_depth() {
        let generator = ProgramGenerator::new(context(), 3)
            .unwrap()
            .with_method(GenerationMethod::Full);
        let mut rng = SmallRng::seed_from_u64(7);
        let p = generator.generate(&mut rng).unwrap();
        assert_eq!(p.depth().unwrap(), 4);
    }

    #[test]
    fn test_zero_depth_is_terminal() {
        let generator = ProgramGenerator::new(context(), 0).unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        let p = generator.generate(&mut rng).unwrap();
        assert_eq!(p.size(), 1);
    }

    #[test]
    fn test_empty_context_rejected() {
        let err = ProgramGenerator::new(Arc::new(ProgramContext::new()), 3).unwrap_err();
        assert!(matches!(err, ProgramError::NoOpcodes(_)));
    }

    #[test]
    fn test_depth_limit_enforced() {
        let err = ProgramGenerator::new(context(), MAX_TREE_DEPTH).unwrap_err();
        assert!(matches!(err, ProgramError::TooDeep { .. }));
        assert!(ProgramGenerator::new(context(), MAX_TREE_DEPTH - 1).is_ok());
    }

    #[test]
    fn test_missing_result_type() {
        let mut ctx = ProgramContext::new();
        ctx.enable_numeric_operators(false);
        ctx.set_result_type(ValueType::Bool);
        // #const can still produce a boolean
        let generator = ProgramGenerator::new(Arc::new(ctx), 3).unwrap();
        let mut rng = SmallRng::seed_from_u64(3);
        let p = generator.generate(&mut rng).unwrap();
        assert_eq!(p.size(), 1);
    }

    #[test]
    fn test_population_is_distinct() {
        let generator = ProgramGenerator::new(context(), 3).unwrap();
        let mut rng = SmallRng::seed_from_u64(11);
        let programs = generator
            .generate_population(&mut rng, 20, &ZeroEvalScore)
            .unwrap();
        let rendered: HashSet<String> = programs.iter().map(ToString::to_string).collect();
        assert_eq!(rendered.len(), 20);
    }

    #[test]
    fn test_generation_gives_up() {
        let mut ctx = ProgramContext::new();
        ctx.enable(Opcode::Const);
        let generator = ProgramGenerator::new(Arc::new(ctx), 2)
            .unwrap()
            .with_const_range(1.0, 1.0)
            .unwrap()
            .with_max_generation_errors(5);
        let mut rng = SmallRng::seed_from_u64(5);
        let mut seen = HashSet::new();
        let score = ZeroEvalScore;
        generator.attempt_create_genome(&mut rng, &score, &mut seen).unwrap();
        // The only possible program is now taken
        let err = generator
            .attempt_create_genome(&mut rng, &score, &mut seen)
            .unwrap_err();
        assert!(matches!(err, EaError::Generation(_)));
    }

    #[test]
    fn test_const_range_must_have_finite_span() {
        let generator = ProgramGenerator::new(context(), 2).unwrap();
        for (min, max) in [(-1e308, 1e308), (f64::NEG_INFINITY, 0.0), (0.0, f64::NAN)] {
            let err = generator.clone().with_const_range(min, max).unwrap_err();
            assert!(matches!(err, EaError::Configuration(_)), "{min}..{max}");
        }
        // Reversed bounds are swapped, not rejected
        let generator = generator.with_const_range(5.0, -5.0).unwrap();
        let mut rng = SmallRng::seed_from_u64(9);
        for _ in 0..20 {
            let v = generator.random_number(&mut rng);
            assert!((-5.0..5.0).contains(&v));
        }
    }
}
