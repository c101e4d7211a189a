//! Property-based tests for program buffers and the genetic operators.
//!
//! Run with: cargo test --release prop_program

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use stackgp::prg::{Program, ProgramContext, ProgramGenerator, SubtreeCrossover, SubtreeMutation};

fn context() -> Arc<ProgramContext> {
    let mut ctx = ProgramContext::new();
    ctx.enable_numeric_operators(true);
    ctx.enable_trig_functions();
    ctx.define_variable("x").unwrap();
    ctx.define_variable("y").unwrap();
    Arc::new(ctx)
}

fn random_program(seed: u64, depth: usize) -> Program {
    let generator = ProgramGenerator::new(context(), depth).unwrap();
    let mut rng = SmallRng::seed_from_u64(seed);
    generator.generate(&mut rng).unwrap()
}

/// True when two evaluation outcomes agree, counting NaN as equal to NaN.
fn same_outcome(a: &Result<f64, stackgp::ProgramError>, b: &Result<f64, stackgp::ProgramError>) -> bool {
    match (a, b) {
        (Ok(x), Ok(y)) => x.to_bits() == y.to_bits() || (x.is_nan() && y.is_nan()),
        (Err(_), Err(_)) => true,
        _ => false,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Every generated buffer is one complete prefix-ordered tree.
    #[test]
    fn prop_generated_buffer_is_complete(seed in any::<u64>(), depth in 0usize..6) {
        let p = random_program(seed, depth);
        prop_assert_eq!(p.node_len(0).unwrap(), p.len());
        prop_assert_eq!(p.traverse().unwrap().len(), p.size());
        prop_assert!(p.depth().unwrap() <= depth + 1);
    }

    /// Each node spans its own header plus the spans of its children.
    #[test]
    fn prop_node_len_sums_children(seed in any::<u64>(), depth in 0usize..6) {
        let p = random_program(seed, depth);
        for index in p.traverse().unwrap() {
            let children: usize = p
                .children(index)
                .unwrap()
                .iter()
                .map(|&child| p.node_len(child).unwrap())
                .sum();
            prop_assert_eq!(p.node_len(index).unwrap(), p.header_width(index).unwrap() + children);
        }
    }

    /// Decoding to a tree and encoding again gives the same words.
    #[test]
    fn prop_tree_round_trip(seed in any::<u64>()) {
        let p = random_program(seed, 4);
        let rebuilt = Program::from_node(Arc::clone(p.context()), &p.map_program().unwrap());
        prop_assert_eq!(rebuilt.buffer(), p.buffer());
    }

    /// Rendered infix parses back to a program that computes the same value.
    #[test]
    fn prop_infix_round_trip(seed in any::<u64>(), x in -10.0f64..10.0, y in -10.0f64..10.0) {
        let p = random_program(seed, 4);
        let text = p.render_infix().unwrap();
        let parsed = Program::from_expression(Arc::clone(p.context()), &text).unwrap();
        let a = p.compute(&[x, y]);
        let b = parsed.compute(&[x, y]);
        prop_assert!(same_outcome(&a, &b), "{} gave {:?} vs {:?}", text, a, b);
    }

    /// Crossover leaves both parents untouched and yields a complete buffer.
    #[test]
    fn prop_crossover_offspring_valid(a in any::<u64>(), b in any::<u64>(), seed in any::<u64>()) {
        let father = random_program(a, 4);
        let mother = random_program(b, 4);
        let (father_words, mother_words) = (father.buffer().to_vec(), mother.buffer().to_vec());
        let mut rng = SmallRng::seed_from_u64(seed);
        let child = SubtreeCrossover.cross(&mut rng, &father, &mother).unwrap();
        prop_assert_eq!(child.node_len(0).unwrap(), child.len());
        prop_assert_eq!(father.buffer(), &father_words[..]);
        prop_assert_eq!(mother.buffer(), &mother_words[..]);
    }

    /// Subtree mutation keeps the buffer complete and evaluable.
    #[test]
    fn prop_mutation_offspring_valid(a in any::<u64>(), seed in any::<u64>()) {
        let mut p = random_program(a, 4);
        let mutation = SubtreeMutation::new(context(), 3).unwrap();
        let mut rng = SmallRng::seed_from_u64(seed);
        mutation.mutate(&mut rng, &mut p).unwrap();
        prop_assert_eq!(p.node_len(0).unwrap(), p.len());
        prop_assert!(p.compute(&[0.5, -0.5]).is_ok());
    }
}
