#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use stackgp::prg::{
    ConstMutation, Program, ProgramContext, ProgramGenerator, SubtreeCrossover, SubtreeMutation,
};
use std::sync::Arc;

/// Structured input for operator fuzzing.
#[derive(Arbitrary, Debug)]
struct OperatorInput {
    /// Seed for the first parent.
    father_seed: u64,
    /// Seed for the second parent.
    mother_seed: u64,
    /// Seed for the operators.
    op_seed: u64,
    /// Generator depth.
    depth: u8,
    /// Constant mutation frequency, scaled to [0, 1].
    frequency: u8,
}

fuzz_target!(|input: OperatorInput| {
    let mut ctx = ProgramContext::with_all_functions();
    ctx.define_variable("x").unwrap();
    let ctx = Arc::new(ctx);
    let depth = usize::from(input.depth % 6);

    let generator = ProgramGenerator::new(Arc::clone(&ctx), depth).unwrap();
    let generate = |seed| {
        let mut rng = SmallRng::seed_from_u64(seed);
        generator.generate(&mut rng).unwrap()
    };
    let father: Program = generate(input.father_seed);
    let mother: Program = generate(input.mother_seed);
    let father_words = father.buffer().to_vec();

    let mut rng = SmallRng::seed_from_u64(input.op_seed);
    let child = SubtreeCrossover.cross(&mut rng, &father, &mother).unwrap();
    assert_eq!(child.node_len(0).unwrap(), child.len());
    assert_eq!(father.buffer(), &father_words[..]);

    let mut mutant = father.clone();
    SubtreeMutation::new(Arc::clone(&ctx), 3)
        .unwrap()
        .mutate(&mut rng, &mut mutant)
        .unwrap();
    assert_eq!(mutant.node_len(0).unwrap(), mutant.len());

    let frequency = f64::from(input.frequency) / 255.0;
    let mut tweaked = father.clone();
    ConstMutation::new(frequency, 1.0)
        .unwrap()
        .mutate(&mut rng, &mut tweaked)
        .unwrap();
    assert_eq!(tweaked.size(), father.size());
    assert_eq!(father.buffer(), &father_words[..]);
});
