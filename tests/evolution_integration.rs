//! Multi-generation integration tests for the evolutionary driver.
//!
//! Run with: cargo test --release evolution_integration

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::float_cmp)]

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::SmallRng;

use stackgp::ea::{
    EvolutionConfig, Genome, Population, SelectionMethod, TournamentSelection, TrainEa,
};
use stackgp::fitness::{BasicDataSet, TrainingSetScore, ZeroEvalScore};
use stackgp::prg::{Program, ProgramContext, ProgramGenerator, SubtreeCrossover, SubtreeMutation};

fn context() -> Arc<ProgramContext> {
    let mut ctx = ProgramContext::new();
    ctx.enable_numeric_operators(true);
    ctx.define_variable("x").unwrap();
    Arc::new(ctx)
}

/// y = x^2 + x + 1 sampled on [-2, 2].
fn quadratic() -> BasicDataSet {
    let mut data = BasicDataSet::new();
    for i in -8..=8 {
        let x = f64::from(i) / 4.0;
        data.add(vec![x], vec![x * x + x + 1.0]);
    }
    data
}

fn manual_trainer(seed: u64) -> (TrainEa<Program>, SmallRng) {
    let ctx = context();
    let mut rng = SmallRng::seed_from_u64(seed);
    let generator = ProgramGenerator::new(Arc::clone(&ctx), 4).unwrap();
    let genomes = generator
        .generate_population(&mut rng, 20, &ZeroEvalScore)
        .unwrap();
    let population = Population::from_genomes(genomes, 60);
    let score = Box::new(TrainingSetScore::new(Arc::new(quadratic())));
    let mut train = TrainEa::new(population, score);
    train.set_selection(Box::new(TournamentSelection::new(3)));
    train
        .add_operation(0.3, Box::new(SubtreeMutation::new(ctx, 3).unwrap()))
        .unwrap();
    train.add_operation(0.5, Box::new(SubtreeCrossover)).unwrap();
    (train, rng)
}

#[test]
fn test_ten_generations_never_worsen() {
    let (mut train, mut rng) = manual_trainer(42);
    let mut last = f64::INFINITY;
    for generation in 1..=10 {
        let stats = train.iteration(&mut rng).unwrap();
        assert_eq!(stats.iteration, generation);
        assert_eq!(stats.population, 20);
        assert!(stats.best_score <= last, "generation {generation} worsened");
        last = stats.best_score;
    }
    let best = train.best_genome().unwrap();
    assert_eq!(best.score(), last);
    assert!(best.size() <= 60);
}

#[test]
fn test_same_seed_same_result() {
    let run = |seed| {
        let (mut train, mut rng) = manual_trainer(seed);
        for _ in 0..5 {
            train.iteration(&mut rng).unwrap();
        }
        train.best_genome().unwrap().buffer().to_vec()
    };
    assert_eq!(run(7), run(7));
}

#[test]
fn test_configured_trainer_with_truncation_and_penalty() {
    let config = EvolutionConfig {
        population_size: 40,
        max_depth: 3,
        selection: SelectionMethod::Truncation { percent: 0.3 },
        complexity_penalty: true,
        rewrite_constants: true,
        ..EvolutionConfig::default()
    };
    let mut rng = SmallRng::seed_from_u64(config.seed);
    let score = Box::new(TrainingSetScore::new(Arc::new(quadratic())));
    let mut train = TrainEa::for_programs(&config, context(), score, &mut rng).unwrap();
    for _ in 0..10 {
        let stats = train.iteration(&mut rng).unwrap();
        assert_eq!(stats.population, 40);
    }
    // Adjusted scores carry the size penalty on top of the raw error
    for genome in train.population().genomes() {
        if genome.score().is_finite() {
            assert!(genome.adjusted_score() >= genome.score());
        }
    }
}

#[test]
fn test_resumed_population_keeps_best() {
    let (mut train, mut rng) = manual_trainer(11);
    for _ in 0..3 {
        train.iteration(&mut rng).unwrap();
    }
    let best = train.best_genome().unwrap().score();
    let population = train.into_population();

    let config = EvolutionConfig {
        population_size: 20,
        ..EvolutionConfig::default()
    };
    let score = Box::new(TrainingSetScore::new(Arc::new(quadratic())));
    let mut resumed = TrainEa::from_population(&config, context(), population, score).unwrap();
    let stats = resumed.iteration(&mut rng).unwrap();
    assert!(stats.best_score <= best);
}
