//! Save/load tests against real files.
//!
//! Run with: cargo test --release persistence

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::float_cmp)]

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tempfile::TempDir;

use stackgp::bayes::{BayesianNetwork, TrainBayesian};
use stackgp::ea::{EvolutionConfig, Genome, TrainEa};
use stackgp::fitness::{BasicDataSet, TrainingSetScore};
use stackgp::persistence::{
    ProgramFile, load_network, load_population, load_program, save_network, save_population,
    save_program,
};
use stackgp::prg::{Program, ProgramContext};

fn context() -> Arc<ProgramContext> {
    let mut ctx = ProgramContext::new();
    ctx.enable_numeric_operators(true);
    ctx.enable_trig_functions();
    ctx.define_variable("x").unwrap();
    Arc::new(ctx)
}

fn line_data() -> BasicDataSet {
    let mut data = BasicDataSet::new();
    for i in 0..10 {
        let x = f64::from(i);
        data.add(vec![x], vec![3.0 * x - 1.0]);
    }
    data
}

#[test]
fn test_program_file_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("best.json");
    let mut program = Program::from_expression(context(), "sin(x) * 2.5 - x % 3").unwrap();
    program.set_score(0.125);

    save_program(&program, &path).unwrap();
    let loaded = load_program(&path).unwrap();
    assert_eq!(loaded.buffer(), program.buffer());
    assert_eq!(loaded.score(), 0.125);
    assert_eq!(loaded.context().as_ref(), program.context().as_ref());
    assert_eq!(loaded.compute(&[1.5]).unwrap(), program.compute(&[1.5]).unwrap());
}

#[test]
fn test_population_resume() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("population.json");
    let config = EvolutionConfig {
        population_size: 25,
        max_depth: 3,
        ..EvolutionConfig::default()
    };
    let mut rng = SmallRng::seed_from_u64(5);
    let score = Box::new(TrainingSetScore::new(Arc::new(line_data())));
    let mut train = TrainEa::for_programs(&config, context(), score, &mut rng).unwrap();
    for _ in 0..3 {
        train.iteration(&mut rng).unwrap();
    }
    let best = train.best_genome().unwrap().clone();
    save_population(train.population(), &path).unwrap();

    let population = load_population(&path).unwrap();
    assert_eq!(population.len(), train.population().len());
    assert_eq!(population.species().len(), train.population().species().len());
    let restored_best = population.best_genome().unwrap();
    assert_eq!(restored_best.buffer(), best.buffer());
    assert_eq!(restored_best.score(), best.score());

    let score = Box::new(TrainingSetScore::new(Arc::new(line_data())));
    let mut resumed = TrainEa::from_population(&config, context(), population, score).unwrap();
    let stats = resumed.iteration(&mut rng).unwrap();
    assert!(stats.best_score <= best.score());
}

#[test]
fn test_network_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("network.json");
    let mut net = BayesianNetwork::new();
    net.create_boolean_event("a").unwrap();
    let class = net.create_boolean_event("class").unwrap();
    net.set_classification_target(class).unwrap();
    let mut data = BasicDataSet::new();
    for i in 0..12 {
        let v = f64::from(i % 2);
        data.add(vec![v, v], vec![]);
    }
    let mut train = TrainBayesian::new(net, &data, 1).unwrap();
    train.train().unwrap();
    let net = train.into_network();

    save_network(&net, &path).unwrap();
    let loaded = load_network(&path).unwrap();
    assert_eq!(loaded, net);
    assert_eq!(loaded.classify(&[1.0, 0.0]).unwrap(), net.classify(&[1.0, 0.0]).unwrap());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = load_program(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, stackgp::PersistError::Io(_)));
}

#[test]
fn test_deeply_nested_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("deep.json");
    save_program(&Program::from_expression(context(), "-x").unwrap(), &path).unwrap();

    let mut file: ProgramFile =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let (neg, var) = (file.program.buffer[0], file.program.buffer[1]);
    let mut buffer = vec![neg; 100_000];
    buffer.push(var);
    file.program.buffer = buffer;
    std::fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

    let err = load_program(&path).unwrap_err();
    assert!(matches!(
        err,
        stackgp::PersistError::Program(stackgp::ProgramError::TooDeep { .. })
    ));
}
