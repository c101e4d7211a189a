//! CLI command for evolving programs against a data set.

#![allow(clippy::needless_pass_by_value)]

use crate::cli::output::{JsonEvolveResult, format_generation, format_result};
use crate::cli::{CliError, OutputFormat, load_data};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use stackgp::ea::{EvolutionConfig, GenerationStats, TrainEa};
use stackgp::fitness::{TrainingData, TrainingSetScore};
use stackgp::persistence::{load_population, save_population, save_program};
use stackgp::{Program, ProgramContext};
use std::fs;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// Arguments of the evolve command.
#[derive(Debug)]
pub(crate) struct EvolveArgs {
    pub(crate) data: PathBuf,
    pub(crate) config: Option<PathBuf>,
    pub(crate) variables: Vec<String>,
    pub(crate) population: Option<usize>,
    pub(crate) generations: u64,
    pub(crate) target: Option<f64>,
    pub(crate) seed: Option<u64>,
    pub(crate) threads: Option<usize>,
    pub(crate) resume: Option<PathBuf>,
    pub(crate) save_population: Option<PathBuf>,
    pub(crate) save_best: Option<PathBuf>,
    pub(crate) format: OutputFormat,
    pub(crate) progress: bool,
}

/// Execute the evolve command.
pub(crate) fn execute(args: EvolveArgs) -> Result<(), CliError> {
    let data = load_data(&args.data)?;
    let mut config = match &args.config {
        Some(path) => {
            let reader = BufReader::new(fs::File::open(path)?);
            serde_json::from_reader::<_, EvolutionConfig>(reader)
                .map_err(|e| CliError::new(format!("{}: {e}", path.display())))?
        }
        None => EvolutionConfig::default(),
    };
    if let Some(size) = args.population {
        config.population_size = size;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.threads.is_some() {
        config.threads = args.threads;
    }
    config.validate()?;

    if let Some(threads) = config.threads {
        rayon::ThreadPoolBuilder::new().num_threads(threads).build_global().ok();
    }

    let score = Box::new(TrainingSetScore::new(Arc::new(data.clone())));
    let mut rng = SmallRng::seed_from_u64(config.seed);

    let mut train = if let Some(path) = &args.resume {
        let population = load_population(path)?;
        let context = population
            .genomes()
            .next()
            .map(|p| Arc::clone(p.context()))
            .ok_or_else(|| CliError::new(format!("{}: population is empty", path.display())))?;
        check_width(&context, data.input_size())?;
        info!("resuming {} programs from {}", population.len(), path.display());
        TrainEa::from_population(&config, context, population, score)?
    } else {
        let context = Arc::new(build_context(&args.variables, data.input_size())?);
        TrainEa::for_programs(&config, context, score, &mut rng)?
    };

    let pb = if args.progress {
        let pb = ProgressBar::new(args.generations);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} gens {msg}")
            .map_err(|e| CliError::new(e.to_string()))?
            .progress_chars("=>-");
        pb.set_style(style);
        Some(pb)
    } else {
        None
    };

    let start = Instant::now();
    let mut last: Option<GenerationStats> = None;
    for _ in 0..args.generations {
        let stats = train.iteration(&mut rng)?;
        if let Some(pb) = &pb {
            pb.inc(1);
            pb.set_message(format!("best {:.6}", stats.best_score));
        } else if args.format == OutputFormat::Text {
            println!("{}", format_generation(&stats));
        }
        last = Some(stats);
        if reached(args.target, &train, stats.best_score) {
            info!("target reached in generation {}", stats.iteration);
            break;
        }
    }
    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }
    let elapsed = start.elapsed().as_secs_f64();

    let result = JsonEvolveResult::new(train.iteration_number(), train.best_genome(), last, elapsed);
    match args.format {
        OutputFormat::Text => {
            println!();
            print!("{}", format_result(&result));
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result)
                .map_err(|e| CliError::new(format!("JSON serialization failed: {e}")))?;
            println!("{json}");
        }
    }

    if let Some(path) = &args.save_best {
        let best = train
            .best_genome()
            .ok_or_else(|| CliError::new("no best program to save"))?;
        save_program(best, path)?;
        info!("saved best program to {}", path.display());
    }
    if let Some(path) = &args.save_population {
        save_population(train.population(), path)?;
        info!("saved population to {}", path.display());
    }
    Ok(())
}

/// Arithmetic, basic and trigonometric functions over one float variable
/// per input column.
fn build_context(names: &[String], width: usize) -> Result<ProgramContext, CliError> {
    let mut context = ProgramContext::new();
    context.enable_numeric_operators(true);
    context.enable_basic_functions();
    context.enable_trig_functions();
    if names.is_empty() {
        for i in 0..width {
            context.define_variable(&format!("x{i}"))?;
        }
    } else {
        for name in names {
            context.define_variable(name)?;
        }
    }
    check_width(&context, width)?;
    Ok(context)
}

fn check_width(context: &ProgramContext, width: usize) -> Result<(), CliError> {
    let defined = context.variables().len();
    if defined == width {
        Ok(())
    } else {
        Err(CliError::new(format!(
            "{defined} variables defined but the data has {width} inputs"
        )))
    }
}

fn reached(target: Option<f64>, train: &TrainEa<Program>, best: f64) -> bool {
    let Some(target) = target else {
        return false;
    };
    if !best.is_finite() {
        return false;
    }
    if train.best_comparator().should_minimize() {
        best <= target
    } else {
        best >= target
    }
}
