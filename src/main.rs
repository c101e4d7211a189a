//! Stackgp CLI - evolve expression programs, evaluate them, and learn
//! Bayesian network structure.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::float_cmp))]

mod cli;

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// Stackgp - genetic programming over flat program buffers
#[derive(Parser, Debug)]
#[command(name = "stackgp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Evolve a program that fits a data set
    Evolve {
        /// Data set JSON file (list of input/ideal pairs)
        #[arg(required = true)]
        data: PathBuf,

        /// Evolution configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Variable names, one per input column (default: x0, x1, ...)
        #[arg(long, value_delimiter = ',')]
        variables: Vec<String>,

        /// Population size (overrides the configuration)
        #[arg(short, long)]
        population: Option<usize>,

        /// Generations to run (default: 100)
        #[arg(short, long, default_value = "100")]
        generations: u64,

        /// Stop once the best score reaches this error
        #[arg(long)]
        target: Option<f64>,

        /// Random seed (overrides the configuration)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Parallel threads (default: CPU count)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Resume from a saved population
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Save the final population to this file
        #[arg(long)]
        save_population: Option<PathBuf>,

        /// Save the best program to this file
        #[arg(long)]
        save_best: Option<PathBuf>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,

        /// Show progress bar
        #[arg(long)]
        progress: bool,
    },

    /// Evaluate an expression or a saved program
    Eval {
        /// Infix expression (ignored when --program is given)
        expression: Option<String>,

        /// Saved program file
        #[arg(long)]
        program: Option<PathBuf>,

        /// Variable bindings as name=value
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,

        /// Also print the program in prefix notation
        #[arg(long)]
        rpn: bool,
    },

    /// Learn a Bayesian network's structure with K2 and fit its tables
    Bayes {
        /// Data set JSON file; every input column is one event
        #[arg(required = true)]
        data: PathBuf,

        /// Event labels, one per input column (default: e0, e1, ...)
        #[arg(long, value_delimiter = ',')]
        labels: Vec<String>,

        /// Label of the classification target
        #[arg(short, long)]
        target: Option<String>,

        /// Maximum parents per event
        #[arg(short, long, default_value = "2")]
        max_parents: usize,

        /// Starting structure: empty, no-change, or naive-bayes
        #[arg(short, long, default_value = "naive-bayes")]
        init: cli::InitStructure,

        /// Laplace smoothing pseudo-count for table fitting
        #[arg(long, default_value = "0")]
        alpha: f64,

        /// Save the trained network to this file
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();
    cli::init_logging(args.verbose);

    let result = match args.command {
        Commands::Evolve {
            data,
            config,
            variables,
            population,
            generations,
            target,
            seed,
            threads,
            resume,
            save_population,
            save_best,
            format,
            progress,
        } => cli::evolve::execute(cli::evolve::EvolveArgs {
            data,
            config,
            variables,
            population,
            generations,
            target,
            seed,
            threads,
            resume,
            save_population,
            save_best,
            format,
            progress,
        }),

        Commands::Eval {
            expression,
            program,
            vars,
            rpn,
        } => cli::eval::execute(expression, program, vars, rpn),

        Commands::Bayes {
            data,
            labels,
            target,
            max_parents,
            init,
            alpha,
            save,
        } => cli::bayes::execute(data, labels, target, max_parents, init, alpha, save),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
