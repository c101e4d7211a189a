//! CLI command implementations for Stackgp.

pub(crate) mod bayes;
pub(crate) mod eval;
pub(crate) mod evolve;

mod output;

use clap::ValueEnum;
use stackgp::bayes::BayesianInit;
use stackgp::fitness::BasicDataSet;
use stackgp::{BayesError, EaError, PersistError, ProgramError};
use std::error::Error;
use std::fmt;
use std::fs;
use std::io::BufReader;
use std::path::Path;

/// Output format for the `evolve` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Starting structure for the `bayes` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum InitStructure {
    /// No dependencies.
    Empty,
    /// Keep the structure as built from the labels.
    NoChange,
    /// Target is a parent of every other event.
    NaiveBayes,
}

impl From<InitStructure> for BayesianInit {
    fn from(init: InitStructure) -> Self {
        match init {
            InitStructure::Empty => Self::Empty,
            InitStructure::NoChange => Self::NoChange,
            InitStructure::NaiveBayes => Self::NaiveBayes,
        }
    }
}

/// Configure `env_logger` from the `-v` count. `RUST_LOG` still wins.
pub(crate) fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Read a data set file and check every pair has the same widths.
pub(crate) fn load_data(path: &Path) -> Result<BasicDataSet, CliError> {
    let reader = BufReader::new(fs::File::open(path)?);
    let data: BasicDataSet = serde_json::from_reader(reader)
        .map_err(|e| CliError::new(format!("{}: {e}", path.display())))?;
    data.validate()?;
    if data.is_empty() {
        return Err(CliError::new(format!("{}: data set is empty", path.display())));
    }
    Ok(data)
}

/// CLI error type.
#[derive(Debug)]
pub(crate) struct CliError {
    message: String,
}

impl CliError {
    /// Create a new CLI error.
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<ProgramError> for CliError {
    fn from(e: ProgramError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<EaError> for CliError {
    fn from(e: EaError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<BayesError> for CliError {
    fn from(e: BayesError) -> Self {
        Self::new(e.to_string())
    }
}

impl From<PersistError> for CliError {
    fn from(e: PersistError) -> Self {
        Self::new(e.to_string())
    }
}
