//! JSON snapshots of programs, populations and Bayesian networks.
//!
//! A program is stored as its raw instruction buffer together with the
//! context it was encoded against, so the buffer contract (header word plus
//! payload words, prefix order) is the file format. Scores that are not
//! finite are stored as `null`.

use crate::bayes::BayesianNetwork;
use crate::ea::{Genome, Population, Species, is_valid_score};
use crate::error::PersistError;
use crate::prg::{Program, ProgramContext};
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One program without its context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramSnapshot {
    /// Encoded instruction buffer.
    pub buffer: Vec<u64>,
    /// Raw score, if valid.
    pub score: Option<f64>,
    /// Adjusted score, if valid.
    pub adjusted_score: Option<f64>,
    /// Generation the program was created in.
    pub birth_generation: u64,
    /// Infix rendering, for readers of the file. Ignored on load.
    #[serde(default)]
    pub expression: String,
}

impl ProgramSnapshot {
    /// Capture a program.
    #[must_use]
    pub fn capture(program: &Program) -> Self {
        Self {
            buffer: program.buffer().to_vec(),
            score: valid(program.score()),
            adjusted_score: valid(program.adjusted_score()),
            birth_generation: program.birth_generation(),
            expression: program.render_infix().unwrap_or_default(),
        }
    }

    /// Decode against `context`.
    ///
    /// # Errors
    ///
    /// Returns [`PersistError::Program`] if the buffer does not decode.
    pub fn restore(&self, context: Arc<ProgramContext>) -> Result<Program, PersistError> {
        let mut program = Program::from_buffer(context, self.buffer.clone())?;
        program.set_score(self.score.unwrap_or(f64::NAN));
        program.set_adjusted_score(self.adjusted_score.unwrap_or(f64::NAN));
        program.set_birth_generation(self.birth_generation);
        Ok(program)
    }
}

/// A program file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramFile {
    /// Snapshot format version.
    pub version: u32,
    /// Opcode set, variables and result type.
    pub context: ProgramContext,
    /// The program.
    pub program: ProgramSnapshot,
}

/// One species.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesSnapshot {
    /// Generations the species has existed.
    pub age: u32,
    /// Best adjusted score, if valid.
    pub best_score: Option<f64>,
    /// Generations since the best score improved.
    pub gens_no_improvement: u32,
    /// Members, leader first.
    pub members: Vec<ProgramSnapshot>,
}

/// A population file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationSnapshot {
    /// Snapshot format version.
    pub version: u32,
    /// Context shared by every program.
    pub context: ProgramContext,
    /// Target population size.
    pub population_size: usize,
    /// Largest program size kept.
    pub max_individual_size: usize,
    /// Every species.
    pub species: Vec<SpeciesSnapshot>,
    /// Best program found so far.
    pub best: Option<ProgramSnapshot>,
}

fn valid(score: f64) -> Option<f64> {
    is_valid_score(score).then_some(score)
}

fn check_version(version: u32) -> Result<(), PersistError> {
    if version == SNAPSHOT_VERSION {
        Ok(())
    } else {
        Err(PersistError::Invalid(format!("unsupported snapshot version {version}")))
    }
}

fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<(), PersistError> {
    let mut writer = BufWriter::new(fs::File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    debug!("wrote {}", path.display());
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistError> {
    let reader = BufReader::new(fs::File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Save a program and its context.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_program(program: &Program, path: &Path) -> Result<(), PersistError> {
    let file = ProgramFile {
        version: SNAPSHOT_VERSION,
        context: program.context().as_ref().clone(),
        program: ProgramSnapshot::capture(program),
    };
    write_json(&file, path)
}

/// Load a program saved by [`save_program`].
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not a program snapshot of
/// this version, or the buffer does not decode.
pub fn load_program(path: &Path) -> Result<Program, PersistError> {
    let file: ProgramFile = read_json(path)?;
    check_version(file.version)?;
    file.program.restore(Arc::new(file.context))
}

/// Capture a population. Rewrite rules are not saved.
///
/// # Errors
///
/// Returns [`PersistError::Invalid`] for an empty population, which has no
/// context to record.
pub fn capture_population(population: &Population<Program>) -> Result<PopulationSnapshot, PersistError> {
    let context = population
        .genomes()
        .next()
        .or(population.best_genome())
        .map(|p| p.context().as_ref().clone())
        .ok_or_else(|| PersistError::Invalid("cannot save an empty population".into()))?;
    let species = population
        .species()
        .iter()
        .map(|s| SpeciesSnapshot {
            age: s.age(),
            best_score: valid(s.best_score()),
            gens_no_improvement: s.gens_no_improvement(),
            members: s.members().iter().map(ProgramSnapshot::capture).collect(),
        })
        .collect();
    Ok(PopulationSnapshot {
        version: SNAPSHOT_VERSION,
        context,
        population_size: population.population_size(),
        max_individual_size: population.max_individual_size(),
        species,
        best: population.best_genome().map(ProgramSnapshot::capture),
    })
}

/// Rebuild a population. Every program shares one context.
///
/// # Errors
///
/// Returns an error for a version mismatch or an undecodable buffer.
pub fn restore_population(snapshot: PopulationSnapshot) -> Result<Population<Program>, PersistError> {
    check_version(snapshot.version)?;
    let context = Arc::new(snapshot.context);
    let mut population = Population::new(snapshot.population_size, snapshot.max_individual_size);
    for s in snapshot.species {
        let members = s
            .members
            .iter()
            .map(|m| m.restore(Arc::clone(&context)))
            .collect::<Result<Vec<_>, _>>()?;
        if members.is_empty() {
            continue;
        }
        population.add_species(Species::from_parts(
            members,
            s.age,
            s.best_score.unwrap_or(f64::NAN),
            s.gens_no_improvement,
        ));
    }
    if let Some(best) = snapshot.best {
        population.set_best_genome(best.restore(context)?);
    }
    Ok(population)
}

/// Save a population with its species bookkeeping and best program.
///
/// # Errors
///
/// Returns an error for an empty population or if the file cannot be written.
pub fn save_population(population: &Population<Program>, path: &Path) -> Result<(), PersistError> {
    write_json(&capture_population(population)?, path)
}

/// Load a population saved by [`save_population`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not decode.
pub fn load_population(path: &Path) -> Result<Population<Program>, PersistError> {
    restore_population(read_json(path)?)
}

/// Save a Bayesian network with its structure and tables.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_network(network: &BayesianNetwork, path: &Path) -> Result<(), PersistError> {
    write_json(network, path)
}

/// Load a network saved by [`save_network`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not decode.
pub fn load_network(path: &Path) -> Result<BayesianNetwork, PersistError> {
    read_json(path)
}
