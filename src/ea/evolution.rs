//! The evolutionary algorithm driver.
//!
//! One call to [`TrainEa::iteration`] runs one generation:
//!
//! ```text
//! quotas ──▶ breed (select, operate, rewrite) ──▶ score offspring
//!    ▲                                                  │
//!    └── bookkeeping ◀── merge + cull to quota ◀────────┘
//! ```
//!
//! Species leaders are never culled and the best genome is only replaced by
//! a better one, so the best score never worsens.

// Quotas are fractions of the population size
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use super::genome::{Genome, is_valid_score};
use super::operators::{EvolutionaryOperator, OperationList};
use super::population::Population;
use super::score::{AdjustScore, CalculateScore, score_genomes};
use super::selection::{SelectionOperator, TournamentSelection, TruncationSelection};
use super::sort::ScoreComparator;
use crate::error::{EaError, EaResult, ProgramError};
use crate::fitness::{ComplexityAdjustedScore, ZeroEvalScore};
use crate::prg::{
    ConstMutation, GenerationMethod, Program, ProgramContext, ProgramGenerator, RewriteAlgebraic,
    MAX_TREE_DEPTH, RewriteConstants, SubtreeCrossover, SubtreeMutation, check_const_range,
};
use log::{debug, info, warn};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How parents are picked and members culled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMethod {
    /// Best of `rounds + 1` random draws.
    Tournament {
        /// Rounds per tournament.
        rounds: usize,
    },
    /// Uniform draw from the best fraction.
    Truncation {
        /// Fraction in `(0, 1]`.
        percent: f64,
    },
}

impl Default for SelectionMethod {
    fn default() -> Self {
        Self::Tournament { rounds: 4 }
    }
}

impl SelectionMethod {
    /// Build the operator.
    ///
    /// # Errors
    ///
    /// Returns [`EaError::Configuration`] for an invalid truncation percent.
    pub fn build<G: Genome>(self) -> EaResult<Box<dyn SelectionOperator<G>>> {
        let selection: Box<dyn SelectionOperator<G>> = match self {
            Self::Tournament { rounds } => Box::new(TournamentSelection::new(rounds)),
            Self::Truncation { percent } => Box::new(TruncationSelection::new(percent)?),
        };
        Ok(selection)
    }
}

/// Configuration for evolving programs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Population size.
    pub population_size: usize,
    /// Offspring with more nodes than this are discarded.
    pub max_individual_size: usize,
    /// Depth of initial random programs.
    pub max_depth: usize,
    /// Shape of initial random programs.
    pub generation_method: GenerationMethod,
    /// Lower bound of random constants.
    pub min_const: f64,
    /// Upper bound of random constants.
    pub max_const: f64,
    /// Weight of subtree crossover.
    pub crossover_probability: f64,
    /// Weight of subtree mutation.
    pub subtree_mutation_probability: f64,
    /// Weight of constant mutation.
    pub const_mutation_probability: f64,
    /// Probability of perturbing each float constant.
    pub const_mutation_frequency: f64,
    /// Standard deviation of constant perturbation.
    pub const_mutation_sigma: f64,
    /// Depth of subtrees grown by subtree mutation.
    pub mutation_depth: usize,
    /// Parent selection and culling.
    pub selection: SelectionMethod,
    /// Penalize programs by size.
    pub complexity_penalty: bool,
    /// Simplify offspring algebraically.
    pub rewrite_algebraic: bool,
    /// Fold variable-free subtrees of offspring.
    pub rewrite_constants: bool,
    /// Species other than the best die after this many stale generations.
    pub max_gens_no_improvement: u32,
    /// Worker threads for scoring (`None` = rayon default).
    pub threads: Option<usize>,
    /// Fail a generation if the population's best score worsens.
    pub validation_mode: bool,
    /// Failed operations tolerated per species per generation.
    pub max_operation_errors: usize,
    /// RNG seed for reproducibility.
    pub seed: u64,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            max_individual_size: 100,
            max_depth: 5,
            generation_method: GenerationMethod::RampedHalfAndHalf,
            min_const: -10.0,
            max_const: 10.0,
            crossover_probability: 0.5,
            subtree_mutation_probability: 0.25,
            const_mutation_probability: 0.25,
            const_mutation_frequency: 0.5,
            const_mutation_sigma: 1.0,
            mutation_depth: 4,
            selection: SelectionMethod::default(),
            complexity_penalty: false,
            rewrite_algebraic: true,
            rewrite_constants: false,
            max_gens_no_improvement: 15,
            threads: None,
            validation_mode: false,
            max_operation_errors: 500,
            seed: 42,
        }
    }
}

impl EvolutionConfig {
    /// Check values the driver cannot recover from.
    ///
    /// # Errors
    ///
    /// Returns [`EaError::Configuration`] describing the first bad value.
    pub fn validate(&self) -> EaResult<()> {
        if self.population_size == 0 {
            return Err(EaError::Configuration("population size must be positive".into()));
        }
        if self.max_individual_size == 0 {
            return Err(EaError::Configuration("max individual size must be positive".into()));
        }
        let weights = [
            self.crossover_probability,
            self.subtree_mutation_probability,
            self.const_mutation_probability,
        ];
        if weights.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(EaError::Configuration("operator probabilities must be non-negative".into()));
        }
        if weights.iter().all(|p| *p == 0.0) {
            return Err(EaError::Configuration("every operator probability is zero".into()));
        }
        if self.max_operation_errors == 0 {
            return Err(EaError::Configuration("max operation errors must be positive".into()));
        }
        if self.max_depth.max(self.mutation_depth) >= MAX_TREE_DEPTH {
            return Err(EaError::Configuration(format!(
                "tree depths must stay below {MAX_TREE_DEPTH}"
            )));
        }
        check_const_range(self.min_const, self.max_const)
    }
}

/// Statistics for one generation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GenerationStats {
    /// Generations completed.
    pub iteration: u64,
    /// Best raw score found so far.
    pub best_score: f64,
    /// Mean raw score of valid genomes in the population.
    pub mean_score: f64,
    /// Genomes with a valid score.
    pub valid_genomes: usize,
    /// Genomes in the population.
    pub population: usize,
    /// Live species.
    pub species: usize,
    /// Offspring dropped for exceeding the size limit.
    pub discarded: usize,
}

/// Offspring waiting to be merged, with the species each belongs to.
struct Brood<G> {
    children: Vec<G>,
    species: Vec<usize>,
    discarded: usize,
}

/// Evolutionary trainer owning its population.
pub struct TrainEa<G: Genome> {
    population: Population<G>,
    score: Box<dyn CalculateScore<G>>,
    adjusters: Vec<Box<dyn AdjustScore<G>>>,
    operators: OperationList<G>,
    selection: Box<dyn SelectionOperator<G>>,
    best_comparator: ScoreComparator,
    selection_comparator: ScoreComparator,
    iteration: u64,
    initialized: bool,
    validation_mode: bool,
    max_operation_errors: usize,
    max_gens_no_improvement: u32,
}

impl<G: Genome> fmt::Debug for TrainEa<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainEa")
            .field("iteration", &self.iteration)
            .field("population", &self.population.len())
            .field("species", &self.population.species().len())
            .field("operators", &self.operators.len())
            .field("selection", &self.selection)
            .field("minimize", &self.best_comparator.should_minimize())
            .finish_non_exhaustive()
    }
}

impl<G: Genome> TrainEa<G> {
    /// Create a trainer with tournament selection (4 rounds) and no
    /// operators.
    #[must_use]
    pub fn new(population: Population<G>, score: Box<dyn CalculateScore<G>>) -> Self {
        let best_comparator = ScoreComparator::new(score.should_minimize());
        Self {
            population,
            score,
            adjusters: Vec::new(),
            operators: OperationList::new(),
            selection: Box::new(TournamentSelection::new(4)),
            best_comparator,
            selection_comparator: best_comparator.adjusted(),
            iteration: 0,
            initialized: false,
            validation_mode: false,
            max_operation_errors: 500,
            max_gens_no_improvement: 15,
        }
    }

    /// Add an operator with a relative probability.
    ///
    /// # Errors
    ///
    /// See [`OperationList::add`].
    pub fn add_operation(&mut self, probability: f64, operator: Box<dyn EvolutionaryOperator<G>>) -> EaResult<()> {
        self.operators.add(probability, operator)
    }

    /// Add a score adjuster.
    pub fn add_score_adjuster(&mut self, adjuster: Box<dyn AdjustScore<G>>) {
        self.adjusters.push(adjuster);
    }

    /// Replace the selection operator.
    pub fn set_selection(&mut self, selection: Box<dyn SelectionOperator<G>>) {
        self.selection = selection;
    }

    /// Fail a generation whose best score is worse than the previous one.
    pub fn set_validation_mode(&mut self, on: bool) {
        self.validation_mode = on;
    }

    /// Failed operations tolerated per species per generation.
    pub fn set_max_operation_errors(&mut self, max: usize) {
        self.max_operation_errors = max.max(1);
    }

    /// Stale generations after which a non-best species dies.
    pub fn set_max_gens_no_improvement(&mut self, max: u32) {
        self.max_gens_no_improvement = max;
    }

    /// The population.
    #[must_use]
    pub fn population(&self) -> &Population<G> {
        &self.population
    }

    /// Give up the trainer, keeping the population.
    #[must_use]
    pub fn into_population(self) -> Population<G> {
        self.population
    }

    /// Generations completed.
    #[must_use]
    pub fn iteration_number(&self) -> u64 {
        self.iteration
    }

    /// Best genome found so far.
    #[must_use]
    pub fn best_genome(&self) -> Option<&G> {
        self.population.best_genome()
    }

    /// Raw score of the best genome, `NaN` before the first generation.
    #[must_use]
    pub fn error(&self) -> f64 {
        self.best_genome().map_or(f64::NAN, Genome::score)
    }

    /// Comparator for raw scores.
    #[must_use]
    pub fn best_comparator(&self) -> ScoreComparator {
        self.best_comparator
    }

    /// Run one generation.
    ///
    /// # Errors
    ///
    /// Returns [`EaError::Configuration`] without operators or genomes,
    /// [`EaError::Generation`] when operators fail too often, and
    /// [`EaError::Validation`] in validation mode if the best score worsens.
    /// Fatal scoring errors are propagated.
    pub fn iteration(&mut self, rng: &mut dyn RngCore) -> EaResult<GenerationStats> {
        if self.operators.is_empty() {
            return Err(EaError::Configuration("no evolutionary operators".into()));
        }
        if self.population.is_empty() {
            return Err(EaError::Configuration("population is empty".into()));
        }
        if !self.initialized {
            self.initialize()?;
        }
        let previous = self.population_best_score();

        self.assign_quotas();
        let mut brood = self.breed(rng)?;
        score_genomes(&mut brood.children, self.score.as_ref(), &self.adjusters)?;
        let discarded = brood.discarded;
        self.merge_and_cull(rng, brood);
        self.update_bookkeeping();

        let current = self.population_best_score();
        if self.validation_mode && self.best_comparator.is_better_score(previous, current) {
            return Err(EaError::Validation(format!(
                "best score worsened from {previous} to {current} in generation {}",
                self.iteration + 1
            )));
        }

        self.iteration += 1;
        let stats = self.stats(discarded);
        info!(
            "generation {}: best {:.6}, mean {:.6}, {} valid of {}, {} species",
            stats.iteration, stats.best_score, stats.mean_score, stats.valid_genomes, stats.population, stats.species
        );
        Ok(stats)
    }

    /// Score every genome and pick leaders and the best genome.
    fn initialize(&mut self) -> EaResult<()> {
        for species in self.population.species_mut() {
            score_genomes(species.members_mut(), self.score.as_ref(), &self.adjusters)?;
        }
        self.update_bookkeeping();
        self.initialized = true;
        debug!("initial population of {} scored", self.population.len());
        Ok(())
    }

    fn population_best_score(&self) -> f64 {
        self.population
            .find_best(self.best_comparator)
            .map_or(f64::NAN, Genome::score)
    }

    fn best_species_index(&self) -> Option<usize> {
        let cmp = self.selection_comparator;
        self.population
            .species()
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.leader().map(|l| (i, l)))
            .min_by(|(_, a), (_, b)| cmp.compare(*a, *b))
            .map(|(i, _)| i)
    }

    /// Split the population size among species by share.
    fn assign_quotas(&mut self) {
        let minimize = self.selection_comparator.should_minimize();
        let target = self.population.population_size();
        let max_score = self
            .population
            .genomes()
            .map(Genome::adjusted_score)
            .filter(|s| is_valid_score(*s))
            .fold(f64::NEG_INFINITY, f64::max);
        let max_score = if max_score.is_finite() { max_score } else { 0.0 };
        let best_species = self.best_species_index();
        let max_stale = self.max_gens_no_improvement;

        let mut shares: Vec<f64> = self
            .population
            .species_mut()
            .iter_mut()
            .enumerate()
            .map(|(i, s)| {
                let share = s.calculate_share(minimize, max_score);
                let stale = Some(i) != best_species && s.gens_no_improvement() > max_stale;
                if stale || !share.is_finite() { 0.0 } else { share.max(0.0) }
            })
            .collect();

        let mut total: f64 = shares.iter().sum();
        if total <= 0.0 {
            // No usable shares: split by member count
            shares = self.population.species().iter().map(|s| s.len() as f64).collect();
            total = shares.iter().sum();
        }

        let raw: Vec<f64> = shares.iter().map(|s| s / total * target as f64).collect();
        let mut quotas: Vec<usize> = raw.iter().map(|r| r.floor() as usize).collect();
        let mut remaining = target.saturating_sub(quotas.iter().sum());
        let mut by_fraction: Vec<usize> = (0..raw.len()).collect();
        by_fraction.sort_by(|&a, &b| (raw[b] - raw[b].floor()).total_cmp(&(raw[a] - raw[a].floor())));
        for &i in by_fraction.iter().cycle().take(raw.len() * 2) {
            if remaining == 0 {
                break;
            }
            quotas[i] += 1;
            remaining -= 1;
        }

        if let Some(best) = best_species {
            if quotas[best] == 0 && target > 0 {
                if let Some(donor) = (0..quotas.len()).max_by_key(|&i| quotas[i]) {
                    if quotas[donor] > 0 {
                        quotas[donor] -= 1;
                    }
                }
                quotas[best] = 1;
            }
        }

        for (species, quota) in self.population.species_mut().iter_mut().zip(&quotas) {
            species.set_offspring_count(*quota);
        }
        debug!("species quotas {quotas:?}");
    }

    /// Produce each species' quota of offspring.
    fn breed(&self, rng: &mut dyn RngCore) -> EaResult<Brood<G>> {
        let everyone = self.population.flatten();
        let max_size = self.population.max_individual_size();
        let mut brood = Brood {
            children: Vec::with_capacity(self.population.population_size()),
            species: Vec::with_capacity(self.population.population_size()),
            discarded: 0,
        };

        for (species_index, species) in self.population.species().iter().enumerate() {
            let quota = species.offspring_count();
            let mut produced = 0;
            let mut failures = 0;
            while produced < quota {
                if failures >= self.max_operation_errors {
                    warn!("species {species_index}: giving up after {failures} failed operations");
                    return Err(EaError::Generation(format!(
                        "{failures} failed operations while breeding species {species_index}"
                    )));
                }
                let operator = self
                    .operators
                    .pick(rng)
                    .ok_or_else(|| EaError::Configuration("no evolutionary operators".into()))?;
                let mut parents = Vec::with_capacity(operator.parents_needed());
                for _ in 0..operator.parents_needed() {
                    let index = self
                        .selection
                        .perform_selection(rng, &everyone, self.selection_comparator)
                        .ok_or_else(|| EaError::Generation("no parent to select".into()))?;
                    parents.push(everyone[index]);
                }

                let children = match operator.perform_operation(rng, &parents) {
                    Ok(children) => children,
                    Err(EaError::Program(e)) if !e.is_fatal() => {
                        debug!("{} failed: {e}", operator.name());
                        failures += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                let mut kept = 0;
                for mut child in children {
                    if produced == quota {
                        break;
                    }
                    if child.size() > max_size {
                        brood.discarded += 1;
                        continue;
                    }
                    self.population.rewrite(&mut child);
                    child.set_birth_generation(self.iteration + 1);
                    brood.children.push(child);
                    brood.species.push(species_index);
                    produced += 1;
                    kept += 1;
                }
                if kept == 0 {
                    failures += 1;
                }
            }
        }
        if brood.discarded > 0 {
            debug!("discarded {} oversized offspring", brood.discarded);
        }
        Ok(brood)
    }

    /// Add offspring to their species, then anti-select members down to the
    /// quota. The leader is never removed. Species with no quota die.
    fn merge_and_cull(&mut self, rng: &mut dyn RngCore, brood: Brood<G>) {
        let cmp = self.selection_comparator;
        let species = self.population.species_mut();
        for (child, index) in brood.children.into_iter().zip(brood.species) {
            species[index].add(child);
        }

        for s in species.iter_mut() {
            s.sort(cmp);
            let quota = s.offspring_count();
            while s.len() > quota.max(1) {
                let members = s.members_mut();
                let candidates: Vec<&G> = members[1..].iter().collect();
                let victim = self
                    .selection
                    .perform_anti_selection(rng, &candidates, cmp)
                    .map_or(members.len() - 1, |i| i + 1);
                members.remove(victim);
            }
        }
        let before = species.len();
        species.retain(|s| s.offspring_count() > 0 && !s.is_empty());
        if species.len() < before {
            debug!("{} species died out", before - species.len());
        }
    }

    /// Sort species, age them and update the best genome.
    fn update_bookkeeping(&mut self) {
        let cmp = self.selection_comparator;
        let best_cmp = self.best_comparator;
        for species in self.population.species_mut() {
            species.sort(cmp);
            species.update_bookkeeping(best_cmp);
        }
        let candidate = self.population.find_best(best_cmp).cloned();
        if let Some(candidate) = candidate {
            let improved = self
                .population
                .best_genome()
                .is_none_or(|best| best_cmp.is_better_than(&candidate, best));
            if improved {
                debug!("new best score {}", candidate.score());
                self.population.set_best_genome(candidate);
            }
        }
    }

    fn stats(&self, discarded: usize) -> GenerationStats {
        let (sum, valid) = self
            .population
            .genomes()
            .map(Genome::score)
            .filter(|s| is_valid_score(*s))
            .fold((0.0, 0usize), |(sum, n), s| (sum + s, n + 1));
        GenerationStats {
            iteration: self.iteration,
            best_score: self.error(),
            mean_score: if valid == 0 { f64::NAN } else { sum / valid as f64 },
            valid_genomes: valid,
            population: self.population.len(),
            species: self.population.species().len(),
            discarded,
        }
    }
}

impl TrainEa<Program> {
    /// Build a program trainer from a configuration: a random initial
    /// population, the configured operators, selection, adjusters and
    /// rewrite rules.
    ///
    /// # Errors
    ///
    /// Returns [`EaError::Configuration`] for an invalid configuration and
    /// [`EaError::Generation`] if the initial population cannot be built.
    pub fn for_programs(
        config: &EvolutionConfig,
        context: Arc<ProgramContext>,
        score: Box<dyn CalculateScore<Program>>,
        rng: &mut dyn RngCore,
    ) -> EaResult<Self> {
        config.validate()?;
        let generator = ProgramGenerator::new(Arc::clone(&context), config.max_depth)
            .map_err(|e| configuration(&e))?
            .with_method(config.generation_method)
            .with_const_range(config.min_const, config.max_const)?
            .with_max_generation_errors(config.max_operation_errors);
        let genomes = generator.generate_population(rng, config.population_size, &ZeroEvalScore)?;
        info!(
            "created {} programs ({:?}, depth {})",
            config.population_size, config.generation_method, config.max_depth
        );
        let population = Population::from_genomes(genomes, config.max_individual_size);
        Self::from_population(config, context, population, score)
    }

    /// Build a program trainer around an existing population, such as one
    /// loaded from a snapshot. The configuration supplies operators,
    /// selection, adjusters and rewrite rules; its population size replaces
    /// the population's target size.
    ///
    /// # Errors
    ///
    /// Returns [`EaError::Configuration`] for an invalid configuration.
    pub fn from_population(
        config: &EvolutionConfig,
        context: Arc<ProgramContext>,
        mut population: Population<Program>,
        score: Box<dyn CalculateScore<Program>>,
    ) -> EaResult<Self> {
        config.validate()?;
        population.set_population_size(config.population_size);
        if config.rewrite_algebraic {
            population.add_rewrite_rule(Box::new(RewriteAlgebraic));
        }
        if config.rewrite_constants {
            population.add_rewrite_rule(Box::new(RewriteConstants));
        }

        let minimize = score.should_minimize();
        let mut train = Self::new(population, score);
        if config.crossover_probability > 0.0 {
            train.add_operation(config.crossover_probability, Box::new(SubtreeCrossover))?;
        }
        if config.subtree_mutation_probability > 0.0 {
            let op = SubtreeMutation::new(context, config.mutation_depth)?;
            train.add_operation(config.subtree_mutation_probability, Box::new(op))?;
        }
        if config.const_mutation_probability > 0.0 {
            let op = ConstMutation::new(config.const_mutation_frequency, config.const_mutation_sigma)?;
            train.add_operation(config.const_mutation_probability, Box::new(op))?;
        }
        train.set_selection(config.selection.build()?);
        if config.complexity_penalty {
            train.add_score_adjuster(Box::new(ComplexityAdjustedScore::new(minimize)));
        }
        train.set_validation_mode(config.validation_mode);
        train.set_max_operation_errors(config.max_operation_errors);
        train.set_max_gens_no_improvement(config.max_gens_no_improvement);
        Ok(train)
    }
}

fn configuration(e: &ProgramError) -> EaError {
    EaError::Configuration(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ea::species::Species;
    use crate::fitness::{BasicDataSet, TrainingSetScore};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn context() -> Arc<ProgramContext> {
        let mut ctx = ProgramContext::new();
        ctx.enable_numeric_operators(true);
        ctx.define_variable("x").unwrap();
        Arc::new(ctx)
    }

    fn square_data() -> BasicDataSet {
        let mut data = BasicDataSet::new();
        for i in -5..=5 {
            let x = f64::from(i) / 2.0;
            data.add(vec![x], vec![x * x + 1.0]);
        }
        data
    }

    fn config() -> EvolutionConfig {
        EvolutionConfig {
            population_size: 30,
            max_depth: 3,
            ..EvolutionConfig::default()
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());
        let bad = EvolutionConfig {
            population_size: 0,
            ..config()
        };
        assert!(matches!(bad.validate(), Err(EaError::Configuration(_))));
        let bad = EvolutionConfig {
            crossover_probability: 0.0,
            subtree_mutation_probability: 0.0,
            const_mutation_probability: 0.0,
            ..config()
        };
        assert!(bad.validate().is_err());
        let bad = EvolutionConfig {
            selection: SelectionMethod::Truncation { percent: 2.0 },
            ..config()
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let score = Box::new(TrainingSetScore::new(Arc::new(square_data())));
        assert!(TrainEa::for_programs(&bad, context(), score, &mut rng).is_err());
    }

    #[test]
    fn test_huge_const_range_rejected() {
        let bad: EvolutionConfig =
            serde_json::from_str(r#"{"min_const": -1e308, "max_const": 1e308}"#).unwrap();
        assert!(matches!(bad.validate(), Err(EaError::Configuration(_))));
        let mut rng = SmallRng::seed_from_u64(1);
        let score = Box::new(TrainingSetScore::new(Arc::new(square_data())));
        let err = TrainEa::for_programs(&bad, context(), score, &mut rng).unwrap_err();
        assert!(matches!(err, EaError::Configuration(_)));
    }

    #[test]
    fn test_excessive_depth_rejected() {
        let bad = EvolutionConfig {
            mutation_depth: MAX_TREE_DEPTH,
            ..config()
        };
        assert!(matches!(bad.validate(), Err(EaError::Configuration(_))));
    }

    #[test]
    fn test_config_serde_defaults() {
        let config: EvolutionConfig = serde_json::from_str(r#"{"population_size": 7}"#).unwrap();
        assert_eq!(config.population_size, 7);
        assert_eq!(config.max_operation_errors, 500);
        let json = serde_json::to_string(&SelectionMethod::Truncation { percent: 0.3 }).unwrap();
        assert_eq!(json, r#"{"truncation":{"percent":0.3}}"#);
    }

    #[test]
    fn test_population_size_is_kept() {
        let mut rng = SmallRng::seed_from_u64(2);
        let score = Box::new(TrainingSetScore::new(Arc::new(square_data())));
        let mut train = TrainEa::for_programs(&config(), context(), score, &mut rng).unwrap();
        for generation in 1..=5 {
            let stats = train.iteration(&mut rng).unwrap();
            assert_eq!(stats.iteration, generation);
            assert_eq!(stats.population, 30);
            assert!(stats.valid_genomes > 0);
        }
        assert!(train.best_genome().is_some());
    }

    #[test]
    fn test_best_never_worsens() {
        let mut rng = SmallRng::seed_from_u64(3);
        let score = Box::new(TrainingSetScore::new(Arc::new(square_data())));
        let config = EvolutionConfig {
            validation_mode: true,
            ..config()
        };
        let mut train = TrainEa::for_programs(&config, context(), score, &mut rng).unwrap();
        let mut last = f64::INFINITY;
        for _ in 0..8 {
            let stats = train.iteration(&mut rng).unwrap();
            assert!(stats.best_score <= last);
            last = stats.best_score;
        }
    }

    #[test]
    fn test_requires_operators() {
        let ctx = context();
        let p = Program::from_expression(Arc::clone(&ctx), "x").unwrap();
        let population = Population::from_genomes(vec![p], 10);
        let score = Box::new(TrainingSetScore::new(Arc::new(square_data())));
        let mut train = TrainEa::new(population, score);
        let mut rng = SmallRng::seed_from_u64(4);
        assert!(matches!(train.iteration(&mut rng), Err(EaError::Configuration(_))));
    }

    #[test]
    fn test_quotas_follow_share() {
        let ctx = context();
        let score = Box::new(TrainingSetScore::new(Arc::new(square_data())));
        let good = Program::from_expression(Arc::clone(&ctx), "x*x+1").unwrap();
        let poor = Program::from_expression(Arc::clone(&ctx), "x").unwrap();
        let mut population = Population::new(10, 50);
        population.add_species(Species::new(good));
        population.add_species(Species::new(poor));
        let mut train = TrainEa::new(population, score);
        train.add_operation(1.0, Box::new(SubtreeCrossover)).unwrap();
        let mut rng = SmallRng::seed_from_u64(5);
        train.iteration(&mut rng).unwrap();

        let sizes: Vec<usize> = train.population().species().iter().map(Species::len).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 10);
        // The perfect species takes the whole share when minimizing
        assert_eq!(train.best_genome().unwrap().score(), 0.0);
        assert_eq!(train.population().species()[0].leader().unwrap().score(), 0.0);
    }
}
