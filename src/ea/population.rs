//! The population: every species, the best genome found so far and the
//! rewrite rules applied to offspring.

use super::genome::Genome;
use super::sort::ScoreComparator;
use super::species::Species;
use std::fmt;

/// Normalizes or simplifies a genome after an operator produced it.
pub trait RewriteRule<G>: Send + Sync + fmt::Debug {
    /// Rewrite `genome` in place. Returns true if anything changed.
    fn rewrite(&self, genome: &mut G) -> bool;
}

/// All genomes under evolution, grouped into species.
///
/// Species own their members and the population owns the species.
#[derive(Debug)]
pub struct Population<G> {
    species: Vec<Species<G>>,
    population_size: usize,
    max_individual_size: usize,
    best: Option<G>,
    rules: Vec<Box<dyn RewriteRule<G>>>,
}

impl<G: Genome> Population<G> {
    /// Create an empty population with a target size.
    #[must_use]
    pub fn new(population_size: usize, max_individual_size: usize) -> Self {
        Self {
            species: Vec::new(),
            population_size,
            max_individual_size,
            best: None,
            rules: Vec::new(),
        }
    }

    /// Create a population holding `genomes` in a single species.
    #[must_use]
    pub fn from_genomes(genomes: Vec<G>, max_individual_size: usize) -> Self {
        let mut population = Self::new(genomes.len(), max_individual_size);
        let mut iter = genomes.into_iter();
        if let Some(first) = iter.next() {
            let mut species = Species::new(first);
            for genome in iter {
                species.add(genome);
            }
            population.species.push(species);
        }
        population
    }

    /// Add a species.
    pub fn add_species(&mut self, species: Species<G>) {
        self.species.push(species);
    }

    /// All species.
    #[must_use]
    pub fn species(&self) -> &[Species<G>] {
        &self.species
    }

    /// Mutable species list.
    pub fn species_mut(&mut self) -> &mut Vec<Species<G>> {
        &mut self.species
    }

    /// Target number of genomes.
    #[must_use]
    pub fn population_size(&self) -> usize {
        self.population_size
    }

    /// Set the target number of genomes.
    pub fn set_population_size(&mut self, size: usize) {
        self.population_size = size;
    }

    /// Largest offspring size kept.
    #[must_use]
    pub fn max_individual_size(&self) -> usize {
        self.max_individual_size
    }

    /// Best genome found so far.
    #[must_use]
    pub fn best_genome(&self) -> Option<&G> {
        self.best.as_ref()
    }

    /// Replace the best genome.
    pub fn set_best_genome(&mut self, genome: G) {
        self.best = Some(genome);
    }

    /// Add a rewrite rule applied to every offspring.
    pub fn add_rewrite_rule(&mut self, rule: Box<dyn RewriteRule<G>>) {
        self.rules.push(rule);
    }

    /// Apply every rewrite rule in order. Returns true if any changed it.
    pub fn rewrite(&self, genome: &mut G) -> bool {
        self.rules
            .iter()
            .fold(false, |changed, rule| rule.rewrite(genome) | changed)
    }

    /// Number of genomes across all species.
    #[must_use]
    pub fn len(&self) -> usize {
        self.species.iter().map(Species::len).sum()
    }

    /// True if no species holds a genome.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over every genome.
    pub fn genomes(&self) -> impl Iterator<Item = &G> {
        self.species.iter().flat_map(|s| s.members().iter())
    }

    /// Flattened view of every genome.
    #[must_use]
    pub fn flatten(&self) -> Vec<&G> {
        self.genomes().collect()
    }

    /// Best genome currently in any species.
    pub fn find_best(&self, comparator: ScoreComparator) -> Option<&G> {
        self.genomes().min_by(|a, b| comparator.compare(*a, *b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prg::{Program, ProgramContext, RewriteAlgebraic};
    use std::sync::Arc;

    fn programs(texts: &[&str]) -> Vec<Program> {
        let mut ctx = ProgramContext::with_all_functions();
        ctx.define_variable("x").unwrap();
        let ctx = Arc::new(ctx);
        texts
            .iter()
            .map(|t| Program::from_expression(Arc::clone(&ctx), t).unwrap())
            .collect()
    }

    #[test]
    fn test_single_species() {
        let pop = Population::from_genomes(programs(&["x", "x+1", "x*2"]), 50);
        assert_eq!(pop.species().len(), 1);
        assert_eq!(pop.len(), 3);
        assert_eq!(pop.population_size(), 3);
        assert_eq!(pop.flatten().len(), 3);
        assert!(pop.best_genome().is_none());
    }

    #[test]
    fn test_find_best() {
        let mut genomes = programs(&["x", "x+1", "x*2"]);
        for (g, s) in genomes.iter_mut().zip([3.0, f64::NAN, 1.0]) {
            g.set_score(s);
        }
        let pop = Population::from_genomes(genomes, 50);
        let best = pop.find_best(ScoreComparator::minimize()).unwrap();
        assert_eq!(best.score(), 1.0);
        let best = pop.find_best(ScoreComparator::maximize()).unwrap();
        assert_eq!(best.score(), 3.0);
    }

    #[test]
    fn test_rewrite_rules() {
        let mut pop = Population::from_genomes(Vec::new(), 50);
        assert!(pop.is_empty());
        let mut genome = programs(&["x - 0"]).remove(0);
        assert!(!pop.rewrite(&mut genome));
        pop.add_rewrite_rule(Box::new(RewriteAlgebraic));
        assert!(pop.rewrite(&mut genome));
        assert_eq!(genome.to_string(), "x");
    }
}
