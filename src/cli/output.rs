//! Output formatting utilities for CLI.

use serde::Serialize;
use stackgp::ea::GenerationStats;
use stackgp::{Genome, Program};

/// JSON-serializable evolution result.
#[derive(Debug, Serialize)]
pub(super) struct JsonEvolveResult {
    /// Generations completed.
    pub(super) generations: u64,
    /// Best raw score, null if no program scored.
    pub(super) best_score: Option<f64>,
    /// Best program in infix notation.
    pub(super) expression: Option<String>,
    /// Node count of the best program.
    pub(super) size: Option<usize>,
    /// Generation the best program was created in.
    pub(super) birth_generation: Option<u64>,
    /// Statistics of the last generation.
    pub(super) last: Option<GenerationStats>,
    /// Wall-clock seconds spent evolving.
    pub(super) elapsed_seconds: f64,
}

impl JsonEvolveResult {
    /// Create from the trainer's final state.
    pub(super) fn new(
        generations: u64,
        best: Option<&Program>,
        last: Option<GenerationStats>,
        elapsed_seconds: f64,
    ) -> Self {
        Self {
            generations,
            best_score: best.map(Genome::score).filter(|s| s.is_finite()),
            expression: best.and_then(|p| p.render_infix().ok()),
            size: best.map(Program::size),
            birth_generation: best.map(Program::birth_generation),
            last,
            elapsed_seconds,
        }
    }
}

/// One generation as a text line.
pub(super) fn format_generation(stats: &GenerationStats) -> String {
    format!(
        "gen {:>5}  best {:>12.6}  mean {:>12.6}  valid {:>4}/{:<4}  species {:>3}",
        stats.iteration,
        stats.best_score,
        stats.mean_score,
        stats.valid_genomes,
        stats.population,
        stats.species
    )
}

/// Final result as human-readable text.
pub(super) fn format_result(result: &JsonEvolveResult) -> String {
    let mut output = String::new();
    output.push_str(&format!("Evolution finished after {} generations\n", result.generations));
    match (&result.expression, result.best_score) {
        (Some(expr), Some(score)) => {
            output.push_str(&format!("  Best score: {score:.6}\n"));
            output.push_str(&format!("  Best program: {expr}\n"));
            if let Some(size) = result.size {
                output.push_str(&format!("  Size: {size} nodes\n"));
            }
            if let Some(born) = result.birth_generation {
                output.push_str(&format!("  Born in generation: {born}\n"));
            }
        }
        _ => output.push_str("  No valid program found\n"),
    }
    output.push_str(&format!("  Elapsed time: {:.2}s\n", result.elapsed_seconds));
    output
}
