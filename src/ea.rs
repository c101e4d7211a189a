//! Evolutionary algorithm core, generic over the genome type.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │         TrainEa (driver)            │
//! ├─────────────────────────────────────┤
//! │ Selection │ Operators │ Rewrite     │
//! ├─────────────────────────────────────┤
//! │  Scoring (rayon) + score adjusters  │
//! ├─────────────────────────────────────┤
//! │  Population → Species → Genomes     │
//! └─────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use stackgp::ea::{EvolutionConfig, TrainEa};
//!
//! let mut train = TrainEa::for_programs(&config, context, score, &mut rng)?;
//! for _ in 0..100 {
//!     let stats = train.iteration(&mut rng)?;
//! }
//! ```

mod evolution;
mod genome;
mod operators;
mod population;
mod score;
mod selection;
mod sort;
mod species;

pub use evolution::{EvolutionConfig, GenerationStats, SelectionMethod, TrainEa};
pub use genome::{Genome, is_valid_score};
pub use operators::{EvolutionaryOperator, OperationList};
pub use population::{Population, RewriteRule};
pub use score::{AdjustScore, CalculateScore, adjust_score, score_genome, score_genomes};
pub use selection::{SelectionOperator, TournamentSelection, TruncationSelection};
pub use sort::ScoreComparator;
pub use species::Species;
