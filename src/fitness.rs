//! Fitness functions and score adjusters for programs.
//!
//! Every scorer returns `Ok(NaN)` for a program that fails evaluation in an
//! ordinary way (division by zero, type mismatch) and only returns `Err` for
//! a corrupt buffer.

mod adaptive;
mod complexity;
mod dataset;
mod multi;
mod simple;
mod zero;

pub use adaptive::{AdaptiveSimpleFitness, ErrorKind, MIN_RANGE};
pub use complexity::ComplexityAdjustedScore;
pub use dataset::{BasicDataSet, DataPair, TrainingData};
pub use multi::MultiObjectiveFitness;
pub use simple::TrainingSetScore;
pub use zero::ZeroEvalScore;
