// Allow unwrap and unreadable literals in tests (test code is not production)
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::unreadable_literal))]
#![cfg_attr(test, allow(clippy::float_cmp))]
//! Stackgp: genetic programming over flat program buffers, plus K2 Bayesian
//! structure search.
//!
//! This crate provides:
//! - Typed expression programs encoded as prefix-ordered `u64` buffers
//! - A speciated evolutionary algorithm with parallel scoring
//! - Fitness functions for symbolic regression
//! - Discrete Bayesian networks trained with K2 search
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │     TrainEa  /  TrainBayesian       │
//! ├─────────────────────────────────────┤
//! │  fitness  │  selection, operators   │
//! ├─────────────────────────────────────┤
//! │  Program buffers (prg) │ networks   │
//! └─────────────────────────────────────┘
//! ```

pub mod bayes;
pub mod ea;
pub mod error;
pub mod fitness;
pub mod persistence;
pub mod prg;

pub use error::{BayesError, EaError, PersistError, ProgramError};

// Re-export the types most callers start from
pub use bayes::{BayesianNetwork, TrainBayesian};
pub use ea::{EvolutionConfig, Genome, TrainEa};
pub use fitness::{BasicDataSet, TrainingSetScore};
pub use prg::{ExpressionValue, Program, ProgramContext};
