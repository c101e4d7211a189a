//! Structure search plus table fitting, run as a phased trainer.

use super::estimator::SimpleEstimator;
use super::k2::SearchK2;
use super::network::BayesianNetwork;
use crate::error::{BayesError, BayesResult};
use crate::fitness::TrainingData;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Starting structure before the search runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BayesianInit {
    /// Remove every dependency.
    Empty,
    /// Keep the network as given.
    NoChange,
    /// Make the classification target a parent of every other event.
    #[default]
    NaiveBayes,
}

/// Where a [`TrainBayesian`] is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainingPhase {
    /// Set up the starting structure.
    Init,
    /// One K2 step per iteration.
    Search,
    /// Rebuild tables for the final structure.
    SearchDone,
    /// One event's table per iteration.
    Probability,
    /// Measure the classification error.
    Finish,
    /// Nothing left to do.
    Terminated,
}

/// Learns a network's structure with K2, then fits its tables.
///
/// Each call to [`TrainBayesian::iteration`] advances one step; the error
/// stays 1.0 until the final phase.
#[derive(Debug, Clone)]
pub struct TrainBayesian {
    network: BayesianNetwork,
    records: Vec<Vec<usize>>,
    max_parents: usize,
    init: BayesianInit,
    search: SearchK2,
    estimator: SimpleEstimator,
    phase: TrainingPhase,
    error: f64,
    iterations: usize,
}

impl TrainBayesian {
    /// Prepare to train `network` on `data`, one input per event.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::MaxParents`] if `max_parents` is zero, or a
    /// width or choice error if a record does not fit the network.
    pub fn new(
        network: BayesianNetwork,
        data: &dyn TrainingData,
        max_parents: usize,
    ) -> BayesResult<Self> {
        if max_parents == 0 {
            return Err(BayesError::MaxParents);
        }
        let mut records = Vec::with_capacity(data.count());
        for pair in data.pairs() {
            records.push(network.determine_classes(&pair.input)?);
        }
        let mut search = SearchK2::new();
        search.init(&network, &records);
        Ok(Self {
            network,
            records,
            max_parents,
            init: BayesianInit::default(),
            search,
            estimator: SimpleEstimator::default(),
            phase: TrainingPhase::Init,
            error: 1.0,
            iterations: 0,
        })
    }

    /// Use a different starting structure.
    #[must_use]
    pub fn with_init(mut self, init: BayesianInit) -> Self {
        self.init = init;
        self
    }

    /// Use a different table estimator.
    #[must_use]
    pub fn with_estimator(mut self, estimator: SimpleEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> TrainingPhase {
        self.phase
    }

    /// Misclassification rate, or 1.0 before training finishes.
    #[must_use]
    pub fn error(&self) -> f64 {
        self.error
    }

    /// Iterations run so far.
    #[must_use]
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Maximum parents per event.
    #[must_use]
    pub fn max_parents(&self) -> usize {
        self.max_parents
    }

    /// True once the last phase has run.
    #[must_use]
    pub fn is_training_done(&self) -> bool {
        self.phase == TrainingPhase::Terminated
    }

    /// The network being trained.
    #[must_use]
    pub fn network(&self) -> &BayesianNetwork {
        &self.network
    }

    /// Take the trained network.
    #[must_use]
    pub fn into_network(self) -> BayesianNetwork {
        self.network
    }

    /// Advance one step.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::NoClassificationTarget`] for a naive-Bayes start
    /// without a target, or any structure error from the search.
    pub fn iteration(&mut self) -> BayesResult<()> {
        self.iterations += 1;
        match self.phase {
            TrainingPhase::Init => self.iteration_init()?,
            TrainingPhase::Search => {
                if !self
                    .search
                    .iteration(&mut self.network, &self.records, self.max_parents)?
                {
                    debug!("search finished: {}", self.network);
                    self.phase = TrainingPhase::SearchDone;
                }
            }
            TrainingPhase::SearchDone => {
                self.network.finalize_structure();
                self.estimator.init();
                self.phase = TrainingPhase::Probability;
            }
            TrainingPhase::Probability => {
                if !self.estimator.iteration(&mut self.network, &self.records) {
                    self.phase = TrainingPhase::Finish;
                }
            }
            TrainingPhase::Finish => {
                self.error = match self.network.calculate_error_classes(&self.records) {
                    Ok(e) => e,
                    Err(BayesError::NoClassificationTarget) => 1.0,
                    Err(e) => return Err(e),
                };
                info!(
                    "bayesian training done: {} parameters, error {:.4}",
                    self.network.calculate_parameter_count(),
                    self.error
                );
                self.phase = TrainingPhase::Terminated;
            }
            TrainingPhase::Terminated => {}
        }
        Ok(())
    }

    /// Run every remaining step and return the final error.
    ///
    /// # Errors
    ///
    /// See [`TrainBayesian::iteration`].
    pub fn train(&mut self) -> BayesResult<f64> {
        while !self.is_training_done() {
            self.iteration()?;
        }
        Ok(self.error)
    }

    fn iteration_init(&mut self) -> BayesResult<()> {
        match self.init {
            BayesianInit::Empty => {
                self.network.remove_all_relations();
                self.network.finalize_structure();
            }
            BayesianInit::NoChange => {}
            BayesianInit::NaiveBayes => {
                let target = self
                    .network
                    .classification_target()
                    .ok_or(BayesError::NoClassificationTarget)?;
                self.network.remove_all_relations();
                for event in 0..self.network.len() {
                    if event != target {
                        self.network.create_dependency(target, event)?;
                    }
                }
                self.network.finalize_structure();
            }
        }
        info!("bayesian init {:?}: {}", self.init, self.network);
        self.phase = TrainingPhase::Search;
        Ok(())
    }
}
