//! Fits probability tables from discretized records.

// Counts become probabilities
#![allow(clippy::cast_precision_loss)]

use super::network::BayesianNetwork;
use super::table::{BayesianTable, roll};

/// Maximum-likelihood estimator with optional Laplace smoothing, one event
/// per iteration.
///
/// `P(choice | instance) = (N_choice + alpha) / (N + alpha · r)`. A parent
/// instance never seen with `alpha == 0` gets a uniform row.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleEstimator {
    alpha: f64,
    index: usize,
}

impl SimpleEstimator {
    /// An estimator adding `alpha` pseudo-counts to every cell; negative or
    /// non-finite values are treated as zero.
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha.is_finite() { alpha.max(0.0) } else { 0.0 };
        Self { alpha, index: 0 }
    }

    /// Smoothing pseudo-count.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Start again from the first event.
    pub fn init(&mut self) {
        self.index = 0;
    }

    /// Fit the next event's table. Returns false once every event is done.
    pub fn iteration(&mut self, network: &mut BayesianNetwork, records: &[Vec<usize>]) -> bool {
        if let Some(table) = self.estimate(network, records, self.index) {
            if let Some(event) = network.event_mut(self.index) {
                event.set_table(table);
            }
        }
        self.index += 1;
        self.index < network.len()
    }

    /// Fit a fresh table for one event.
    #[must_use]
    pub fn estimate(
        &self,
        network: &BayesianNetwork,
        records: &[Vec<usize>],
        event_index: usize,
    ) -> Option<BayesianTable> {
        let event = network.event(event_index)?;
        let parents = event.parents();
        let radices = network.parent_choices(event);
        let r = event.choice_count();
        let mut table = BayesianTable::uniform(r, radices.clone());

        let mut instance = vec![0; parents.len()];
        let mut row = 0;
        loop {
            let mut counts = vec![0usize; r];
            for record in records {
                if parents.iter().zip(&instance).all(|(&p, &v)| record[p] == v) {
                    counts[record[event_index]] += 1;
                }
            }
            let total: usize = counts.iter().sum();
            let denom = total as f64 + self.alpha * r as f64;
            if denom > 0.0 {
                let values: Vec<f64> = counts
                    .iter()
                    .map(|&c| (c as f64 + self.alpha) / denom)
                    .collect();
                table.set_row(row, &values);
            }
            row += 1;
            if !roll(&mut instance, &radices) {
                break;
            }
        }
        Some(table)
    }
}
