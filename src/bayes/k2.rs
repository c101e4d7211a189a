//! K2 greedy structure search.
//!
//! Events are visited in a fixed order (classification target first). Each
//! event repeatedly takes the earlier-ordered event that most improves its
//! Bayesian-Dirichlet score as a new parent, until nothing improves or it
//! reaches the parent limit. Parents always precede children in the
//! ordering, so the result is acyclic.

// Counts feed ln() and factorial tables
#![allow(clippy::cast_precision_loss)]

use super::network::BayesianNetwork;
use crate::error::{BayesError, BayesResult};
use log::debug;

/// Incremental K2 search over discretized records.
#[derive(Debug, Clone, Default)]
pub struct SearchK2 {
    ordering: Vec<usize>,
    position: Option<usize>,
    ln_factorials: Vec<f64>,
}

impl SearchK2 {
    /// A search that has not started yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare for `records` and reset to the first event.
    pub fn init(&mut self, network: &BayesianNetwork, records: &[Vec<usize>]) {
        let max_choices = network
            .events()
            .iter()
            .map(super::BayesianEvent::choice_count)
            .max()
            .unwrap_or(0);
        let limit = records.len() + max_choices + 1;
        self.ln_factorials = Vec::with_capacity(limit);
        let mut acc = 0.0;
        self.ln_factorials.push(0.0);
        for k in 1..limit {
            acc += (k as f64).ln();
            self.ln_factorials.push(acc);
        }
        self.order_nodes(network);
        self.position = None;
    }

    /// Event indices in visiting order.
    #[must_use]
    pub fn ordering(&self) -> &[usize] {
        &self.ordering
    }

    fn order_nodes(&mut self, network: &BayesianNetwork) {
        self.ordering.clear();
        if let Some(target) = network.classification_target() {
            self.ordering.push(target);
        }
        for index in 0..network.len() {
            if !self.ordering.contains(&index) {
                self.ordering.push(index);
            }
        }
    }

    fn ln_factorial(&self, n: usize) -> f64 {
        match self.ln_factorials.get(n) {
            Some(&v) => v,
            None => (2..=n).map(|k| (k as f64).ln()).sum(),
        }
    }

    /// Count records where `event` takes `desired` (or anything, when
    /// `None`) and each of `parents` takes the matching value of `instance`.
    #[must_use]
    pub fn calculate_n(
        records: &[Vec<usize>],
        event: usize,
        parents: &[usize],
        instance: &[usize],
        desired: Option<usize>,
    ) -> usize {
        records
            .iter()
            .filter(|d| desired.is_none_or(|v| d[event] == v))
            .filter(|d| parents.iter().zip(instance).all(|(&p, &v)| d[p] == v))
            .count()
    }

    /// Natural log of the K2 score of `event` with `parents`:
    ///
    /// `Σ_j [ ln (r-1)! - ln (N_j + r - 1)! + Σ_k ln N_jk! ]`
    ///
    /// over every parent instance `j`, where `r` is the number of choices.
    #[must_use]
    pub fn calculate_log_g(
        &self,
        network: &BayesianNetwork,
        records: &[Vec<usize>],
        event: usize,
        parents: &[usize],
    ) -> f64 {
        let Some(e) = network.event(event) else {
            return f64::NEG_INFINITY;
        };
        let r = e.choice_count();
        let radices: Vec<usize> = parents
            .iter()
            .map(|&p| network.event(p).map_or(1, super::BayesianEvent::choice_count))
            .collect();
        let rows: usize = radices.iter().product();

        let mut counts = vec![0usize; rows * r];
        for record in records {
            let mut row = 0;
            let mut scale = 1;
            for (&p, &radix) in parents.iter().zip(&radices) {
                row += record[p] * scale;
                scale *= radix;
            }
            counts[row * r + record[event]] += 1;
        }

        let numerator = self.ln_factorial(r.saturating_sub(1));
        counts
            .chunks(r.max(1))
            .map(|row| {
                let n: usize = row.iter().sum();
                let products: f64 = row.iter().map(|&k| self.ln_factorial(k)).sum();
                numerator - self.ln_factorial(n + r - 1) + products
            })
            .sum()
    }

    /// The K2 score itself. Underflows to zero for large data sets; prefer
    /// [`SearchK2::calculate_log_g`] for comparisons.
    #[must_use]
    pub fn calculate_g(
        &self,
        network: &BayesianNetwork,
        records: &[Vec<usize>],
        event: usize,
        parents: &[usize],
    ) -> f64 {
        self.calculate_log_g(network, records, event, parents).exp()
    }

    /// Best new parent for `event` among the first `n` ordered events, if
    /// any beats `old`.
    fn find_z(
        &self,
        network: &BayesianNetwork,
        records: &[Vec<usize>],
        event: usize,
        n: usize,
        old: f64,
    ) -> Option<(usize, f64)> {
        let current = network.event(event).map(|e| e.parents().to_vec()).unwrap_or_default();
        let mut best: Option<(usize, f64)> = None;
        for &trial in &self.ordering[..n] {
            if current.contains(&trial) {
                continue;
            }
            let mut parents = current.clone();
            parents.push(trial);
            let g = self.calculate_log_g(network, records, event, &parents);
            if g > old && best.is_none_or(|(_, b)| g > b) {
                best = Some((trial, g));
            }
        }
        best
    }

    /// Process one event. The first call only orders the events.
    ///
    /// Returns false once every event has been processed.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::MaxParents`] if `max_parents` is zero.
    pub fn iteration(
        &mut self,
        network: &mut BayesianNetwork,
        records: &[Vec<usize>],
        max_parents: usize,
    ) -> BayesResult<bool> {
        if max_parents == 0 {
            return Err(BayesError::MaxParents);
        }
        let next = match self.position {
            None => {
                self.order_nodes(network);
                0
            }
            Some(index) => {
                self.process(network, records, index, max_parents)?;
                index + 1
            }
        };
        self.position = Some(next);
        Ok(next < network.len())
    }

    fn process(
        &self,
        network: &mut BayesianNetwork,
        records: &[Vec<usize>],
        index: usize,
        max_parents: usize,
    ) -> BayesResult<()> {
        let Some(&event) = self.ordering.get(index) else {
            return Ok(());
        };
        let parents = network.event(event).map(|e| e.parents().to_vec()).unwrap_or_default();
        let mut old = self.calculate_log_g(network, records, event, &parents);
        while network.event(event).is_some_and(|e| e.parents().len() < max_parents) {
            let Some((z, g)) = self.find_z(network, records, event, index, old) else {
                break;
            };
            network.create_dependency(z, event)?;
            debug!("k2: {} (ln g {g:.4})", network.event_string(event));
            old = g;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_event(records: &[usize]) -> (BayesianNetwork, Vec<Vec<usize>>, SearchK2) {
        let mut net = BayesianNetwork::new();
        net.create_boolean_event("a").unwrap();
        let records: Vec<Vec<usize>> = records.iter().map(|&v| vec![v]).collect();
        let mut k2 = SearchK2::new();
        k2.init(&net, &records);
        (net, records, k2)
    }

    #[test]
    fn test_g_closed_form() {
        // 1! / 5! * 2! * 2!
        let (net, records, k2) = single_event(&[0, 1, 0, 1]);
        assert!((k2.calculate_g(&net, &records, 0, &[]) - 1.0 / 30.0).abs() < 1e-12);
        // 1! / 5! * 3! * 1!
        let (net, records, k2) = single_event(&[0, 0, 1, 0]);
        assert!((k2.calculate_g(&net, &records, 0, &[]) - 1.0 / 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_calculate_n() {
        let records = vec![vec![0, 0], vec![0, 1], vec![1, 1], vec![0, 1]];
        assert_eq!(SearchK2::calculate_n(&records, 1, &[0], &[0], Some(1)), 2);
        assert_eq!(SearchK2::calculate_n(&records, 1, &[0], &[0], None), 3);
        assert_eq!(SearchK2::calculate_n(&records, 1, &[], &[], Some(1)), 3);
    }

    #[test]
    fn test_ordering_puts_target_first() {
        let mut net = BayesianNetwork::new();
        for label in ["a", "b", "c"] {
            net.create_boolean_event(label).unwrap();
        }
        net.set_classification_target(2).unwrap();
        let mut k2 = SearchK2::new();
        k2.init(&net, &[]);
        assert_eq!(k2.ordering(), &[2, 0, 1]);
    }

    #[test]
    fn test_finds_copied_parent() {
        let mut net = BayesianNetwork::new();
        net.create_boolean_event("a").unwrap();
        net.create_boolean_event("b").unwrap();
        // b always equals a
        let records: Vec<Vec<usize>> = (0..20).map(|i| vec![i % 2, i % 2]).collect();
        let mut k2 = SearchK2::new();
        k2.init(&net, &records);
        while k2.iteration(&mut net, &records, 2).unwrap() {}
        assert!(net.has_dependency(0, 1));
        assert!(!net.has_dependency(1, 0));
    }

    #[test]
    fn test_zero_max_parents() {
        let (mut net, records, mut k2) = single_event(&[0]);
        assert_eq!(k2.iteration(&mut net, &records, 0), Err(BayesError::MaxParents));
    }
}
