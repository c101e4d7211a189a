//! A Bayesian network of discrete events.

// Record counts become divisors
#![allow(clippy::cast_precision_loss)]

use super::event::BayesianEvent;
use super::table::{BayesianTable, roll};
use crate::error::{BayesError, BayesResult};
use crate::fitness::TrainingData;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A DAG of [`BayesianEvent`]s with one probability table per event.
///
/// Events are addressed by their index in definition order. Adding a
/// dependency does not check for cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BayesianNetwork {
    events: Vec<BayesianEvent>,
    classification_target: Option<usize>,
    input_present: Vec<bool>,
}

impl BayesianNetwork {
    /// An empty network.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event, returning its index.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::DuplicateEvent`] if the label is taken.
    pub fn create_event(&mut self, event: BayesianEvent) -> BayesResult<usize> {
        if self.event_index(event.label()).is_some() {
            return Err(BayesError::DuplicateEvent(event.label().to_string()));
        }
        self.events.push(event);
        self.input_present.push(true);
        Ok(self.events.len() - 1)
    }

    /// Add a `true`/`false` event.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::DuplicateEvent`] if the label is taken.
    pub fn create_boolean_event(&mut self, label: &str) -> BayesResult<usize> {
        self.create_event(BayesianEvent::boolean(label))
    }

    /// Index of the event with `label`.
    #[must_use]
    pub fn event_index(&self, label: &str) -> Option<usize> {
        self.events.iter().position(|e| e.label() == label)
    }

    /// Index of the event with `label`.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::UnknownEvent`] if no event has that label.
    pub fn require_event(&self, label: &str) -> BayesResult<usize> {
        self.event_index(label)
            .ok_or_else(|| BayesError::UnknownEvent(label.to_string()))
    }

    /// Event at `index`.
    #[must_use]
    pub fn event(&self, index: usize) -> Option<&BayesianEvent> {
        self.events.get(index)
    }

    /// All events, in definition order.
    #[must_use]
    pub fn events(&self) -> &[BayesianEvent] {
        &self.events
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if the network has no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// True if `parent` is already a parent of `child`.
    #[must_use]
    pub fn has_dependency(&self, parent: usize, child: usize) -> bool {
        self.events
            .get(child)
            .is_some_and(|e| e.parents().contains(&parent))
    }

    /// Make `parent` a parent of `child`. Adding an existing dependency is
    /// a no-op. The child's probability table is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::InvalidDependency`] for an out-of-range index or
    /// a self-dependency.
    pub fn create_dependency(&mut self, parent: usize, child: usize) -> BayesResult<()> {
        let count = self.events.len();
        if parent >= count || child >= count {
            return Err(BayesError::InvalidDependency(format!(
                "{parent} -> {child} with {count} events"
            )));
        }
        if parent == child {
            return Err(BayesError::InvalidDependency(format!(
                "`{}` cannot depend on itself",
                self.events[child].label()
            )));
        }
        if self.has_dependency(parent, child) {
            return Ok(());
        }
        self.events[parent].add_child(child);
        self.events[child].add_parent(parent);
        Ok(())
    }

    /// [`BayesianNetwork::create_dependency`] by label.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::UnknownEvent`] for an undefined label.
    pub fn create_dependency_by_label(&mut self, parent: &str, child: &str) -> BayesResult<()> {
        let parent = self.require_event(parent)?;
        let child = self.require_event(child)?;
        self.create_dependency(parent, child)
    }

    /// Remove every dependency and every probability table.
    pub fn remove_all_relations(&mut self) {
        for event in &mut self.events {
            event.remove_all_relations();
        }
    }

    /// Give every event a uniform table sized for its current parents.
    pub fn finalize_structure(&mut self) {
        let tables: Vec<BayesianTable> = self
            .events
            .iter()
            .map(|e| BayesianTable::uniform(e.choice_count(), self.parent_choices(e)))
            .collect();
        for (event, table) in self.events.iter_mut().zip(tables) {
            event.set_table(table);
        }
    }

    /// Choice counts of an event's parents, in parent order.
    pub(crate) fn parent_choices(&self, event: &BayesianEvent) -> Vec<usize> {
        event
            .parents()
            .iter()
            .map(|&p| self.events[p].choice_count())
            .collect()
    }

    /// Number of free parameters: `Σ (choices - 1) · Π parent choices`.
    #[must_use]
    pub fn calculate_parameter_count(&self) -> usize {
        self.events
            .iter()
            .map(|e| {
                let rows: usize = self.parent_choices(e).iter().product();
                e.choice_count().saturating_sub(1) * rows
            })
            .sum()
    }

    /// Set one cell of an event's table.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::MissingTable`] before the structure is
    /// finalized and [`BayesError::InvalidTable`] for a bad cell.
    pub fn set_probability(
        &mut self,
        event: usize,
        parent_values: &[usize],
        choice: usize,
        p: f64,
    ) -> BayesResult<()> {
        let e = self
            .events
            .get_mut(event)
            .ok_or_else(|| BayesError::UnknownEvent(event.to_string()))?;
        let label = e.label().to_string();
        e.table_mut()
            .ok_or(BayesError::MissingTable(label))?
            .set_probability(parent_values, choice, p)
    }

    pub(crate) fn event_mut(&mut self, index: usize) -> Option<&mut BayesianEvent> {
        self.events.get_mut(index)
    }

    /// Check every table exists and every row sums to one.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid table.
    pub fn validate(&self) -> BayesResult<()> {
        for event in &self.events {
            event
                .table()
                .ok_or_else(|| BayesError::MissingTable(event.label().to_string()))?
                .validate()?;
        }
        Ok(())
    }

    /// Choose the event predicted by [`BayesianNetwork::classify`].
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::InvalidDependency`] for an out-of-range index.
    pub fn set_classification_target(&mut self, index: usize) -> BayesResult<()> {
        if index >= self.events.len() {
            return Err(BayesError::InvalidDependency(format!(
                "classification target {index} with {} events",
                self.events.len()
            )));
        }
        self.classification_target = Some(index);
        Ok(())
    }

    /// Index of the classification target.
    #[must_use]
    pub fn classification_target(&self) -> Option<usize> {
        self.classification_target
    }

    /// Mark whether an input is observed during classification. Unobserved
    /// events are summed out.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::UnknownEvent`] for an out-of-range index.
    pub fn set_input_present(&mut self, index: usize, present: bool) -> BayesResult<()> {
        let slot = self
            .input_present
            .get_mut(index)
            .ok_or_else(|| BayesError::UnknownEvent(index.to_string()))?;
        *slot = present;
        Ok(())
    }

    /// Map raw inputs (one per event) to choice indices.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::InputWidth`] for the wrong number of inputs and
    /// [`BayesError::InvalidChoice`] for an unmatched value.
    pub fn determine_classes(&self, input: &[f64]) -> BayesResult<Vec<usize>> {
        if input.len() != self.events.len() {
            return Err(BayesError::InputWidth {
                expected: self.events.len(),
                actual: input.len(),
            });
        }
        self.events
            .iter()
            .zip(input)
            .map(|(event, &value)| event.match_choice_to_range(value))
            .collect()
    }

    /// Joint probability of a full assignment of choices.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::MissingTable`] before the structure is finalized.
    pub fn joint_probability(&self, assignment: &[usize]) -> BayesResult<f64> {
        let mut p = 1.0;
        let mut instance = Vec::new();
        for (index, event) in self.events.iter().enumerate() {
            let table = event
                .table()
                .ok_or_else(|| BayesError::MissingTable(event.label().to_string()))?;
            instance.clear();
            instance.extend(event.parents().iter().map(|&q| assignment[q]));
            p *= table.probability(&instance, assignment[index])?;
        }
        Ok(p)
    }

    /// Posterior over the target's choices given the observed classes.
    ///
    /// Unobserved events are enumerated and summed out; the target's own
    /// entry in `classes` is ignored. An all-zero posterior is returned as is.
    ///
    /// # Errors
    ///
    /// Fails without a classification target, on a width mismatch or before
    /// the structure is finalized.
    pub fn classification_probabilities(&self, classes: &[usize]) -> BayesResult<Vec<f64>> {
        let target = self
            .classification_target
            .ok_or(BayesError::NoClassificationTarget)?;
        if classes.len() != self.events.len() {
            return Err(BayesError::InputWidth {
                expected: self.events.len(),
                actual: classes.len(),
            });
        }
        let hidden: Vec<usize> = (0..self.events.len())
            .filter(|&i| i != target && !self.input_present[i])
            .collect();
        let radices: Vec<usize> = hidden.iter().map(|&i| self.events[i].choice_count()).collect();

        let mut assignment = classes.to_vec();
        let mut posterior = Vec::with_capacity(self.events[target].choice_count());
        for choice in 0..self.events[target].choice_count() {
            assignment[target] = choice;
            let mut values = vec![0; hidden.len()];
            let mut total = 0.0;
            loop {
                for (&event, &value) in hidden.iter().zip(&values) {
                    assignment[event] = value;
                }
                total += self.joint_probability(&assignment)?;
                if !roll(&mut values, &radices) {
                    break;
                }
            }
            posterior.push(total);
        }
        let sum: f64 = posterior.iter().sum();
        if sum > 0.0 {
            for p in &mut posterior {
                *p /= sum;
            }
        }
        Ok(posterior)
    }

    /// Most probable target choice for already-discretized classes. Ties go
    /// to the lower index.
    ///
    /// # Errors
    ///
    /// See [`BayesianNetwork::classification_probabilities`].
    pub fn classify_classes(&self, classes: &[usize]) -> BayesResult<usize> {
        let posterior = self.classification_probabilities(classes)?;
        let mut best = 0;
        for (i, &p) in posterior.iter().enumerate() {
            if p > posterior[best] {
                best = i;
            }
        }
        Ok(best)
    }

    /// Most probable target choice for raw inputs, one per event.
    ///
    /// # Errors
    ///
    /// See [`BayesianNetwork::determine_classes`] and
    /// [`BayesianNetwork::classification_probabilities`].
    pub fn classify(&self, input: &[f64]) -> BayesResult<usize> {
        self.classify_classes(&self.determine_classes(input)?)
    }

    /// Fraction of records whose target is misclassified.
    ///
    /// # Errors
    ///
    /// See [`BayesianNetwork::classify`].
    pub fn calculate_error(&self, data: &dyn TrainingData) -> BayesResult<f64> {
        let mut records = Vec::with_capacity(data.count());
        for pair in data.pairs() {
            records.push(self.determine_classes(&pair.input)?);
        }
        self.calculate_error_classes(&records)
    }

    pub(crate) fn calculate_error_classes(&self, records: &[Vec<usize>]) -> BayesResult<f64> {
        let target = self
            .classification_target
            .ok_or(BayesError::NoClassificationTarget)?;
        if records.is_empty() {
            return Ok(0.0);
        }
        let mut bad = 0usize;
        for record in records {
            if self.classify_classes(record)? != record[target] {
                bad += 1;
            }
        }
        Ok(bad as f64 / records.len() as f64)
    }

    /// Render one event as `P(child|parent,parent)`.
    #[must_use]
    pub fn event_string(&self, index: usize) -> String {
        let Some(event) = self.events.get(index) else {
            return String::new();
        };
        if !event.has_parents() {
            return format!("P({})", event.label());
        }
        let parents: Vec<&str> = event
            .parents()
            .iter()
            .map(|&p| self.events[p].label())
            .collect();
        format!("P({}|{})", event.label(), parents.join(","))
    }

    /// Every event with its choices, e.g. `P(a[true,false]) P(b[true,false]|a)`.
    #[must_use]
    pub fn contents(&self) -> String {
        (0..self.events.len())
            .map(|i| {
                let event = &self.events[i];
                let parents: Vec<&str> = event
                    .parents()
                    .iter()
                    .map(|&p| self.events[p].label())
                    .collect();
                if parents.is_empty() {
                    format!("P({})", event.to_full_string())
                } else {
                    format!("P({}|{})", event.to_full_string(), parents.join(","))
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for BayesianNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = (0..self.events.len()).map(|i| self.event_string(i)).collect();
        write!(f, "{}", parts.join(" "))
    }
}
