//! Discrete events and their choices.

// Input values are cast to choice indices
#![allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use super::table::BayesianTable;
use crate::error::{BayesError, BayesResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One value an event can take.
///
/// An index choice has `min == max == index` and matches that exact input;
/// a range choice matches inputs below `max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianChoice {
    /// Display label.
    pub label: String,
    /// Lower bound of the range.
    pub min: f64,
    /// Upper bound of the range.
    pub max: f64,
}

impl BayesianChoice {
    /// A choice matched by its position.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn index(label: impl Into<String>, index: usize) -> Self {
        Self {
            label: label.into(),
            min: index as f64,
            max: index as f64,
        }
    }

    /// A choice matched by value range.
    #[must_use]
    pub fn range(label: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            label: label.into(),
            min,
            max,
        }
    }

    /// True for a choice matched by position.
    #[must_use]
    pub fn is_index(&self) -> bool {
        self.min == self.max
    }
}

impl fmt::Display for BayesianChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_index() {
            write!(f, "{}", self.label)
        } else {
            write!(f, "{}:{}-{}", self.label, self.min, self.max)
        }
    }
}

/// A discrete random variable in a [`super::BayesianNetwork`].
///
/// Parents and children are indices into the owning network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianEvent {
    label: String,
    choices: Vec<BayesianChoice>,
    parents: Vec<usize>,
    children: Vec<usize>,
    #[serde(default)]
    table: Option<BayesianTable>,
}

impl BayesianEvent {
    /// Create an event. Range choices are ordered by their upper bound.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::NoChoices`] if `choices` is empty.
    pub fn new(label: impl Into<String>, mut choices: Vec<BayesianChoice>) -> BayesResult<Self> {
        let label = label.into();
        if choices.is_empty() {
            return Err(BayesError::NoChoices(label));
        }
        if !choices.iter().all(BayesianChoice::is_index) {
            choices.sort_by(|a, b| a.max.total_cmp(&b.max));
        }
        Ok(Self {
            label,
            choices,
            parents: Vec::new(),
            children: Vec::new(),
            table: None,
        })
    }

    /// Create an event whose choices are matched by position.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::NoChoices`] if `labels` is empty.
    pub fn with_labels(label: impl Into<String>, labels: &[&str]) -> BayesResult<Self> {
        let choices = labels
            .iter()
            .enumerate()
            .map(|(i, l)| BayesianChoice::index(*l, i))
            .collect();
        Self::new(label, choices)
    }

    /// A `true`/`false` event.
    #[must_use]
    pub fn boolean(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            choices: vec![BayesianChoice::index("true", 0), BayesianChoice::index("false", 1)],
            parents: Vec::new(),
            children: Vec::new(),
            table: None,
        }
    }

    /// Event label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The choices, in matching order.
    #[must_use]
    pub fn choices(&self) -> &[BayesianChoice] {
        &self.choices
    }

    /// Number of choices.
    #[must_use]
    pub fn choice_count(&self) -> usize {
        self.choices.len()
    }

    /// Parent event indices, in the order they were added.
    #[must_use]
    pub fn parents(&self) -> &[usize] {
        &self.parents
    }

    /// Child event indices.
    #[must_use]
    pub fn children(&self) -> &[usize] {
        &self.children
    }

    /// True if the event has at least one parent.
    #[must_use]
    pub fn has_parents(&self) -> bool {
        !self.parents.is_empty()
    }

    /// True for a two-choice event.
    #[must_use]
    pub fn is_boolean(&self) -> bool {
        self.choices.len() == 2
    }

    /// The probability table, once the structure has been finalized.
    #[must_use]
    pub fn table(&self) -> Option<&BayesianTable> {
        self.table.as_ref()
    }

    pub(crate) fn table_mut(&mut self) -> Option<&mut BayesianTable> {
        self.table.as_mut()
    }

    pub(crate) fn set_table(&mut self, table: BayesianTable) {
        self.table = Some(table);
    }

    pub(crate) fn add_parent(&mut self, parent: usize) {
        self.parents.push(parent);
        self.table = None;
    }

    pub(crate) fn add_child(&mut self, child: usize) {
        self.children.push(child);
    }

    pub(crate) fn remove_all_relations(&mut self) {
        self.parents.clear();
        self.children.clear();
        self.table = None;
    }

    /// Map an input value to a choice index.
    ///
    /// Index choices take the value as the index. Range choices return the
    /// first choice whose `max` exceeds the value, or the last choice.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::InvalidChoice`] if an index choice is out of range.
    pub fn match_choice_to_range(&self, value: f64) -> BayesResult<usize> {
        if self.choices.first().is_some_and(BayesianChoice::is_index) {
            if !(value >= 0.0 && (value as usize) < self.choices.len()) {
                return Err(BayesError::InvalidChoice {
                    event: self.label.clone(),
                    value,
                });
            }
            return Ok(value as usize);
        }
        Ok(self
            .choices
            .iter()
            .position(|c| value < c.max)
            .unwrap_or(self.choices.len().saturating_sub(1)))
    }

    /// Render as `label[choice,choice]`.
    #[must_use]
    pub fn to_full_string(&self) -> String {
        let choices: Vec<String> = self.choices.iter().map(ToString::to_string).collect();
        format!("{}[{}]", self.label, choices.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_choices() {
        let e = BayesianEvent::with_labels("color", &["red", "green", "blue"]).unwrap();
        assert_eq!(e.match_choice_to_range(2.0).unwrap(), 2);
        assert_eq!(e.match_choice_to_range(0.7).unwrap(), 0);
        assert!(matches!(
            e.match_choice_to_range(3.0),
            Err(BayesError::InvalidChoice { .. })
        ));
        assert!(e.match_choice_to_range(-1.0).is_err());
        assert_eq!(e.to_full_string(), "color[red,green,blue]");
    }

    #[test]
    fn test_range_choices() {
        let e = BayesianEvent::new(
            "temp",
            vec![
                BayesianChoice::range("hot", 20.0, 40.0),
                BayesianChoice::range("cold", -10.0, 5.0),
                BayesianChoice::range("mild", 5.0, 20.0),
            ],
        )
        .unwrap();
        assert_eq!(e.choices()[0].label, "cold");
        assert_eq!(e.match_choice_to_range(-3.0).unwrap(), 0);
        assert_eq!(e.match_choice_to_range(10.0).unwrap(), 1);
        assert_eq!(e.match_choice_to_range(25.0).unwrap(), 2);
        // past every max: last choice
        assert_eq!(e.match_choice_to_range(99.0).unwrap(), 2);
    }

    #[test]
    fn test_no_choices() {
        assert_eq!(
            BayesianEvent::new("x", Vec::new()).unwrap_err(),
            BayesError::NoChoices("x".into())
        );
        assert!(BayesianEvent::boolean("rain").is_boolean());
    }
}
