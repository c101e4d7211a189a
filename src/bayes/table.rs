//! Conditional probability tables.

// Choice counts become divisors
#![allow(clippy::cast_precision_loss)]

use crate::error::{BayesError, BayesResult};
use serde::{Deserialize, Serialize};

/// Rows sum to one within this tolerance.
const ROW_TOLERANCE: f64 = 1e-6;

/// `P(event = choice | parents = instance)` for every parent instance.
///
/// Rows are indexed by the parent instance in mixed radix, first parent
/// least significant; each row holds one probability per choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayesianTable {
    choices: usize,
    parent_choices: Vec<usize>,
    probabilities: Vec<f64>,
}

impl BayesianTable {
    /// A uniform table for an event with `choices` values whose parents
    /// have `parent_choices` values each.
    #[must_use]
    pub fn uniform(choices: usize, parent_choices: Vec<usize>) -> Self {
        let rows: usize = parent_choices.iter().product();
        let p = if choices == 0 { 0.0 } else { 1.0 / choices as f64 };
        Self {
            choices,
            parent_choices,
            probabilities: vec![p; rows * choices],
        }
    }

    /// Number of choices of the owning event.
    #[must_use]
    pub fn choices(&self) -> usize {
        self.choices
    }

    /// Choice counts of the parents, in parent order.
    #[must_use]
    pub fn parent_choices(&self) -> &[usize] {
        &self.parent_choices
    }

    /// Number of parent instances.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.parent_choices.iter().product()
    }

    /// Row index for a parent instance.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::InvalidTable`] if the instance does not fit.
    pub fn row(&self, instance: &[usize]) -> BayesResult<usize> {
        if instance.len() != self.parent_choices.len() {
            return Err(BayesError::InvalidTable(format!(
                "{} parent values for {} parents",
                instance.len(),
                self.parent_choices.len()
            )));
        }
        let mut row = 0;
        let mut scale = 1;
        for (&value, &radix) in instance.iter().zip(&self.parent_choices) {
            if value >= radix {
                return Err(BayesError::InvalidTable(format!(
                    "parent value {value} outside {radix} choices"
                )));
            }
            row += value * scale;
            scale *= radix;
        }
        Ok(row)
    }

    /// `P(choice | instance)`.
    ///
    /// # Errors
    ///
    /// Fails if the instance or choice does not fit the table.
    pub fn probability(&self, instance: &[usize], choice: usize) -> BayesResult<f64> {
        let index = self.cell(instance, choice)?;
        Ok(self.probabilities[index])
    }

    /// Set `P(choice | instance)`.
    ///
    /// # Errors
    ///
    /// Fails if the instance or choice does not fit the table, or `p` is
    /// outside `[0, 1]`.
    pub fn set_probability(&mut self, instance: &[usize], choice: usize, p: f64) -> BayesResult<()> {
        if !(0.0..=1.0).contains(&p) {
            return Err(BayesError::InvalidTable(format!("probability {p} outside [0, 1]")));
        }
        let index = self.cell(instance, choice)?;
        self.probabilities[index] = p;
        Ok(())
    }

    /// Overwrite a whole row.
    pub(crate) fn set_row(&mut self, row: usize, values: &[f64]) {
        let start = row * self.choices;
        self.probabilities[start..start + self.choices].copy_from_slice(values);
    }

    /// Check every row sums to one.
    ///
    /// # Errors
    ///
    /// Returns [`BayesError::InvalidTable`] naming the first bad row.
    pub fn validate(&self) -> BayesResult<()> {
        if self.choices == 0 {
            return Ok(());
        }
        for (row, values) in self.probabilities.chunks(self.choices).enumerate() {
            let sum: f64 = values.iter().sum();
            if (sum - 1.0).abs() > ROW_TOLERANCE {
                return Err(BayesError::InvalidTable(format!("row {row} sums to {sum}")));
            }
        }
        Ok(())
    }

    fn cell(&self, instance: &[usize], choice: usize) -> BayesResult<usize> {
        if choice >= self.choices {
            return Err(BayesError::InvalidTable(format!(
                "choice {choice} outside {} choices",
                self.choices
            )));
        }
        Ok(self.row(instance)? * self.choices + choice)
    }
}

/// Advance a mixed-radix counter, first digit least significant.
///
/// Returns false once every combination has been visited, leaving the
/// counter at all zeros.
pub(crate) fn roll(instance: &mut [usize], radices: &[usize]) -> bool {
    for (value, &radix) in instance.iter_mut().zip(radices) {
        *value += 1;
        if *value < radix {
            return true;
        }
        *value = 0;
    }
    false
}
