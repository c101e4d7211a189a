//! In-memory training data.

use crate::error::{EaError, EaResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One training case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPair {
    /// Input values, one per program variable.
    pub input: Vec<f64>,
    /// Expected outputs.
    pub ideal: Vec<f64>,
}

/// A source of input/ideal pairs.
pub trait TrainingData: Send + Sync + fmt::Debug {
    /// Number of pairs.
    fn count(&self) -> usize;

    /// Values per input.
    fn input_size(&self) -> usize;

    /// Values per ideal output.
    fn ideal_size(&self) -> usize;

    /// Iterate over every pair in order.
    fn pairs(&self) -> Box<dyn Iterator<Item = &DataPair> + '_>;

    /// False if the source cannot be read from several threads at once.
    fn is_thread_safe(&self) -> bool {
        true
    }
}

/// Training pairs held in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BasicDataSet {
    pairs: Vec<DataPair>,
}

impl BasicDataSet {
    /// Create an empty data set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a data set, checking every pair has the same widths.
    ///
    /// # Errors
    ///
    /// Returns [`EaError::Configuration`] on a width mismatch.
    pub fn from_pairs(pairs: Vec<DataPair>) -> EaResult<Self> {
        let set = Self { pairs };
        set.validate()?;
        Ok(set)
    }

    /// Append a pair.
    pub fn add(&mut self, input: Vec<f64>, ideal: Vec<f64>) {
        self.pairs.push(DataPair { input, ideal });
    }

    /// Number of pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True if there are no pairs.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Check every pair has the widths of the first.
    ///
    /// # Errors
    ///
    /// Returns [`EaError::Configuration`] naming the first bad pair.
    pub fn validate(&self) -> EaResult<()> {
        let (inputs, ideals) = (self.input_size(), self.ideal_size());
        for (i, pair) in self.pairs.iter().enumerate() {
            if pair.input.len() != inputs || pair.ideal.len() != ideals {
                return Err(EaError::Configuration(format!(
                    "pair {i} has {}/{} values, expected {inputs}/{ideals}",
                    pair.input.len(),
                    pair.ideal.len()
                )));
            }
        }
        Ok(())
    }
}

impl TrainingData for BasicDataSet {
    fn count(&self) -> usize {
        self.pairs.len()
    }

    fn input_size(&self) -> usize {
        self.pairs.first().map_or(0, |p| p.input.len())
    }

    fn ideal_size(&self) -> usize {
        self.pairs.first().map_or(0, |p| p.ideal.len())
    }

    fn pairs(&self) -> Box<dyn Iterator<Item = &DataPair> + '_> {
        Box::new(self.pairs.iter())
    }
}
