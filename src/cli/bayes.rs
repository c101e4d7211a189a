//! CLI command for learning a Bayesian network from discrete data.

#![allow(clippy::needless_pass_by_value)]

use crate::cli::{CliError, InitStructure, load_data};
use log::info;
use stackgp::bayes::{BayesianChoice, BayesianEvent, BayesianNetwork, SimpleEstimator, TrainBayesian};
use stackgp::fitness::{BasicDataSet, TrainingData};
use stackgp::persistence::save_network;
use std::path::PathBuf;

/// Execute the bayes command.
pub(crate) fn execute(
    data: PathBuf,
    labels: Vec<String>,
    target: Option<String>,
    max_parents: usize,
    init: InitStructure,
    alpha: f64,
    save: Option<PathBuf>,
) -> Result<(), CliError> {
    let data = load_data(&data)?;
    let mut network = build_network(&data, &labels)?;
    if let Some(label) = &target {
        let index = network.require_event(label)?;
        network.set_classification_target(index)?;
    }
    info!("network: {}", network.contents());

    let mut train = TrainBayesian::new(network, &data, max_parents)?
        .with_init(init.into())
        .with_estimator(SimpleEstimator::new(alpha));
    let error = train.train()?;
    let network = train.into_network();

    println!("Structure: {network}");
    println!("Parameters: {}", network.calculate_parameter_count());
    if target.is_some() {
        println!("Classification error: {error:.4}");
    }

    if let Some(path) = &save {
        save_network(&network, path)?;
        info!("saved network to {}", path.display());
    }
    Ok(())
}

/// One event per input column, with one index choice per observed value.
fn build_network(data: &BasicDataSet, labels: &[String]) -> Result<BayesianNetwork, CliError> {
    let width = data.input_size();
    if !labels.is_empty() && labels.len() != width {
        return Err(CliError::new(format!(
            "{} labels given but the data has {width} inputs",
            labels.len()
        )));
    }
    let mut counts = vec![1usize; width];
    for pair in data.pairs() {
        for (count, &value) in counts.iter_mut().zip(&pair.input) {
            if !(value.is_finite() && value >= 0.0 && value.fract() == 0.0) {
                return Err(CliError::new(format!(
                    "input {value} is not a non-negative integer class"
                )));
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let class = value as usize;
            *count = (*count).max(class + 1);
        }
    }

    let mut network = BayesianNetwork::new();
    for (i, &count) in counts.iter().enumerate() {
        let label = labels.get(i).cloned().unwrap_or_else(|| format!("e{i}"));
        let choices = (0..count).map(|c| BayesianChoice::index(c.to_string(), c)).collect();
        network.create_event(BayesianEvent::new(label, choices)?)?;
    }
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choices_from_observed_values() {
        let mut data = BasicDataSet::new();
        data.add(vec![0.0, 2.0], vec![]);
        data.add(vec![1.0, 0.0], vec![]);
        let net = build_network(&data, &[]).unwrap();
        assert_eq!(net.event(0).unwrap().choice_count(), 2);
        assert_eq!(net.event(1).unwrap().choice_count(), 3);
        assert_eq!(net.event(1).unwrap().label(), "e1");
    }

    #[test]
    fn test_rejects_fractional_inputs() {
        let mut data = BasicDataSet::new();
        data.add(vec![0.5], vec![]);
        assert!(build_network(&data, &[]).is_err());
        data = BasicDataSet::new();
        data.add(vec![1.0], vec![]);
        assert!(build_network(&data, &["a".into(), "b".into()]).is_err());
    }
}
