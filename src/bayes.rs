//! Discrete Bayesian networks and K2 structure learning.
//!
//! # Example
//!
//! ```
//! use stackgp::bayes::{BayesianNetwork, TrainBayesian};
//! use stackgp::fitness::BasicDataSet;
//!
//! let mut net = BayesianNetwork::new();
//! let a = net.create_boolean_event("a").unwrap();
//! let class = net.create_boolean_event("class").unwrap();
//! net.set_classification_target(class).unwrap();
//!
//! let mut data = BasicDataSet::new();
//! for i in 0..10 {
//!     let v = f64::from(i % 2);
//!     data.add(vec![v, v], vec![]);
//! }
//! let mut train = TrainBayesian::new(net, &data, 1).unwrap();
//! assert_eq!(train.train().unwrap(), 0.0);
//! assert!(train.network().has_dependency(class, a));
//! ```

mod estimator;
mod event;
mod k2;
mod network;
mod table;
mod train;

pub use estimator::SimpleEstimator;
pub use event::{BayesianChoice, BayesianEvent};
pub use k2::SearchK2;
pub use network::BayesianNetwork;
pub use table::BayesianTable;
pub use train::{BayesianInit, TrainBayesian, TrainingPhase};
