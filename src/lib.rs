//! # varelim-rs: Exact Inference for Decision Networks
//!
//! **`varelim-rs`** is an exact **variable elimination** engine for decision-theoretic
//! Bayesian networks, i.e. networks mixing chance nodes, action nodes and utility nodes.
//!
//! ## What does it compute?
//!
//! Given a network, an evidence assignment and a set of query variables, the engine computes:
//!
//! - the **posterior distribution** of the query variables ([`query_prob`][crate::elimination::InferenceAlgorithm::query_prob]);
//! - the **expected utility** of every combination of action variables ([`query_util`][crate::elimination::InferenceAlgorithm::query_util]);
//! - a **reduced network** that keeps only the query variables, each with a distribution
//!   conditioned on its retained ancestors ([`reduce`][crate::elimination::InferenceAlgorithm::reduce]).
//!
//! ## Key Features
//!
//! - **Dual-channel factors**: every [`Factor`][crate::factor::Factor] row carries a probability
//!   and an expected utility, so the same elimination pass answers probability and utility queries.
//! - **Evidence absorption**: observed variables never enter a factor's scope.
//! - **Relevance pruning**: nodes that are not ancestors of the query or the evidence are skipped.
//! - **Deadlines**: queries can carry a deadline checked at every factor operation.
//!
//! ## Basic Usage
//!
//! ```rust
//! use varelim_rs::assignment::Assignment;
//! use varelim_rs::distribution::{CategoricalTable, UtilityTable};
//! use varelim_rs::elimination::{InferenceAlgorithm, VariableElimination};
//! use varelim_rs::network::BayesNetwork;
//! use varelim_rs::node::Node;
//! use varelim_rs::query::UtilQuery;
//!
//! // 1. Build a decision network: chance C, action A, utility U(C, A)
//! let mut net = BayesNetwork::new();
//! net.add_node(Node::chance("c", CategoricalTable::over("c", [(1, 0.7), (2, 0.3)]))).unwrap();
//! net.add_node(Node::action("a", ["hi", "lo"])).unwrap();
//! let mut u = UtilityTable::new();
//! u.set_util(Assignment::new().with("c", 1).with("a", "hi"), 10.0);
//! u.set_util(Assignment::new().with("c", 1).with("a", "lo"), 2.0);
//! u.set_util(Assignment::new().with("c", 2).with("a", "hi"), -5.0);
//! u.set_util(Assignment::new().with("c", 2).with("a", "lo"), 3.0);
//! net.add_node(Node::utility("u", u)).unwrap();
//!
//! // 2. Ask for the expected utility of each action
//! let ve = VariableElimination::default();
//! let table = ve.query_util(&UtilQuery::new(&net, ["a"], Assignment::new())).unwrap();
//!
//! // 3. E[U | a=hi] = 0.7 * 10 + 0.3 * (-5) = 5.5
//! let (best, util) = table.best().unwrap();
//! assert_eq!(best, &Assignment::single("a", "hi"));
//! assert!((util - 5.5).abs() < 1e-9);
//! ```
//!
//! ## Core Components
//!
//! - **[`assignment`]**: variable-to-value maps, the keys of every table.
//! - **[`factor`]**: the factor algebra (pointwise product, sum-out, normalisation).
//! - **[`elimination`]**: the elimination driver and the [`InferenceAlgorithm`][crate::elimination::InferenceAlgorithm] trait.
//! - **[`reduce`]**: network reduction.
//! - **[`dot`]**: Graphviz export of networks.
//!
//! The engine logs through the [`log`](https://docs.rs/log) facade and never installs a logger.

pub mod adapter;
pub mod assignment;
pub mod distribution;
pub mod dot;
pub mod elimination;
pub mod error;
pub mod factor;
pub mod network;
pub mod node;
pub mod query;
pub mod reduce;
pub mod utils;
pub mod value;
