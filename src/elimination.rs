//! Exact inference by variable elimination.
//!
//! # Algorithm
//!
//! The driver walks the relevant nodes of the query **children before
//! parents**. Each node contributes one factor (see
//! [`make_factor`][crate::adapter::make_factor]); right after a hidden
//! variable's own factor is inserted, every factor mentioning that variable
//! is already in the pool, so the variable is summed out immediately:
//!
//! ```text
//! for node in reverse_topological(relevant):
//!     f = make_factor(node, evidence)
//!     if f is empty: skip
//!     pool += f
//!     if node is hidden:
//!         dependent = { g in pool | node in scope(g) }
//!         pool = pool - dependent + sum_out(node, product(dependent))
//! result = add_evidence_pairs(product(pool))
//! ```
//!
//! Intermediate factor sizes depend on the node order; the final result does
//! not.
//!
//! # Relevance
//!
//! Only the query and evidence variables and their ancestors can influence a
//! posterior (utility queries also keep every utility node and its
//! ancestors); all other nodes are skipped unless
//! [`VeConfig::prune_irrelevant`] is switched off.
//!
//! # Deadlines
//!
//! The deadline of a query (or [`VeConfig::default_timeout`]) is checked after
//! every pointwise product and every sum-out; once it has passed the query
//! fails with [`InferenceError::Timeout`].
//!
//! # Examples
//!
//! ```
//! use varelim_rs::assignment::Assignment;
//! use varelim_rs::distribution::{CategoricalTable, ConditionalTable};
//! use varelim_rs::elimination::{InferenceAlgorithm, VariableElimination};
//! use varelim_rs::network::BayesNetwork;
//! use varelim_rs::node::Node;
//! use varelim_rs::query::ProbQuery;
//!
//! let mut net = BayesNetwork::new();
//! net.add_node(Node::chance("x", CategoricalTable::over("x", [("t", 0.6), ("f", 0.4)]))).unwrap();
//! let mut y = ConditionalTable::new();
//! y.add_row(Assignment::single("x", "t"), Assignment::single("y", "t"), 0.9);
//! y.add_row(Assignment::single("x", "t"), Assignment::single("y", "f"), 0.1);
//! y.add_row(Assignment::single("x", "f"), Assignment::single("y", "t"), 0.2);
//! y.add_row(Assignment::single("x", "f"), Assignment::single("y", "f"), 0.8);
//! net.add_node(Node::conditional("y", y)).unwrap();
//!
//! let ve = VariableElimination::default();
//! let table = ve.query_prob(&ProbQuery::new(&net, ["y"], Assignment::new())).unwrap();
//! assert!((table.prob(&Assignment::single("y", "t")) - 0.62).abs() < 1e-9);
//! ```

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use log::debug;

use crate::adapter::make_factor;
use crate::distribution::{CategoricalTable, UtilityTable};
use crate::error::{InferenceError, Result};
use crate::factor::{try_product, Factor};
use crate::network::BayesNetwork;
use crate::node::{BayesNode, NodeKind};
use crate::query::{ProbQuery, Query, ReductionQuery, UtilQuery};
use crate::utils::combinations;

/// Configuration of the elimination engine.
///
/// ```
/// use std::time::Duration;
/// use varelim_rs::elimination::{VariableElimination, VeConfig};
///
/// let config = VeConfig::default().with_default_timeout(Duration::from_millis(200));
/// let ve = VariableElimination::new(config);
/// ```
#[derive(Debug, Clone)]
pub struct VeConfig {
    /// Timeout applied to queries that carry no deadline of their own (default: none).
    pub default_timeout: Option<Duration>,
    /// Skip nodes that cannot influence the query (default: true).
    pub prune_irrelevant: bool,
}

impl Default for VeConfig {
    fn default() -> Self {
        Self {
            default_timeout: None,
            prune_irrelevant: true,
        }
    }
}

impl VeConfig {
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn with_prune_irrelevant(mut self, prune: bool) -> Self {
        self.prune_irrelevant = prune;
        self
    }
}

/// An inference engine answering the three query shapes.
pub trait InferenceAlgorithm {
    /// Posterior distribution of the query variables given the evidence.
    fn query_prob(&self, query: &ProbQuery<'_>) -> Result<CategoricalTable>;

    /// Expected utility of each assignment of the query variables.
    fn query_util(&self, query: &UtilQuery<'_>) -> Result<UtilityTable>;

    /// Network over the query variables only, with marginalised distributions.
    fn reduce(&self, query: &ReductionQuery<'_>) -> Result<BayesNetwork>;
}

/// The variable elimination engine.
#[derive(Debug, Clone, Default)]
pub struct VariableElimination {
    config: VeConfig,
}

impl VariableElimination {
    pub fn new(config: VeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VeConfig {
        &self.config
    }

    pub(crate) fn deadline_of<Q: Query + ?Sized>(&self, query: &Q) -> Option<Instant> {
        query
            .deadline()
            .or_else(|| self.config.default_timeout.map(|t| Instant::now() + t))
    }

    /// Fails if a query variable is unknown or an observed value is outside
    /// the domain of its node.
    fn validate<Q: Query + ?Sized>(&self, query: &Q) -> Result<()> {
        let network = query.network();
        for var in query.query_vars() {
            network.get_node(var)?;
        }
        for (var, value) in query.evidence().pairs() {
            let Some(node) = network.node(var) else {
                debug!("evidence on unknown variable {} is ignored", var);
                continue;
            };
            if node.kind() == NodeKind::Utility {
                continue;
            }
            if !node.values().contains(value) {
                return Err(InferenceError::InconsistentEvidence(format!(
                    "{}={} is outside the domain of {}",
                    var, value, var
                )));
            }
        }
        Ok(())
    }

    /// Runs the elimination and returns the joint factor over the query variables.
    ///
    /// Probabilities in the result are not normalised.
    pub fn create_query_factor<Q: Query + ?Sized>(&self, query: &Q) -> Result<Factor> {
        self.query_factor_until(query, self.deadline_of(query))
    }

    /// [`create_query_factor`][Self::create_query_factor] against an already resolved deadline.
    pub(crate) fn query_factor_until<Q: Query + ?Sized>(
        &self,
        query: &Q,
        deadline: Option<Instant>,
    ) -> Result<Factor> {
        self.validate(query)?;
        let query_vars = query.query_vars();
        let evidence = query.evidence();

        let nodes = if self.config.prune_irrelevant {
            query.filtered_sorted_nodes()
        } else {
            query.network().sorted_nodes()
        };
        debug!(
            "create_query_factor(query = {:?}, evidence = {}) over {} nodes",
            query_vars,
            evidence,
            nodes.len()
        );

        let mut factors: Vec<Factor> = Vec::new();
        let mut inserted = 0usize;
        for node in nodes.iter().rev() {
            let factor = make_factor(*node, evidence)?;
            if factor.is_empty() {
                debug!("factor of {} is empty, skipping", node.id());
                continue;
            }
            inserted += 1;
            factors.push(factor);
            if !query_vars.contains(node.id()) {
                factors = sum_out(node.id(), factors, deadline)?;
            }
        }

        if inserted == 0 && !nodes.is_empty() {
            return Err(InferenceError::InconsistentEvidence(format!(
                "no node table agrees with evidence {}",
                evidence
            )));
        }

        let joint = try_product(factors, || check_deadline(deadline))?;
        debug!("final product has {} rows", joint.len());
        add_evidence_pairs(joint, query)
    }
}

impl InferenceAlgorithm for VariableElimination {
    fn query_prob(&self, query: &ProbQuery<'_>) -> Result<CategoricalTable> {
        let mut factor = self.create_query_factor(query)?;
        factor.normalise();
        Ok(CategoricalTable::from_rows(factor.prob_table()))
    }

    fn query_util(&self, query: &UtilQuery<'_>) -> Result<UtilityTable> {
        let mut factor = self.create_query_factor(query)?;
        factor.normalise();
        Ok(UtilityTable::from_rows(factor.util_table()))
    }

    fn reduce(&self, query: &ReductionQuery<'_>) -> Result<BayesNetwork> {
        self.reduce_network(query)
    }
}

pub(crate) fn check_deadline(deadline: Option<Instant>) -> Result<()> {
    match deadline {
        Some(d) if Instant::now() >= d => Err(InferenceError::Timeout),
        _ => Ok(()),
    }
}

/// Replaces the factors mentioning `var` by their product with `var` summed out.
///
/// Factors not mentioning `var` are kept as they are; if none mentions it, the
/// list is returned unchanged. An empty result is dropped.
pub(crate) fn sum_out(var: &str, factors: Vec<Factor>, deadline: Option<Instant>) -> Result<Vec<Factor>> {
    let (dependent, mut remaining): (Vec<Factor>, Vec<Factor>) =
        factors.into_iter().partition(|f| f.variables().contains(var));
    if dependent.is_empty() {
        return Ok(remaining);
    }

    let joint = try_product(dependent, || check_deadline(deadline))?;
    let summed = joint.sum_out(var);
    check_deadline(deadline)?;
    debug!("sum_out({}) -> factor over {:?} with {} rows", var, summed.variables(), summed.len());

    if !summed.is_empty() {
        remaining.push(summed);
    }
    Ok(remaining)
}

/// Re-introduces query variables that are also observed.
///
/// Evidence variables are absorbed into the node factors, so they are absent
/// from the joint factor. For each such query variable every value of its
/// domain is added back: rows agreeing with the evidence keep their mass,
/// all others get `(0, 0)`.
fn add_evidence_pairs<Q: Query + ?Sized>(factor: Factor, query: &Q) -> Result<Factor> {
    let evidence = query.evidence();
    let mut domains = BTreeMap::new();
    for var in query.query_vars() {
        if evidence.contains_var(var) {
            domains.insert(var.clone(), query.network().get_node(var)?.values());
        }
    }
    if domains.is_empty() {
        return Ok(factor);
    }

    let extensions = combinations(&domains);
    let mut result = Factor::new();
    for (row, entry) in factor.rows() {
        for ext in &extensions {
            let assign = row.extend(ext)?;
            if evidence.contains(ext) {
                result.add(assign, entry.prob, entry.util)?;
            } else {
                result.add(assign, 0.0, 0.0)?;
            }
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    use crate::assignment::Assignment;
    use crate::distribution::{ConditionalTable, UtilityTable};
    use crate::node::Node;

    const EPS: f64 = 1e-9;

    fn chain() -> BayesNetwork {
        let mut net = BayesNetwork::new();
        net.add_node(Node::chance("x", CategoricalTable::over("x", [("t", 0.6), ("f", 0.4)])))
            .unwrap();
        let mut y = ConditionalTable::new();
        y.add_row(Assignment::single("x", "t"), Assignment::single("y", "t"), 0.9);
        y.add_row(Assignment::single("x", "t"), Assignment::single("y", "f"), 0.1);
        y.add_row(Assignment::single("x", "f"), Assignment::single("y", "t"), 0.2);
        y.add_row(Assignment::single("x", "f"), Assignment::single("y", "f"), 0.8);
        net.add_node(Node::conditional("y", y)).unwrap();
        net
    }

    #[test]
    fn test_query_factor_is_unnormalised_joint() {
        let net = chain();
        let ve = VariableElimination::default();
        let q = ProbQuery::new(&net, ["x"], Assignment::single("y", "t"));
        let f = ve.create_query_factor(&q).unwrap();
        assert!((f.prob(&Assignment::single("x", "t")) - 0.54).abs() < EPS);
        assert!((f.prob(&Assignment::single("x", "f")) - 0.08).abs() < EPS);
    }

    #[test]
    fn test_sum_out_leaves_unrelated_factors() {
        let mut f = Factor::new();
        f.add(Assignment::single("x", "t"), 1.0, 0.0).unwrap();
        let mut g = Factor::new();
        g.add(Assignment::single("y", "t"), 0.5, 0.0).unwrap();
        let out = sum_out("z", vec![f.clone(), g.clone()], None).unwrap();
        assert_eq!(out, vec![f.clone(), g.clone()]);

        let out = sum_out("y", vec![f.clone(), g], None).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], f);
        assert!(out[1].variables().is_empty());
    }

    #[test]
    fn test_missing_query_variable() {
        let net = chain();
        let ve = VariableElimination::default();
        let err = ve.query_prob(&ProbQuery::new(&net, ["nope"], Assignment::new()));
        assert_eq!(err, Err(InferenceError::MissingVariable("nope".to_string())));
    }

    #[test]
    fn test_evidence_outside_domain() {
        let net = chain();
        let ve = VariableElimination::default();
        let q = ProbQuery::new(&net, ["x"], Assignment::single("y", "impossible"));
        assert!(matches!(ve.query_prob(&q), Err(InferenceError::InconsistentEvidence(_))));
    }

    #[test]
    fn test_evidence_on_unknown_variable_is_ignored() {
        let net = chain();
        let ve = VariableElimination::default();
        let q = ProbQuery::new(&net, ["y"], Assignment::single("weather", "rain"));
        let t = ve.query_prob(&q).unwrap();
        assert!((t.prob(&Assignment::single("y", "t")) - 0.62).abs() < EPS);
    }

    #[test]
    fn test_expired_deadline() {
        let net = chain();
        let ve = VariableElimination::default();
        let q = ProbQuery::new(&net, ["y"], Assignment::new()).with_deadline(Instant::now());
        assert_eq!(ve.query_prob(&q), Err(InferenceError::Timeout));
    }

    #[test]
    fn test_generous_default_timeout() {
        let net = chain();
        let ve = VariableElimination::new(VeConfig::default().with_default_timeout(Duration::from_secs(60)));
        let t = ve.query_prob(&ProbQuery::new(&net, ["y"], Assignment::new())).unwrap();
        assert!(t.is_well_formed());
    }

    #[test]
    fn test_pruning_does_not_change_results() {
        let mut net = chain();
        let mut u = UtilityTable::new();
        u.set_util(Assignment::single("y", "t"), 3.0);
        u.set_util(Assignment::single("y", "f"), -1.0);
        net.add_node(Node::utility("u", u)).unwrap();

        let pruned = VariableElimination::default();
        let full = VariableElimination::new(VeConfig::default().with_prune_irrelevant(false));
        let q = ProbQuery::new(&net, ["x"], Assignment::new());
        let a = pruned.query_prob(&q).unwrap();
        let b = full.query_prob(&q).unwrap();
        for (head, p) in a.rows() {
            assert!((p - b.prob(head)).abs() < EPS);
        }
    }

    #[test]
    fn test_utility_of_chance_outcome() {
        let mut net = chain();
        let mut u = UtilityTable::new();
        u.set_util(Assignment::single("y", "t"), 3.0);
        u.set_util(Assignment::single("y", "f"), -1.0);
        net.add_node(Node::utility("u", u)).unwrap();

        let ve = VariableElimination::default();
        let t = ve.query_util(&UtilQuery::new(&net, ["x"], Assignment::new())).unwrap();
        // x=t: 0.9*3 + 0.1*(-1) = 2.6 ; x=f: 0.2*3 + 0.8*(-1) = -0.2
        assert!((t.util(&Assignment::single("x", "t")).unwrap() - 2.6).abs() < EPS);
        assert!((t.util(&Assignment::single("x", "f")).unwrap() + 0.2).abs() < EPS);
    }
}
