//! Network reduction.
//!
//! A reduction keeps a subset of the variables and gives each of them a
//! distribution conditioned on its retained ancestors, computed from the joint
//! factor of the retained variables:
//!
//! 1. build the joint factor `F` over the retained variables;
//! 2. for each retained `v` (ancestors first), sum out of `F` every variable
//!    other than `v` and its retained ancestors;
//! 3. normalise the result (conditionally on the ancestors, if any) and attach
//!    it to a new chance node.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use log::debug;

use crate::distribution::{CategoricalTable, ConditionalTable};
use crate::elimination::{check_deadline, VariableElimination};
use crate::error::{InferenceError, Result};
use crate::factor::Factor;
use crate::network::BayesNetwork;
use crate::node::{BayesNode, Distribution, Node};
use crate::query::{Query, ReductionQuery};
use crate::value::Value;

impl VariableElimination {
    pub(crate) fn reduce_network(&self, query: &ReductionQuery<'_>) -> Result<BayesNetwork> {
        let deadline = self.deadline_of(query);
        let joint = self.query_factor_until(query, deadline)?;
        let retained = query.query_vars();

        let mut network = BayesNetwork::new();
        for var in query.sorted_query_vars() {
            check_deadline(deadline)?;
            let inputs = query.input_nodes(&var);
            if let Some(missing) = inputs.iter().find(|i| !retained.contains(*i)) {
                return Err(InferenceError::MissingVariable(format!(
                    "{} (retained ancestor of {} is not retained)",
                    missing, var
                )));
            }

            let domains: BTreeMap<String, BTreeSet<Value>> = inputs
                .iter()
                .filter_map(|i| query.network().node(i).map(|n| (i.clone(), n.values())))
                .collect();
            let factor = relevant_factor(&joint, &var, &inputs, deadline)?;
            let distrib = prob_distribution(factor, &var, &domains);
            debug!("reduce: {} given {:?}", var, inputs);
            network.add_node(Node::with_distribution(var, distrib).with_inputs(inputs))?;
        }
        Ok(network)
    }
}

/// Sums out of `joint` every variable other than `head` and `inputs`.
///
/// Fails with [`InferenceError::Timeout`] once `deadline` has passed.
pub fn relevant_factor(
    joint: &Factor,
    head: &str,
    inputs: &BTreeSet<String>,
    deadline: Option<Instant>,
) -> Result<Factor> {
    let surplus: Vec<String> = joint
        .variables()
        .iter()
        .filter(|v| v.as_str() != head && !inputs.contains(*v))
        .cloned()
        .collect();
    let mut factor = joint.clone();
    for var in surplus {
        factor = factor.sum_out(&var);
        check_deadline(deadline)?;
    }
    Ok(factor)
}

/// Normalised distribution of `var` described by `factor`.
///
/// A factor over `var` alone gives a categorical table; otherwise the other
/// variables become conditions. Conditions without any row get a uniform
/// distribution; `cond_domains` lists values of condition variables that may
/// be absent from the factor.
pub fn prob_distribution(
    mut factor: Factor,
    var: &str,
    cond_domains: &BTreeMap<String, BTreeSet<Value>>,
) -> Distribution {
    if factor.variables().len() <= 1 {
        factor.normalise();
        return Distribution::Categorical(CategoricalTable::from_rows(factor.prob_table()));
    }

    let cond_vars: BTreeSet<String> = factor
        .variables()
        .iter()
        .filter(|v| v.as_str() != var)
        .cloned()
        .collect();
    factor.normalise_on(&cond_vars);

    let mut table = ConditionalTable::new();
    for (assign, entry) in factor.rows() {
        let condition = assign.trim(&cond_vars);
        let head = assign.trim_inverse(&cond_vars);
        table.add_row(condition, head, entry.prob);
    }
    table.fill_conditional_holes_with(cond_domains);
    Distribution::Conditional(table)
}
