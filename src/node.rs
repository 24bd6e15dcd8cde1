//! Network nodes.
//!
//! Inference only needs four capabilities from a node, captured by the
//! [`BayesNode`] trait: its identifier, its kind, its discrete domain, and its
//! flat table over `self ∪ parents`. [`Node`] is the concrete node stored in a
//! [`BayesNetwork`][crate::network::BayesNetwork].

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::assignment::Assignment;
use crate::distribution::{CategoricalTable, ConditionalTable, UtilityTable};
use crate::error::Result;
use crate::value::Value;

/// The role of a node in a decision network.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum NodeKind {
    /// A random variable.
    Chance,
    /// A decision variable.
    Action,
    /// A utility function over its parents.
    Utility,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Chance => write!(f, "chance"),
            NodeKind::Action => write!(f, "action"),
            NodeKind::Utility => write!(f, "utility"),
        }
    }
}

/// What inference needs to know about a node.
pub trait BayesNode {
    fn id(&self) -> &str;

    fn kind(&self) -> NodeKind;

    /// Discrete domain of the node. Empty for utility nodes.
    fn values(&self) -> BTreeSet<Value>;

    /// Identifiers of the parent nodes.
    fn input_ids(&self) -> &BTreeSet<String>;

    /// Table over `self ∪ parents` (parents only for utility nodes).
    ///
    /// Chance and action nodes map to probabilities, utility nodes to utilities.
    fn flat_table(&self) -> Result<BTreeMap<Assignment, f64>>;
}

/// Probability distribution attached to a chance node.
#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    Categorical(CategoricalTable),
    Conditional(ConditionalTable),
}

impl Distribution {
    fn flat_table(&self) -> Result<BTreeMap<Assignment, f64>> {
        match self {
            Distribution::Categorical(t) => Ok(t.rows().clone()),
            Distribution::Conditional(t) => t.flat_table(),
        }
    }

    fn head_assignments(&self) -> Vec<Assignment> {
        match self {
            Distribution::Categorical(t) => t.values().cloned().collect(),
            Distribution::Conditional(t) => t
                .conditions()
                .filter_map(|c| t.posterior(c))
                .flat_map(|p| p.values().cloned())
                .collect(),
        }
    }

    fn condition_vars(&self) -> BTreeSet<String> {
        match self {
            Distribution::Categorical(_) => BTreeSet::new(),
            Distribution::Conditional(t) => t.condition_vars(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Content {
    Prob(Distribution),
    UniformAction,
    Utility(UtilityTable),
}

/// A concrete network node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: String,
    kind: NodeKind,
    values: BTreeSet<Value>,
    inputs: BTreeSet<String>,
    content: Content,
}

impl Node {
    fn from_distribution(id: String, kind: NodeKind, distrib: Distribution) -> Self {
        let values = distrib
            .head_assignments()
            .iter()
            .filter_map(|h| h.get(&id).cloned())
            .collect();
        let inputs = distrib.condition_vars();
        Self {
            id,
            kind,
            values,
            inputs,
            content: Content::Prob(distrib),
        }
    }

    /// Chance node with a prior distribution.
    pub fn chance(id: impl Into<String>, table: CategoricalTable) -> Self {
        Self::from_distribution(id.into(), NodeKind::Chance, Distribution::Categorical(table))
    }

    /// Chance node whose parents are the condition variables of `table`.
    pub fn conditional(id: impl Into<String>, table: ConditionalTable) -> Self {
        Self::from_distribution(id.into(), NodeKind::Chance, Distribution::Conditional(table))
    }

    /// Chance node with an arbitrary distribution.
    pub fn with_distribution(id: impl Into<String>, distrib: Distribution) -> Self {
        Self::from_distribution(id.into(), NodeKind::Chance, distrib)
    }

    /// Action node with a uniform prior over `values`.
    pub fn action<V: Into<Value>>(id: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Action,
            values: values.into_iter().map(Into::into).collect(),
            inputs: BTreeSet::new(),
            content: Content::UniformAction,
        }
    }

    /// Action node with an explicit prior.
    pub fn action_with_prior(id: impl Into<String>, prior: CategoricalTable) -> Self {
        Self::from_distribution(id.into(), NodeKind::Action, Distribution::Categorical(prior))
    }

    /// Utility node; its parents are the variables of the table rows.
    pub fn utility(id: impl Into<String>, table: UtilityTable) -> Self {
        let inputs = table
            .rows()
            .keys()
            .flat_map(|a| a.vars().map(str::to_string))
            .collect();
        Self {
            id: id.into(),
            kind: NodeKind::Utility,
            values: BTreeSet::new(),
            inputs,
            content: Content::Utility(table),
        }
    }

    /// Adds parents beyond those implied by the table.
    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(inputs.into_iter().map(Into::into));
        self
    }

    /// Probability distribution of a chance node (or action node with a prior).
    pub fn distribution(&self) -> Option<&Distribution> {
        match &self.content {
            Content::Prob(d) => Some(d),
            _ => None,
        }
    }

    pub fn utility_table(&self) -> Option<&UtilityTable> {
        match &self.content {
            Content::Utility(t) => Some(t),
            _ => None,
        }
    }
}

impl BayesNode for Node {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> NodeKind {
        self.kind
    }

    fn values(&self) -> BTreeSet<Value> {
        self.values.clone()
    }

    fn input_ids(&self) -> &BTreeSet<String> {
        &self.inputs
    }

    fn flat_table(&self) -> Result<BTreeMap<Assignment, f64>> {
        match &self.content {
            Content::Prob(d) => d.flat_table(),
            Content::UniformAction => {
                let p = 1.0 / self.values.len() as f64;
                Ok(self
                    .values
                    .iter()
                    .map(|v| (Assignment::single(self.id.clone(), v.clone()), p))
                    .collect())
            }
            Content::Utility(t) => Ok(t.rows().clone()),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.kind)?;
        if !self.inputs.is_empty() {
            let inputs: Vec<&str> = self.inputs.iter().map(String::as_str).collect();
            write!(f, " <- {}", inputs.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chance_node() {
        let n = Node::chance("x", CategoricalTable::over("x", [("t", 0.6), ("f", 0.4)]));
        assert_eq!(n.kind(), NodeKind::Chance);
        assert_eq!(n.values(), [Value::from("t"), Value::from("f")].into_iter().collect::<BTreeSet<Value>>());
        assert!(n.input_ids().is_empty());
        assert_eq!(n.flat_table().unwrap()[&Assignment::single("x", "t")], 0.6);
    }

    #[test]
    fn test_conditional_node_inputs() {
        let mut t = ConditionalTable::new();
        t.add_row(Assignment::single("x", "t"), Assignment::single("y", "t"), 0.9);
        t.add_row(Assignment::single("x", "t"), Assignment::single("y", "f"), 0.1);
        let n = Node::conditional("y", t);
        assert_eq!(n.input_ids().iter().collect::<Vec<_>>(), vec!["x"]);
        assert_eq!(n.values().len(), 2);
        assert_eq!(n.flat_table().unwrap()[&Assignment::new().with("x", "t").with("y", "f")], 0.1);
        assert_eq!(n.to_string(), "y (chance) <- x");
    }

    #[test]
    fn test_action_node_is_uniform() {
        let n = Node::action("a", ["hi", "lo"]);
        let table = n.flat_table().unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[&Assignment::single("a", "hi")], 0.5);
    }

    #[test]
    fn test_utility_node() {
        let mut u = UtilityTable::new();
        u.set_util(Assignment::new().with("c", 1).with("a", "hi"), 10.0);
        let n = Node::utility("u", u);
        assert_eq!(n.kind(), NodeKind::Utility);
        assert!(n.values().is_empty());
        assert_eq!(n.input_ids().len(), 2);
    }
}
