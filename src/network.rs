//! Bayesian networks.
//!
//! Nodes must be added parents-first: [`BayesNetwork::add_node`] refuses a node
//! whose parents are not yet in the network. Insertion order is therefore
//! always a topological order, and the network can never contain a cycle.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::debug;

use crate::error::{InferenceError, Result};
use crate::node::{BayesNode, Node, NodeKind};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BayesNetwork {
    nodes: BTreeMap<String, Node>,
    /// Insertion order, which is topological.
    order: Vec<String>,
}

impl BayesNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node whose parents are all already present.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.nodes.contains_key(node.id()) {
            return Err(InferenceError::InternalInvariant(format!(
                "node {} already in the network",
                node.id()
            )));
        }
        if let Some(missing) = node.input_ids().iter().find(|p| !self.nodes.contains_key(*p)) {
            return Err(InferenceError::MissingVariable(missing.clone()));
        }
        debug!("add_node({})", node);
        self.order.push(node.id().to_string());
        self.nodes.insert(node.id().to_string(), node);
        Ok(())
    }

    /// Builder-style version of [`add_node`][Self::add_node].
    pub fn with_node(mut self, node: Node) -> Result<Self> {
        self.add_node(node)?;
        Ok(self)
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Looks up a node, failing with `MissingVariable` when absent.
    pub fn get_node(&self, id: &str) -> Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| InferenceError::MissingVariable(id.to_string()))
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Node identifiers in insertion (topological) order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Identifiers of all nodes of the given kind.
    pub fn ids_of_kind(&self, kind: NodeKind) -> BTreeSet<String> {
        self.nodes
            .values()
            .filter(|n| n.kind() == kind)
            .map(|n| n.id().to_string())
            .collect()
    }

    /// Identifiers of the direct children of `id`.
    pub fn output_ids(&self, id: &str) -> BTreeSet<String> {
        self.nodes
            .values()
            .filter(|n| n.input_ids().contains(id))
            .map(|n| n.id().to_string())
            .collect()
    }

    /// Strict ancestors of `id`.
    pub fn ancestors(&self, id: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<&str> = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            for parent in node.input_ids() {
                if seen.insert(parent.clone()) {
                    stack.push(parent);
                }
            }
        }
        seen
    }

    /// Strict descendants of `id`.
    pub fn descendants(&self, id: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            for child in self.output_ids(&current) {
                if seen.insert(child.clone()) {
                    stack.push(child);
                }
            }
        }
        seen
    }

    /// The given nodes together with all their ancestors.
    ///
    /// Identifiers unknown to the network are skipped.
    pub fn ancestral_closure<I, S>(&self, ids: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut closure = BTreeSet::new();
        for id in ids {
            let id = id.as_ref();
            if self.nodes.contains_key(id) {
                closure.insert(id.to_string());
                closure.extend(self.ancestors(id));
            }
        }
        closure
    }

    /// All nodes, parents before children.
    pub fn sorted_nodes(&self) -> Vec<&Node> {
        self.order.iter().filter_map(|id| self.nodes.get(id)).collect()
    }

    /// Nodes of `relevant`, parents before children.
    pub fn filtered_sorted_nodes(&self, relevant: &BTreeSet<String>) -> Vec<&Node> {
        self.order
            .iter()
            .filter(|id| relevant.contains(*id))
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }
}

impl fmt::Display for BayesNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in self.sorted_nodes() {
            writeln!(f, "{}", node)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::assignment::Assignment;
    use crate::distribution::{CategoricalTable, ConditionalTable};

    fn chain(ids: &[&str]) -> BayesNetwork {
        let mut net = BayesNetwork::new();
        net.add_node(Node::chance(ids[0], CategoricalTable::over(ids[0], [("t", 0.5), ("f", 0.5)])))
            .unwrap();
        for w in ids.windows(2) {
            let mut t = ConditionalTable::new();
            for parent in ["t", "f"] {
                t.add_row(Assignment::single(w[0], parent), Assignment::single(w[1], "t"), 0.5);
                t.add_row(Assignment::single(w[0], parent), Assignment::single(w[1], "f"), 0.5);
            }
            net.add_node(Node::conditional(w[1], t)).unwrap();
        }
        net
    }

    #[test]
    fn test_add_node_requires_parents() {
        let mut t = ConditionalTable::new();
        t.add_row(Assignment::single("x", "t"), Assignment::single("y", "t"), 1.0);
        let mut net = BayesNetwork::new();
        let err = net.add_node(Node::conditional("y", t));
        assert_eq!(err, Err(InferenceError::MissingVariable("x".to_string())));
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let mut net = chain(&["x"]);
        let dup = Node::chance("x", CategoricalTable::over("x", [("t", 1.0)]));
        assert!(matches!(net.add_node(dup), Err(InferenceError::InternalInvariant(_))));
    }

    #[test]
    fn test_get_node() {
        let net = chain(&["x", "y"]);
        assert!(net.get_node("y").is_ok());
        assert_eq!(
            net.get_node("z").unwrap_err(),
            InferenceError::MissingVariable("z".to_string())
        );
    }

    #[test]
    fn test_ancestors_and_descendants() {
        let net = chain(&["x", "y", "z"]);
        assert_eq!(net.ancestors("z"), ["x", "y"].iter().map(|s| s.to_string()).collect::<BTreeSet<String>>());
        assert_eq!(net.descendants("x"), ["y", "z"].iter().map(|s| s.to_string()).collect::<BTreeSet<String>>());
        assert!(net.ancestors("x").is_empty());
        assert_eq!(net.output_ids("y"), ["z".to_string()].into_iter().collect::<BTreeSet<String>>());
    }

    #[test]
    fn test_filtered_sorted_nodes() {
        let net = chain(&["x", "y", "z"]);
        let relevant = net.ancestral_closure(["y"]);
        let ids: Vec<&str> = net.filtered_sorted_nodes(&relevant).iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        let all: Vec<&str> = net.sorted_nodes().iter().map(|n| n.id()).collect();
        assert_eq!(all, vec!["x", "y", "z"]);
    }
}
