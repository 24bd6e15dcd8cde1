//! Inference queries.
//!
//! Every query borrows the network it runs on, names its query variables and
//! carries the evidence plus an optional deadline. The three shapes differ in
//! which nodes are relevant and in what the engine returns for them.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use crate::assignment::Assignment;
use crate::network::BayesNetwork;
use crate::node::{BayesNode, Node, NodeKind};

/// Common view of a query used by the elimination driver.
pub trait Query {
    fn network(&self) -> &BayesNetwork;

    fn query_vars(&self) -> &BTreeSet<String>;

    fn evidence(&self) -> &Assignment;

    fn deadline(&self) -> Option<Instant>;

    /// Identifiers of the nodes that can influence the answer.
    ///
    /// By default these are the query and evidence variables together with
    /// all their ancestors.
    fn relevant_nodes(&self) -> BTreeSet<String> {
        let targets = self.query_vars().iter().map(String::as_str).chain(self.evidence().vars());
        self.network().ancestral_closure(targets)
    }

    /// Relevant nodes, parents before children.
    fn filtered_sorted_nodes(&self) -> Vec<&Node> {
        self.network().filtered_sorted_nodes(&self.relevant_nodes())
    }
}

#[derive(Debug, Clone)]
struct Core<'a> {
    network: &'a BayesNetwork,
    query_vars: BTreeSet<String>,
    evidence: Assignment,
    deadline: Option<Instant>,
}

impl<'a> Core<'a> {
    fn new<I, S>(network: &'a BayesNetwork, query_vars: I, evidence: Assignment) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            network,
            query_vars: query_vars.into_iter().map(Into::into).collect(),
            evidence,
            deadline: None,
        }
    }
}

macro_rules! impl_query {
    ($ty:ident) => {
        impl<'a> $ty<'a> {
            /// Fails the query once `deadline` has passed.
            pub fn with_deadline(mut self, deadline: Instant) -> Self {
                self.core.deadline = Some(deadline);
                self
            }

            /// Fails the query once `timeout` has elapsed from now.
            pub fn with_timeout(self, timeout: Duration) -> Self {
                self.with_deadline(Instant::now() + timeout)
            }
        }
    };
}

/// Posterior distribution of the query variables.
#[derive(Debug, Clone)]
pub struct ProbQuery<'a> {
    core: Core<'a>,
}

impl<'a> ProbQuery<'a> {
    pub fn new<I, S>(network: &'a BayesNetwork, query_vars: I, evidence: Assignment) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            core: Core::new(network, query_vars, evidence),
        }
    }
}

impl_query!(ProbQuery);

impl Query for ProbQuery<'_> {
    fn network(&self) -> &BayesNetwork {
        self.core.network
    }
    fn query_vars(&self) -> &BTreeSet<String> {
        &self.core.query_vars
    }
    fn evidence(&self) -> &Assignment {
        &self.core.evidence
    }
    fn deadline(&self) -> Option<Instant> {
        self.core.deadline
    }
}

/// Expected utility of each combination of the query (action) variables.
#[derive(Debug, Clone)]
pub struct UtilQuery<'a> {
    core: Core<'a>,
}

impl<'a> UtilQuery<'a> {
    pub fn new<I, S>(network: &'a BayesNetwork, query_vars: I, evidence: Assignment) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            core: Core::new(network, query_vars, evidence),
        }
    }
}

impl_query!(UtilQuery);

impl Query for UtilQuery<'_> {
    fn network(&self) -> &BayesNetwork {
        self.core.network
    }
    fn query_vars(&self) -> &BTreeSet<String> {
        &self.core.query_vars
    }
    fn evidence(&self) -> &Assignment {
        &self.core.evidence
    }
    fn deadline(&self) -> Option<Instant> {
        self.core.deadline
    }

    /// Utility nodes sit below the action variables, so they and their
    /// ancestors are relevant on top of the default set.
    fn relevant_nodes(&self) -> BTreeSet<String> {
        let network = self.network();
        let targets = self
            .query_vars()
            .iter()
            .cloned()
            .chain(self.evidence().vars().map(str::to_string))
            .chain(network.ids_of_kind(NodeKind::Utility));
        network.ancestral_closure(targets)
    }
}

/// Reduction of the network to the query variables.
///
/// Each retained variable keeps, as parents, its *retained ancestors*: the
/// first retained nodes met on each upward path through non-retained nodes.
/// They are computed from the network on construction and may be overridden
/// per variable with [`ReductionQuery::with_input_nodes`].
#[derive(Debug, Clone)]
pub struct ReductionQuery<'a> {
    core: Core<'a>,
    input_nodes: BTreeMap<String, BTreeSet<String>>,
}

impl<'a> ReductionQuery<'a> {
    pub fn new<I, S>(network: &'a BayesNetwork, query_vars: I, evidence: Assignment) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let core = Core::new(network, query_vars, evidence);
        let input_nodes = core
            .query_vars
            .iter()
            .map(|var| (var.clone(), retained_ancestors(network, var, &core.query_vars)))
            .collect();
        Self { core, input_nodes }
    }

    /// Replaces the retained ancestors of `var`.
    pub fn with_input_nodes<I, S>(mut self, var: &str, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_nodes
            .insert(var.to_string(), inputs.into_iter().map(Into::into).collect());
        self
    }

    /// Retained ancestors of `var`.
    pub fn input_nodes(&self, var: &str) -> BTreeSet<String> {
        self.input_nodes.get(var).cloned().unwrap_or_default()
    }

    /// Query variables ordered so that retained ancestors come first.
    pub fn sorted_query_vars(&self) -> Vec<String> {
        let mut sorted: Vec<String> = Vec::with_capacity(self.core.query_vars.len());
        let mut placed: BTreeSet<&str> = BTreeSet::new();
        // Network order first, then a fixpoint over the declared inputs so that
        // explicit overrides are respected too.
        let mut pending: Vec<&str> = self
            .core
            .network
            .node_ids()
            .filter(|id| self.core.query_vars.contains(*id))
            .collect();
        pending.extend(
            self.core
                .query_vars
                .iter()
                .map(String::as_str)
                .filter(|v| !self.core.network.has_node(v)),
        );
        while !pending.is_empty() {
            let before = pending.len();
            pending.retain(|var| {
                let ready = self
                    .input_nodes(var)
                    .iter()
                    .all(|i| placed.contains(i.as_str()) || !self.core.query_vars.contains(i));
                if ready {
                    placed.insert(*var);
                    sorted.push(var.to_string());
                }
                !ready
            });
            if pending.len() == before {
                // Cyclic overrides: keep the remaining variables in network order.
                sorted.extend(pending.drain(..).map(str::to_string));
            }
        }
        sorted
    }
}

impl_query!(ReductionQuery);

impl Query for ReductionQuery<'_> {
    fn network(&self) -> &BayesNetwork {
        self.core.network
    }
    fn query_vars(&self) -> &BTreeSet<String> {
        &self.core.query_vars
    }
    fn evidence(&self) -> &Assignment {
        &self.core.evidence
    }
    fn deadline(&self) -> Option<Instant> {
        self.core.deadline
    }
}

fn retained_ancestors(network: &BayesNetwork, var: &str, retained: &BTreeSet<String>) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let mut visited = BTreeSet::new();
    let mut stack = vec![var.to_string()];
    while let Some(current) = stack.pop() {
        let Some(node) = network.node(&current) else {
            continue;
        };
        for parent in node.input_ids() {
            if !visited.insert(parent.clone()) {
                continue;
            }
            if retained.contains(parent) {
                found.insert(parent.clone());
            } else {
                stack.push(parent.clone());
            }
        }
    }
    found
}
