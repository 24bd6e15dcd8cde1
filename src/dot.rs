//! Network to DOT (Graphviz) conversion.
//!
//! Useful to inspect the result of a reduction. The generated graph follows
//! the usual influence-diagram conventions:
//! - **Chance nodes** are ellipses
//! - **Action nodes** are boxes
//! - **Utility nodes** are diamonds
//! - **Edges** go from each parent to its child
//!
//! # Examples
//!
//! ```
//! use varelim_rs::distribution::CategoricalTable;
//! use varelim_rs::network::BayesNetwork;
//! use varelim_rs::node::Node;
//!
//! let mut net = BayesNetwork::new();
//! net.add_node(Node::chance("rain", CategoricalTable::over("rain", [(true, 0.2), (false, 0.8)]))).unwrap();
//!
//! let dot = net.to_dot().unwrap();
//! // Write to file and render with: dot -Tpng output.dot -o output.png
//! ```

use std::fmt::Write as _;

use crate::network::BayesNetwork;
use crate::node::{BayesNode, NodeKind};

/// Configuration options for DOT output generation.
///
/// Use `DotConfig::default()` for standard settings.
///
/// ```
/// use varelim_rs::dot::DotConfig;
///
/// let config = DotConfig {
///     show_values: false,
///     ..DotConfig::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for chance nodes (default: "ellipse")
    pub chance_shape: &'static str,
    /// Shape for action nodes (default: "box")
    pub action_shape: &'static str,
    /// Shape for utility nodes (default: "diamond")
    pub utility_shape: &'static str,
    /// Style for edges (default: "solid")
    pub edge_style: &'static str,
    /// Whether to list the domain of each node in its label (default: true)
    pub show_values: bool,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            chance_shape: "ellipse",
            action_shape: "box",
            utility_shape: "diamond",
            edge_style: "solid",
            show_values: true,
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl BayesNetwork {
    /// Converts the network to DOT format.
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(&DotConfig::default())
    }

    /// Converts the network to DOT format with custom configuration.
    pub fn to_dot_with_config(&self, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph {{")?;

        for node in self.sorted_nodes() {
            let shape = match node.kind() {
                NodeKind::Chance => config.chance_shape,
                NodeKind::Action => config.action_shape,
                NodeKind::Utility => config.utility_shape,
            };
            let values = node.values();
            let label = if config.show_values && !values.is_empty() {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                format!("{}\\n{{{}}}", escape(node.id()), escape(&values.join(", ")))
            } else {
                escape(node.id())
            };
            writeln!(
                dot,
                "\"{}\" [shape={}, label=\"{}\"];",
                escape(node.id()),
                shape,
                label
            )?;
        }

        for node in self.sorted_nodes() {
            for parent in node.input_ids() {
                writeln!(
                    dot,
                    "\"{}\" -> \"{}\" [style={}];",
                    escape(parent),
                    escape(node.id()),
                    config.edge_style
                )?;
            }
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}
