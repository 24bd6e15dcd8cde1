//! Conversion of network nodes into elimination factors.

use log::trace;

use crate::assignment::Assignment;
use crate::error::Result;
use crate::factor::Factor;
use crate::node::{BayesNode, NodeKind};

/// Builds the starting factor of `node`, conditioned on `evidence`.
///
/// Rows of the node's flat table that contradict the evidence are dropped, and
/// the evidence variables are removed from the remaining rows, so the scope
/// of the factor never contains an observed variable. Chance and action
/// nodes contribute probability mass; utility nodes contribute utility with
/// unit probability.
pub fn make_factor<N: BayesNode + ?Sized>(node: &N, evidence: &Assignment) -> Result<Factor> {
    let mut factor = Factor::new();
    for (assign, value) in node.flat_table()? {
        if !assign.consistent_with(evidence) {
            continue;
        }
        let reduced = assign.trim_inverse(evidence.vars());
        match node.kind() {
            NodeKind::Chance | NodeKind::Action => factor.add(reduced, value, 0.0)?,
            NodeKind::Utility => factor.add(reduced, 1.0, value)?,
        }
    }
    trace!("make_factor({}) -> {} rows", node.id(), factor.len());
    Ok(factor)
}
