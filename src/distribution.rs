//! Tables produced by inference and attached to chance nodes.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::assignment::Assignment;
use crate::error::Result;
use crate::utils;
use crate::value::Value;

/// Tolerance used by [`CategoricalTable::is_well_formed`].
const WELL_FORMED_EPS: f64 = 1e-6;

/// A (normalised) distribution over assignments of head variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoricalTable {
    rows: BTreeMap<Assignment, f64>,
}

impl CategoricalTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: BTreeMap<Assignment, f64>) -> Self {
        Self { rows }
    }

    /// Uniform distribution over the given head assignments.
    pub fn uniform(heads: impl IntoIterator<Item = Assignment>) -> Self {
        let mut rows: BTreeMap<Assignment, f64> = heads.into_iter().map(|h| (h, 0.0)).collect();
        let p = 1.0 / rows.len() as f64;
        for v in rows.values_mut() {
            *v = p;
        }
        Self { rows }
    }

    /// Single-variable table from `(value, prob)` pairs.
    pub fn over<V: Into<Value>>(var: &str, rows: impl IntoIterator<Item = (V, f64)>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|(v, p)| (Assignment::single(var, v), p))
                .collect(),
        }
    }

    pub fn add_row(&mut self, head: Assignment, prob: f64) {
        self.rows.insert(head, prob);
    }

    /// Probability of the head assignment, `0.0` when absent.
    pub fn prob(&self, head: &Assignment) -> f64 {
        self.rows.get(head).copied().unwrap_or(0.0)
    }

    pub fn rows(&self) -> &BTreeMap<Assignment, f64> {
        &self.rows
    }

    /// Head assignments of the table.
    pub fn values(&self) -> impl Iterator<Item = &Assignment> + '_ {
        self.rows.keys()
    }

    pub fn head_vars(&self) -> BTreeSet<String> {
        self.rows
            .keys()
            .flat_map(|a| a.vars().map(str::to_string))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.rows.values().sum()
    }

    /// Whether the probabilities sum to one.
    pub fn is_well_formed(&self) -> bool {
        (self.total() - 1.0).abs() < WELL_FORMED_EPS
    }

    /// Table restricted to the `nbest` most likely rows.
    pub fn n_best(&self, nbest: usize) -> CategoricalTable {
        Self::from_rows(utils::n_best(&self.rows, nbest).into_iter().collect())
    }

    /// Rank of `head` when rows are sorted by decreasing probability.
    pub fn ranking(&self, head: &Assignment) -> Option<usize> {
        utils::ranking(&self.rows, head)
    }
}

impl fmt::Display for CategoricalTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (head, p) in &self.rows {
            writeln!(f, "P({}) = {:.4}", head, p)?;
        }
        Ok(())
    }
}

/// A conditional distribution `P(head | condition)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionalTable {
    table: BTreeMap<Assignment, CategoricalTable>,
}

impl ConditionalTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, condition: Assignment, head: Assignment, prob: f64) {
        self.table.entry(condition).or_default().add_row(head, prob);
    }

    /// Probability of `head` given `condition`, `0.0` when absent.
    pub fn prob(&self, condition: &Assignment, head: &Assignment) -> f64 {
        self.table.get(condition).map_or(0.0, |t| t.prob(head))
    }

    /// Distribution over the head variables for one condition.
    pub fn posterior(&self, condition: &Assignment) -> Option<&CategoricalTable> {
        self.table.get(condition)
    }

    pub fn conditions(&self) -> impl Iterator<Item = &Assignment> + '_ {
        self.table.keys()
    }

    pub fn condition_vars(&self) -> BTreeSet<String> {
        self.table
            .keys()
            .flat_map(|a| a.vars().map(str::to_string))
            .collect()
    }

    pub fn head_vars(&self) -> BTreeSet<String> {
        self.table.values().flat_map(|t| t.head_vars()).collect()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Adds a uniform head distribution for every missing condition.
    ///
    /// The candidate conditions are all combinations of the values observed
    /// for each condition variable; the head values are those observed across
    /// all existing conditions.
    pub fn fill_conditional_holes(&mut self) {
        self.fill_conditional_holes_with(&BTreeMap::new());
    }

    /// Like [`fill_conditional_holes`][Self::fill_conditional_holes], with the
    /// observed values of each condition variable extended by `known`.
    ///
    /// Entries of `known` for variables that do not occur in any condition
    /// are ignored.
    pub fn fill_conditional_holes_with(&mut self, known: &BTreeMap<String, BTreeSet<Value>>) {
        let mut domains: BTreeMap<String, BTreeSet<Value>> = BTreeMap::new();
        for condition in self.table.keys() {
            for (var, value) in condition.pairs() {
                domains.entry(var.to_string()).or_default().insert(value.clone());
            }
        }
        for (var, values) in domains.iter_mut() {
            if let Some(extra) = known.get(var) {
                values.extend(extra.iter().cloned());
            }
        }
        let heads: BTreeSet<Assignment> = self
            .table
            .values()
            .flat_map(|t| t.values().cloned())
            .collect();
        if heads.is_empty() {
            return;
        }
        for condition in utils::combinations(&domains) {
            if !self.table.contains_key(&condition) {
                log::debug!("filling conditional hole for {}", condition);
                self.table
                    .insert(condition, CategoricalTable::uniform(heads.iter().cloned()));
            }
        }
    }

    /// Flat table over `condition ∪ head`.
    ///
    /// Fails with [`InternalInvariant`][crate::error::InferenceError::InternalInvariant]
    /// if a head contradicts its condition.
    pub fn flat_table(&self) -> Result<BTreeMap<Assignment, f64>> {
        let nested: BTreeMap<Assignment, BTreeMap<Assignment, f64>> = self
            .table
            .iter()
            .map(|(c, t)| (c.clone(), t.rows().clone()))
            .collect();
        utils::flatten_table(&nested)
    }
}

impl fmt::Display for ConditionalTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (condition, heads) in &self.table {
            for (head, p) in heads.rows() {
                writeln!(f, "P({} | {}) = {:.4}", head, condition, p)?;
            }
        }
        Ok(())
    }
}

/// Expected utilities of assignments of action variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UtilityTable {
    rows: BTreeMap<Assignment, f64>,
}

impl UtilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: BTreeMap<Assignment, f64>) -> Self {
        Self { rows }
    }

    pub fn set_util(&mut self, actions: Assignment, util: f64) {
        self.rows.insert(actions, util);
    }

    pub fn util(&self, actions: &Assignment) -> Option<f64> {
        self.rows.get(actions).copied()
    }

    pub fn rows(&self) -> &BTreeMap<Assignment, f64> {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Assignment with the highest utility. Ties go to the smallest assignment.
    pub fn best(&self) -> Option<(&Assignment, f64)> {
        let mut best = None;
        for (a, u) in &self.rows {
            match best {
                Some((_, bu)) if bu >= *u => {}
                _ => best = Some((a, *u)),
            }
        }
        best
    }

    /// Table restricted to the `nbest` highest utilities.
    pub fn n_best(&self, nbest: usize) -> UtilityTable {
        Self::from_rows(utils::n_best(&self.rows, nbest).into_iter().collect())
    }
}

impl fmt::Display for UtilityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (actions, u) in &self.rows {
            writeln!(f, "U({}) = {:.4}", actions, u)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::error::InferenceError;

    #[test]
    fn test_categorical_basics() {
        let t = CategoricalTable::over("x", [("a", 0.2), ("b", 0.8)]);
        assert_eq!(t.prob(&Assignment::single("x", "b")), 0.8);
        assert_eq!(t.prob(&Assignment::single("x", "z")), 0.0);
        assert!(t.is_well_formed());
        assert_eq!(t.head_vars().into_iter().collect::<Vec<_>>(), vec!["x"]);
        assert_eq!(t.ranking(&Assignment::single("x", "b")), Some(0));
        assert_eq!(t.n_best(1).len(), 1);
    }

    #[test]
    fn test_uniform() {
        let t = CategoricalTable::uniform([Assignment::single("x", 1), Assignment::single("x", 2)]);
        assert_eq!(t.prob(&Assignment::single("x", 1)), 0.5);
        assert!(t.is_well_formed());
    }

    #[test]
    fn test_conditional_holes() {
        let mut t = ConditionalTable::new();
        t.add_row(Assignment::new().with("a", 1).with("b", 1), Assignment::single("h", "x"), 0.3);
        t.add_row(Assignment::new().with("a", 1).with("b", 1), Assignment::single("h", "y"), 0.7);
        t.add_row(Assignment::new().with("a", 2).with("b", 2), Assignment::single("h", "x"), 1.0);
        t.fill_conditional_holes();

        assert_eq!(t.len(), 4);
        let hole = Assignment::new().with("a", 1).with("b", 2);
        assert_eq!(t.prob(&hole, &Assignment::single("h", "x")), 0.5);
        assert_eq!(t.prob(&hole, &Assignment::single("h", "y")), 0.5);
        // existing conditions are left alone
        let full = Assignment::new().with("a", 1).with("b", 1);
        assert_eq!(t.prob(&full, &Assignment::single("h", "y")), 0.7);
    }

    #[test]
    fn test_conditional_flat_table() {
        let mut t = ConditionalTable::new();
        t.add_row(Assignment::single("c", "t"), Assignment::single("h", "x"), 0.4);
        t.add_row(Assignment::single("c", "t"), Assignment::single("h", "y"), 0.6);
        let flat = t.flat_table().unwrap();
        assert_eq!(flat[&Assignment::new().with("c", "t").with("h", "y")], 0.6);
        assert_eq!(t.condition_vars().len(), 1);
        assert_eq!(t.head_vars().len(), 1);
    }

    #[test]
    fn test_flat_table_rejects_head_contradicting_condition() {
        let mut t = ConditionalTable::new();
        t.add_row(Assignment::single("y", "t"), Assignment::single("y", "f"), 1.0);
        assert!(matches!(t.flat_table(), Err(InferenceError::InternalInvariant(_))));

        // agreeing on the shared variable is fine
        let mut t = ConditionalTable::new();
        t.add_row(Assignment::single("y", "t"), Assignment::single("y", "t"), 1.0);
        assert_eq!(t.flat_table().unwrap().len(), 1);
    }

    #[test]
    fn test_fill_conditional_holes_with_known_domain() {
        let mut t = ConditionalTable::new();
        t.add_row(Assignment::single("c", 1), Assignment::single("h", "x"), 1.0);
        t.fill_conditional_holes();
        assert_eq!(t.len(), 1);

        let mut known = BTreeMap::new();
        known.insert("c".to_string(), [Value::from(1), Value::from(2), Value::from(3)].into_iter().collect());
        known.insert("unused".to_string(), [Value::from(0)].into_iter().collect());
        t.fill_conditional_holes_with(&known);
        assert_eq!(t.len(), 3);
        assert_eq!(t.prob(&Assignment::single("c", 3), &Assignment::single("h", "x")), 1.0);
        assert_eq!(t.condition_vars().len(), 1);
    }

    #[test]
    fn test_utility_best() {
        let mut t = UtilityTable::new();
        t.set_util(Assignment::single("a", "hi"), 5.5);
        t.set_util(Assignment::single("a", "lo"), 2.3);
        let (best, u) = t.best().unwrap();
        assert_eq!(best, &Assignment::single("a", "hi"));
        assert_eq!(u, 5.5);
        assert!(UtilityTable::new().best().is_none());
    }
}
