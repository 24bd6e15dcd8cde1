//! Dual-channel factors.
//!
//! A [`Factor`] maps assignments over a fixed scope to a pair of numbers: a
//! probability mass and an expected utility. The two channels combine
//! differently:
//!
//! - **product**: probabilities multiply, utilities add;
//! - **sum-out**: probabilities add, utilities are averaged with the
//!   probabilities as weights.
//!
//! This keeps the utility channel an *expected* utility at every step of
//! variable elimination, whichever factor the utility mass came from.
//!
//! # Examples
//!
//! ```
//! use varelim_rs::assignment::Assignment;
//! use varelim_rs::factor::{pointwise_product, Factor};
//!
//! let mut px = Factor::new();
//! px.add(Assignment::single("x", "t"), 0.6, 0.0).unwrap();
//! px.add(Assignment::single("x", "f"), 0.4, 0.0).unwrap();
//!
//! let mut ux = Factor::new();
//! ux.add(Assignment::single("x", "t"), 1.0, 10.0).unwrap();
//! ux.add(Assignment::single("x", "f"), 1.0, -5.0).unwrap();
//!
//! let joint = pointwise_product(&px, &ux);
//! let marginal = joint.sum_out("x");
//! let row = marginal.entry(&Assignment::new()).unwrap();
//! assert!((row.prob - 1.0).abs() < 1e-12);
//! assert!((row.util - 4.0).abs() < 1e-12);
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::convert::Infallible;
use std::fmt;

use log::{trace, warn};

use crate::assignment::Assignment;
use crate::error::{InferenceError, Result};

/// One row of a factor.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Entry {
    pub prob: f64,
    pub util: f64,
}

impl Entry {
    pub fn new(prob: f64, util: f64) -> Self {
        Self { prob, util }
    }
}

/// A table from assignments (all over the same scope) to [`Entry`] rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Factor {
    scope: BTreeSet<String>,
    rows: BTreeMap<Assignment, Entry>,
}

impl Factor {
    /// Creates an empty factor. Its scope is fixed by the first insertion.
    pub fn new() -> Self {
        Self::default()
    }

    /// The factor `{} -> (1.0, 0.0)`, neutral for [`pointwise_product`].
    pub fn identity() -> Self {
        let mut f = Self::new();
        f.rows.insert(Assignment::new(), Entry::new(1.0, 0.0));
        f
    }

    /// Variables of the factor.
    pub fn variables(&self) -> &BTreeSet<String> {
        &self.scope
    }

    pub fn rows(&self) -> impl Iterator<Item = (&Assignment, &Entry)> + '_ {
        self.rows.iter()
    }

    pub fn assignments(&self) -> impl Iterator<Item = &Assignment> + '_ {
        self.rows.keys()
    }

    pub fn entry(&self, assign: &Assignment) -> Option<&Entry> {
        self.rows.get(assign)
    }

    /// Probability of the row, `0.0` when absent.
    pub fn prob(&self, assign: &Assignment) -> f64 {
        self.rows.get(assign).map_or(0.0, |e| e.prob)
    }

    /// Utility of the row, `0.0` when absent.
    pub fn util(&self, assign: &Assignment) -> f64 {
        self.rows.get(assign).map_or(0.0, |e| e.util)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of the probability channel.
    pub fn total_prob(&self) -> f64 {
        self.rows.values().map(|e| e.prob).sum()
    }

    fn check_row(&self, assign: &Assignment, prob: f64, util: f64) -> Result<()> {
        let same_scope =
            assign.len() == self.scope.len() && assign.vars().all(|v| self.scope.contains(v));
        if !self.rows.is_empty() && !same_scope {
            return Err(InferenceError::InternalInvariant(format!(
                "row {} does not match factor scope {:?}",
                assign, self.scope
            )));
        }
        if prob.is_nan() || prob < 0.0 {
            return Err(InferenceError::InternalInvariant(format!(
                "invalid probability {} for row {}",
                prob, assign
            )));
        }
        if util.is_nan() {
            return Err(InferenceError::InternalInvariant(format!("NaN utility for row {}", assign)));
        }
        Ok(())
    }

    fn establish_scope(&mut self, assign: &Assignment) {
        if self.rows.is_empty() {
            self.scope = assign.vars().map(str::to_string).collect();
        }
    }

    /// Inserts or overwrites a row.
    pub fn add(&mut self, assign: Assignment, prob: f64, util: f64) -> Result<()> {
        self.check_row(&assign, prob, util)?;
        self.establish_scope(&assign);
        self.rows.insert(assign, Entry::new(prob, util));
        Ok(())
    }

    /// Adds `delta_prob` and `delta_util` to a row, creating it at zero if absent.
    pub fn increment(&mut self, assign: Assignment, delta_prob: f64, delta_util: f64) -> Result<()> {
        self.check_row(&assign, delta_prob, delta_util)?;
        self.establish_scope(&assign);
        let entry = self.rows.entry(assign).or_default();
        entry.prob += delta_prob;
        entry.util += delta_util;
        Ok(())
    }

    /// Row insertion for rows built by the algebra itself, whose scope is
    /// correct by construction.
    fn put(&mut self, assign: Assignment, entry: Entry) {
        debug_assert!(entry.prob >= 0.0);
        self.establish_scope(&assign);
        self.rows.insert(assign, entry);
    }

    /// Marginalises `var` out of the factor.
    ///
    /// Probabilities are summed. Utilities are accumulated as `prob * util`
    /// and divided back by the summed probability, so each output row holds
    /// the expected utility given its assignment. Rows whose summed
    /// probability is zero get a zero utility.
    ///
    /// Summing out a variable absent from the scope returns an identical factor.
    pub fn sum_out(&self, var: &str) -> Factor {
        if !self.scope.contains(var) {
            return self.clone();
        }

        let mut mass: BTreeMap<Assignment, Entry> = BTreeMap::new();
        for (assign, entry) in &self.rows {
            let mut reduced = assign.clone();
            reduced.remove(var);
            let acc = mass.entry(reduced).or_default();
            acc.prob += entry.prob;
            acc.util += entry.prob * entry.util;
        }

        let mut result = Factor::new();
        result.scope = self.scope.iter().filter(|v| *v != var).cloned().collect();
        for (assign, acc) in mass {
            let util = if acc.prob > 0.0 { acc.util / acc.prob } else { 0.0 };
            result.rows.insert(assign, Entry::new(acc.prob, util));
        }
        trace!("sum_out({}) -> {} rows", var, result.len());
        result
    }

    /// Divides every probability by the total mass.
    ///
    /// A zero total is logged and leaves the factor untouched.
    pub fn normalise(&mut self) {
        let total = self.total_prob();
        if total == 0.0 {
            warn!("all assignments in the factor have a zero probability, cannot be normalised");
            return;
        }
        for entry in self.rows.values_mut() {
            entry.prob /= total;
        }
    }

    /// Normalises separately for each distinct projection onto `cond_vars`.
    ///
    /// Conditions with zero total mass are logged and left untouched.
    pub fn normalise_on(&mut self, cond_vars: &BTreeSet<String>) {
        let mut totals: HashMap<Assignment, f64> = HashMap::new();
        for (assign, entry) in &self.rows {
            *totals.entry(assign.trim(cond_vars)).or_insert(0.0) += entry.prob;
        }
        for (assign, entry) in self.rows.iter_mut() {
            let total = totals.get(&assign.trim(cond_vars)).copied().unwrap_or(0.0);
            if total == 0.0 {
                warn!(
                    "all assignments for condition {} have a zero probability, cannot be normalised",
                    assign.trim(cond_vars)
                );
                continue;
            }
            entry.prob /= total;
        }
    }

    /// Probability channel as a plain table.
    pub fn prob_table(&self) -> BTreeMap<Assignment, f64> {
        self.rows.iter().map(|(a, e)| (a.clone(), e.prob)).collect()
    }

    /// Utility channel as a plain table.
    pub fn util_table(&self) -> BTreeMap<Assignment, f64> {
        self.rows.iter().map(|(a, e)| (a.clone(), e.util)).collect()
    }
}

impl fmt::Display for Factor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (assign, entry) in &self.rows {
            writeln!(f, "{} -> (p={}, u={})", assign, entry.prob, entry.util)?;
        }
        Ok(())
    }
}

/// Pointwise product of two factors.
///
/// The result ranges over the union of both scopes; every pair of rows that
/// agree on the shared variables yields one row, with multiplied
/// probabilities and summed utilities.
pub fn pointwise_product(a: &Factor, b: &Factor) -> Factor {
    let shared: BTreeSet<String> = a.scope.intersection(&b.scope).cloned().collect();

    // Index the rows of `b` by their projection onto the shared variables.
    let mut index: HashMap<Assignment, Vec<(&Assignment, &Entry)>> = HashMap::new();
    for (assign, entry) in &b.rows {
        index.entry(assign.trim(&shared)).or_default().push((assign, entry));
    }

    let mut result = Factor::new();
    result.scope = a.scope.union(&b.scope).cloned().collect();
    for (ra, ea) in &a.rows {
        let Some(matches) = index.get(&ra.trim(&shared)) else {
            continue;
        };
        for (rb, eb) in matches {
            let entry = Entry::new(ea.prob * eb.prob, ea.util + eb.util);
            result.put(ra.union(rb), entry);
        }
    }
    result
}

/// Pointwise product of a list of factors.
///
/// A single factor is returned as is; an empty list yields [`Factor::identity`].
pub fn product(factors: Vec<Factor>) -> Factor {
    match try_product(factors, || Ok::<(), Infallible>(())) {
        Ok(f) => f,
        Err(never) => match never {},
    }
}

/// Like [`product`], calling `check` after every pairwise product and
/// stopping at the first error it returns.
pub fn try_product<E>(
    mut factors: Vec<Factor>,
    mut check: impl FnMut() -> std::result::Result<(), E>,
) -> std::result::Result<Factor, E> {
    if factors.len() == 1 {
        if let Some(f) = factors.pop() {
            return Ok(f);
        }
    }
    let mut acc = Factor::identity();
    for f in &factors {
        acc = pointwise_product(&acc, f);
        check()?;
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_log::test;

    const EPS: f64 = 1e-12;

    fn a(pairs: &[(&str, &str)]) -> Assignment {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    fn px() -> Factor {
        let mut f = Factor::new();
        f.add(a(&[("x", "t")]), 0.6, 0.0).unwrap();
        f.add(a(&[("x", "f")]), 0.4, 0.0).unwrap();
        f
    }

    fn py_given_x() -> Factor {
        let mut f = Factor::new();
        f.add(a(&[("x", "t"), ("y", "t")]), 0.9, 0.0).unwrap();
        f.add(a(&[("x", "t"), ("y", "f")]), 0.1, 0.0).unwrap();
        f.add(a(&[("x", "f"), ("y", "t")]), 0.2, 0.0).unwrap();
        f.add(a(&[("x", "f"), ("y", "f")]), 0.8, 0.0).unwrap();
        f
    }

    #[test]
    fn test_scope_established_by_first_row() {
        let f = px();
        assert_eq!(f.variables().iter().collect::<Vec<_>>(), vec!["x"]);
        assert_eq!(f.len(), 2);
    }

    #[test]
    fn test_add_rejects_scope_mismatch() {
        let mut f = px();
        let err = f.add(a(&[("y", "t")]), 0.5, 0.0);
        assert!(matches!(err, Err(InferenceError::InternalInvariant(_))));
        let err = f.add(a(&[("x", "t"), ("y", "t")]), 0.5, 0.0);
        assert!(matches!(err, Err(InferenceError::InternalInvariant(_))));
    }

    #[test]
    fn test_add_rejects_negative_probability() {
        let mut f = Factor::new();
        let err = f.add(a(&[("x", "t")]), -0.1, 0.0);
        assert!(matches!(err, Err(InferenceError::InternalInvariant(_))));
        assert!(f.is_empty());
    }

    #[test]
    fn test_increment() {
        let mut f = Factor::new();
        f.increment(a(&[("x", "t")]), 0.25, 1.0).unwrap();
        f.increment(a(&[("x", "t")]), 0.5, 2.0).unwrap();
        let e = f.entry(&a(&[("x", "t")])).unwrap();
        assert!((e.prob - 0.75).abs() < EPS);
        assert!((e.util - 3.0).abs() < EPS);
    }

    #[test]
    fn test_product_chain() {
        let joint = pointwise_product(&px(), &py_given_x());
        assert_eq!(joint.len(), 4);
        assert!((joint.prob(&a(&[("x", "t"), ("y", "t")])) - 0.54).abs() < EPS);
        assert!((joint.prob(&a(&[("x", "f"), ("y", "t")])) - 0.08).abs() < EPS);
        assert_eq!(joint.variables().len(), 2);
    }

    #[test]
    fn test_product_sums_utilities() {
        let mut u1 = Factor::new();
        u1.add(a(&[("x", "t")]), 1.0, 3.0).unwrap();
        let mut u2 = Factor::new();
        u2.add(a(&[("y", "t")]), 1.0, 4.0).unwrap();
        let p = pointwise_product(&u1, &u2);
        let e = p.entry(&a(&[("x", "t"), ("y", "t")])).unwrap();
        assert_eq!(e.prob, 1.0);
        assert_eq!(e.util, 7.0);
    }

    #[test]
    fn test_product_of_disjoint_rows_is_empty() {
        let mut f = Factor::new();
        f.add(a(&[("x", "t")]), 1.0, 0.0).unwrap();
        let mut g = Factor::new();
        g.add(a(&[("x", "f")]), 1.0, 0.0).unwrap();
        assert!(pointwise_product(&f, &g).is_empty());
    }

    #[test]
    fn test_product_list() {
        assert_eq!(product(vec![]), Factor::identity());
        assert_eq!(product(vec![px()]), px());
        let p = product(vec![px(), py_given_x()]);
        assert_eq!(p, pointwise_product(&px(), &py_given_x()));
    }

    #[test]
    fn test_try_product_stops_at_first_error() {
        let mut calls = 0;
        let result = try_product(vec![px(), py_given_x(), px()], || {
            calls += 1;
            if calls == 2 {
                Err("stop")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("stop"));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_sum_out() {
        let joint = pointwise_product(&px(), &py_given_x());
        let py = joint.sum_out("x");
        assert_eq!(py.variables().iter().collect::<Vec<_>>(), vec!["y"]);
        assert!((py.prob(&a(&[("y", "t")])) - 0.62).abs() < EPS);
        assert!((py.prob(&a(&[("y", "f")])) - 0.38).abs() < EPS);
    }

    #[test]
    fn test_sum_out_absent_variable_is_identity() {
        let f = py_given_x();
        assert_eq!(f.sum_out("z"), f);
    }

    #[test]
    fn test_sum_out_expected_utility() {
        let mut u = Factor::new();
        u.add(a(&[("x", "t")]), 1.0, 10.0).unwrap();
        u.add(a(&[("x", "f")]), 1.0, -5.0).unwrap();
        let summed = pointwise_product(&px(), &u).sum_out("x");
        let e = summed.entry(&Assignment::new()).unwrap();
        assert!((e.prob - 1.0).abs() < EPS);
        assert!((e.util - 4.0).abs() < EPS);
    }

    #[test]
    fn test_sum_out_zero_probability_keeps_zero_utility() {
        let mut f = Factor::new();
        f.add(a(&[("x", "t"), ("y", "t")]), 0.0, 5.0).unwrap();
        f.add(a(&[("x", "f"), ("y", "t")]), 0.0, 7.0).unwrap();
        let summed = f.sum_out("x");
        let e = summed.entry(&a(&[("y", "t")])).unwrap();
        assert_eq!(e.prob, 0.0);
        assert_eq!(e.util, 0.0);
        assert!(!e.util.is_nan());
    }

    #[test]
    fn test_normalise() {
        let mut f = Factor::new();
        f.add(a(&[("x", "t")]), 3.0, 0.0).unwrap();
        f.add(a(&[("x", "f")]), 1.0, 0.0).unwrap();
        f.normalise();
        assert!((f.prob(&a(&[("x", "t")])) - 0.75).abs() < EPS);
        assert!((f.total_prob() - 1.0).abs() < EPS);
    }

    #[test]
    fn test_normalise_degenerate_is_noop() {
        let mut f = Factor::new();
        f.add(a(&[("x", "t")]), 0.0, 1.0).unwrap();
        f.add(a(&[("x", "f")]), 0.0, 2.0).unwrap();
        let before = f.clone();
        f.normalise();
        assert_eq!(f, before);
    }

    #[test]
    fn test_normalise_on_condition() {
        let mut joint = pointwise_product(&px(), &py_given_x());
        let cond: BTreeSet<String> = ["x".to_string()].into_iter().collect();
        joint.normalise_on(&cond);
        assert!((joint.prob(&a(&[("x", "t"), ("y", "t")])) - 0.9).abs() < EPS);
        assert!((joint.prob(&a(&[("x", "f"), ("y", "f")])) - 0.8).abs() < EPS);
    }
}
