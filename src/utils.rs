//! Helpers over plain probability tables.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use log::warn;

use crate::assignment::Assignment;
use crate::error::Result;
use crate::value::Value;

/// Normalises a table so that its values sum to one.
///
/// A table with zero total is logged and returned unchanged.
pub fn normalise(table: &BTreeMap<Assignment, f64>) -> BTreeMap<Assignment, f64> {
    let mut total: f64 = table.values().sum();
    if total == 0.0 {
        warn!("all assignments in the distribution have a zero probability, cannot be normalised");
        total = 1.0;
    }
    table.iter().map(|(a, p)| (a.clone(), p / total)).collect()
}

/// Normalises a table separately for each projection onto `cond_vars`.
pub fn normalise_conditional(
    table: &BTreeMap<Assignment, f64>,
    cond_vars: &BTreeSet<String>,
) -> BTreeMap<Assignment, f64> {
    let mut totals: BTreeMap<Assignment, f64> = BTreeMap::new();
    for (a, p) in table {
        *totals.entry(a.trim(cond_vars)).or_insert(0.0) += p;
    }
    table
        .iter()
        .map(|(a, p)| {
            let mut total = totals.get(&a.trim(cond_vars)).copied().unwrap_or(0.0);
            if total == 0.0 {
                warn!("all assignments in the distribution have a zero probability, cannot be normalised");
                total = 1.0;
            }
            (a.clone(), p / total)
        })
        .collect()
}

/// Normalises a vector of probabilities.
///
/// Negative entries are clamped to zero. If the remaining mass is
/// negligible (at most `0.001`), the uniform vector is returned.
pub fn normalise_vec(probs: &[f64]) -> Vec<f64> {
    let clamped: Vec<f64> = probs.iter().map(|p| p.max(0.0)).collect();
    let sum: f64 = clamped.iter().sum();
    if sum > 0.001 {
        clamped.iter().map(|p| p / sum).collect()
    } else {
        vec![1.0 / probs.len() as f64; probs.len()]
    }
}

/// Flattens a `condition -> head -> prob` table into `condition ∪ head -> prob`.
///
/// Fails if a head assigns a condition variable a different value.
pub fn flatten_table(
    table: &BTreeMap<Assignment, BTreeMap<Assignment, f64>>,
) -> Result<BTreeMap<Assignment, f64>> {
    let mut flat = BTreeMap::new();
    for (condition, heads) in table {
        for (head, p) in heads {
            flat.insert(condition.extend(head)?, *p);
        }
    }
    Ok(flat)
}

fn descending<'a>(table: impl IntoIterator<Item = (&'a Assignment, &'a f64)>) -> Vec<(&'a Assignment, f64)> {
    let mut entries: Vec<(&Assignment, f64)> = table.into_iter().map(|(a, p)| (a, *p)).collect();
    entries.sort_by(|(a1, p1), (a2, p2)| match p2.total_cmp(p1) {
        Ordering::Equal => a1.cmp(a2),
        o => o,
    });
    entries
}

/// The `nbest` entries with the highest values, in descending order.
///
/// Ties are broken by assignment order. `nbest < 1` is treated as `1`.
pub fn n_best(table: &BTreeMap<Assignment, f64>, nbest: usize) -> Vec<(Assignment, f64)> {
    let nbest = if nbest < 1 {
        warn!("nbest should be >= 1");
        1
    } else {
        nbest
    };
    descending(table)
        .into_iter()
        .take(nbest)
        .map(|(a, p)| (a.clone(), p))
        .collect()
}

/// Position of `assign` in the table sorted by descending value.
pub fn ranking(table: &BTreeMap<Assignment, f64>, assign: &Assignment) -> Option<usize> {
    descending(table).iter().position(|(a, _)| *a == assign)
}

/// Every combination of values for the given variables.
///
/// An empty map yields a single empty assignment; a variable with an empty
/// domain yields no combination at all.
pub fn combinations(domains: &BTreeMap<String, BTreeSet<Value>>) -> Vec<Assignment> {
    let mut result = vec![Assignment::new()];
    for (var, values) in domains {
        let mut next = Vec::with_capacity(result.len() * values.len());
        for partial in &result {
            for value in values {
                next.push(partial.clone().with(var.clone(), value.clone()));
            }
        }
        result = next;
    }
    result
}
