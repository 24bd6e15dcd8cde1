//! Assignments of values to variables.
//!
//! An [`Assignment`] is the key of every table in the engine. Pairs are kept in
//! a [`BTreeMap`], so equality, ordering and hashing all follow the sorted
//! key/value view and never depend on insertion order.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{InferenceError, Result};
use crate::value::Value;

/// A mapping from variable names to values.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Assignment {
    pairs: BTreeMap<String, Value>,
}

impl Assignment {
    /// Creates an empty assignment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an assignment with a single pair.
    pub fn single(var: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut a = Self::new();
        a.add_pair(var, value);
        a
    }

    /// Adds (or overwrites) a pair.
    pub fn add_pair(&mut self, var: impl Into<String>, value: impl Into<Value>) {
        self.pairs.insert(var.into(), value.into());
    }

    /// Builder-style version of [`add_pair`][Self::add_pair].
    pub fn with(mut self, var: impl Into<String>, value: impl Into<Value>) -> Self {
        self.add_pair(var, value);
        self
    }

    pub fn get(&self, var: &str) -> Option<&Value> {
        self.pairs.get(var)
    }

    pub fn contains_var(&self, var: &str) -> bool {
        self.pairs.contains_key(var)
    }

    /// Variable names, in sorted order.
    pub fn vars(&self) -> impl Iterator<Item = &str> + '_ {
        self.pairs.keys().map(String::as_str)
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Returns the union of `self` and `other`.
    ///
    /// Fails if both assign unequal values to the same variable.
    pub fn extend(&self, other: &Assignment) -> Result<Assignment> {
        let mut result = self.clone();
        for (var, value) in &other.pairs {
            match result.pairs.get(var) {
                Some(existing) if existing != value => {
                    return Err(InferenceError::InternalInvariant(format!(
                        "inconsistent assignments on {}: {} vs {}",
                        var, existing, value
                    )));
                }
                Some(_) => {}
                None => {
                    result.pairs.insert(var.clone(), value.clone());
                }
            }
        }
        Ok(result)
    }

    /// Returns the union of two assignments already known to be consistent.
    pub fn union(&self, other: &Assignment) -> Assignment {
        debug_assert!(self.consistent_with(other), "union of inconsistent assignments");
        let mut result = self.clone();
        for (var, value) in &other.pairs {
            result.pairs.entry(var.clone()).or_insert_with(|| value.clone());
        }
        result
    }

    /// Projection onto the given variables. Unknown names are ignored.
    pub fn trim<I, S>(&self, vars: I) -> Assignment
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result = Assignment::new();
        for var in vars {
            if let Some((k, v)) = self.pairs.get_key_value(var.as_ref()) {
                result.pairs.insert(k.clone(), v.clone());
            }
        }
        result
    }

    /// Projection onto every variable except the given ones.
    pub fn trim_inverse<I, S>(&self, vars: I) -> Assignment
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut result = self.clone();
        result.remove_all(vars);
        result
    }

    pub fn remove(&mut self, var: &str) -> Option<Value> {
        self.pairs.remove(var)
    }

    pub fn remove_all<I, S>(&mut self, vars: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for var in vars {
            self.pairs.remove(var.as_ref());
        }
    }

    /// Returns `true` iff every shared variable has the same value in both.
    pub fn consistent_with(&self, other: &Assignment) -> bool {
        // Walk the smaller map, look up in the larger one.
        let (small, large) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        small
            .pairs
            .iter()
            .all(|(var, value)| large.pairs.get(var).map_or(true, |v| v == value))
    }

    /// Returns `true` iff every pair of `other` is present in `self`.
    pub fn contains(&self, other: &Assignment) -> bool {
        other
            .pairs
            .iter()
            .all(|(var, value)| self.pairs.get(var) == Some(value))
    }
}

impl<K, V> FromIterator<(K, V)> for Assignment
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut a = Assignment::new();
        for (k, v) in iter {
            a.add_pair(k, v);
        }
        a
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.pairs.is_empty() {
            return write!(f, "{{}}");
        }
        for (i, (var, value)) in self.pairs.iter().enumerate() {
            if i > 0 {
                write!(f, " ^ ")?;
            }
            write!(f, "{}={}", var, value)?;
        }
        Ok(())
    }
}
