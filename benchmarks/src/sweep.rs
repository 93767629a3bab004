// Copyright © 2026 The node-bench Authors
//
// SPDX-License-Identifier: Apache-2.0
//

//! Cartesian product of named parameter axes.

use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::record::Value;

/// A config value that may be written either as a bare scalar or as a list.
/// A scalar always stands for a one element list.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(values: Vec<T>) -> Self {
        OneOrMany::Many(values)
    }
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(values) => values,
            OneOrMany::One(value) => vec![value],
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            OneOrMany::Many(values) => values,
            OneOrMany::One(value) => std::slice::from_ref(value),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl<T: Clone> OneOrMany<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.as_slice().to_vec()
    }
}

struct Axis {
    name: String,
    values: Vec<Value>,
}

/// Builder for a set of axes. Axes are expanded in declaration order, the
/// first one varying slowest.
#[derive(Default)]
pub struct Sweep {
    axes: Vec<Axis>,
}

impl Sweep {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.axes.push(Axis {
            name: name.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Number of combinations `expand` yields.
    pub fn len(&self) -> usize {
        self.axes.iter().map(|a| a.values.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn expand(&self) -> Vec<Combination> {
        let mut combinations = vec![Combination::default()];
        for axis in &self.axes {
            combinations = combinations
                .iter()
                .flat_map(|prefix| {
                    axis.values.iter().map(move |value| {
                        let mut c = prefix.clone();
                        c.params.push((axis.name.clone(), value.clone()));
                        c
                    })
                })
                .collect();
        }
        combinations
    }
}

/// One point of a sweep: a value per axis, in axis order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Combination {
    params: Vec<(String, Value)>,
}

impl Combination {
    pub fn get(&self, axis: &str) -> Option<&Value> {
        self.params.iter().find(|(n, _)| n == axis).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v))
    }
}

impl Index<&str> for Combination {
    type Output = Value;

    /// Panics when the sweep had no such axis.
    fn index(&self, axis: &str) -> &Value {
        self.get(axis)
            .unwrap_or_else(|| panic!("no axis named '{axis}' in this sweep"))
    }
}
