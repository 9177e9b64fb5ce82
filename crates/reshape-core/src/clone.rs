//! Traversal context for deep cloning and cycle detection
//!
//! A `CloneContext` is created for one top-level operation and dropped when it
//! returns. It records the identities of the records and arrays currently on
//! the traversal stack together with the key path leading to them, so that a
//! back-reference is reported before any further recursion happens.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

use crate::value::{Array, Record, Value};
use crate::{Error, Result};
use std::collections::HashSet;

/// Per-call state shared by every recursive clone step
#[derive(Debug, Clone, Default)]
pub struct CloneContext {
    /// Whether values are copied recursively or shared by reference
    deep: bool,
    /// Identities of containers currently being traversed
    active: HashSet<usize>,
    /// Containers currently being mapped, paired with the nested table
    /// applied to them
    descending: HashSet<(usize, usize)>,
    /// Key path from the root to the current position
    path: Vec<PathSegment>,
}

#[derive(Debug, Clone)]
enum PathSegment {
    Key(String),
    Index(usize),
}

impl CloneContext {
    /// Create a fresh context for a single top-level operation
    pub fn new(deep: bool) -> Self {
        Self {
            deep,
            ..Self::default()
        }
    }

    pub fn is_deep(&self) -> bool {
        self.deep
    }

    /// Number of containers currently on the traversal stack
    pub fn depth(&self) -> usize {
        self.active.len()
    }

    /// Current position rendered as `a.b[2].c`
    pub fn path(&self) -> String {
        let mut rendered = String::new();
        for segment in &self.path {
            match segment {
                PathSegment::Key(key) => {
                    if !rendered.is_empty() {
                        rendered.push('.');
                    }
                    rendered.push_str(key);
                }
                PathSegment::Index(index) => {
                    rendered.push('[');
                    rendered.push_str(&index.to_string());
                    rendered.push(']');
                }
            }
        }
        rendered
    }

    /// Copy a value according to the `deep` setting
    ///
    /// Shallow contexts return the value itself, sharing nested instances.
    /// Deep contexts copy dates into new instances and records and arrays
    /// element by element, failing on the first back-reference.
    pub fn clone_value(&mut self, value: &Value) -> Result<Value> {
        if !self.deep {
            return Ok(value.clone());
        }

        match value {
            Value::Date(date) => Ok(Value::Date(date.duplicate())),
            Value::Array(array) => self.clone_array(array).map(Value::Array),
            Value::Object(record) => self.clone_record(record).map(Value::Object),
            primitive => Ok(primitive.clone()),
        }
    }

    fn clone_array(&mut self, array: &Array) -> Result<Array> {
        self.track(array.id(), |ctx| {
            array
                .to_vec()
                .iter()
                .enumerate()
                .map(|(index, item)| ctx.at_index(index, |ctx| ctx.clone_value(item)))
                .collect::<Result<Vec<_>>>()
                .map(Array::from_values)
        })
    }

    fn clone_record(&mut self, record: &Record) -> Result<Record> {
        self.track(record.id(), |ctx| {
            let copy = Record::new();
            for (key, item) in record.entries() {
                let cloned = ctx.at_key(&key, |ctx| ctx.clone_value(&item))?;
                copy.insert(key, cloned);
            }
            Ok(copy)
        })
    }

    /// Run `f` with the container `id` on the traversal stack
    ///
    /// Shallow contexts never track, since nothing is copied recursively.
    /// The identity is released on every return path.
    pub(crate) fn track<T>(
        &mut self,
        id: usize,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if !self.deep {
            return f(self);
        }
        if !self.active.insert(id) {
            log::debug!("back-reference found at '{}'", self.path());
            return Err(Error::CircularReference { path: self.path() });
        }
        let result = f(self);
        self.active.remove(&id);
        result
    }

    /// Run `f` for a container mapped under the nested table `table`
    ///
    /// Deep contexts defer to [`CloneContext::track`]. Shallow contexts
    /// return `value` itself when the same container is met again under the
    /// same table, since descending again would never terminate.
    pub(crate) fn descend(
        &mut self,
        id: usize,
        table: usize,
        value: &Value,
        f: impl FnOnce(&mut Self) -> Result<Value>,
    ) -> Result<Value> {
        if self.deep {
            return self.track(id, f);
        }
        if !self.descending.insert((id, table)) {
            log::trace!("sharing back-reference at '{}'", self.path());
            return Ok(value.clone());
        }
        let result = f(self);
        self.descending.remove(&(id, table));
        result
    }

    pub(crate) fn at_key<T>(&mut self, key: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(PathSegment::Key(key.to_string()));
        let result = f(self);
        self.path.pop();
        result
    }

    pub(crate) fn at_index<T>(&mut self, index: usize, f: impl FnOnce(&mut Self) -> T) -> T {
        self.path.push(PathSegment::Index(index));
        let result = f(self);
        self.path.pop();
        result
    }
}
