//! Per-field transform table
//!
//! A transform table maps a (resolved target) key to either a leaf function
//! or a nested table applied to the sub-keys of a record value. The choice is
//! fixed when the table is built, so the mapper dispatches on the variant and
//! never inspects the shape of the configured entry at call time.
//!
//! # Examples
//!
//! ```
//! use reshape_core::{Transform, TransformSpec, Value};
//! use reshape_core::transform::built_in;
//!
//! let transforms = TransformSpec::new()
//!     .with("amount", built_in::parse_float())
//!     .with(
//!         "nested",
//!         Transform::nested(TransformSpec::new().with(
//!             "value",
//!             Transform::leaf(|v: Value| Value::from(v.as_f64().unwrap_or(0.0) * 10.0)),
//!         )),
//!     );
//!
//! assert_eq!(transforms.len(), 2);
//! assert!(transforms.get("nested").unwrap().is_nested());
//! ```
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

pub mod built_in;

use crate::value::Value;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

pub use built_in::ConversionError;

/// A caller-supplied leaf transform
///
/// Failures are returned as `anyhow::Error` and reach the caller of
/// [`crate::map`] unchanged.
pub trait TransformFn: Send + Sync {
    fn apply(&self, value: Value) -> anyhow::Result<Value>;
}

impl<F> TransformFn for F
where
    F: Fn(Value) -> anyhow::Result<Value> + Send + Sync,
{
    fn apply(&self, value: Value) -> anyhow::Result<Value> {
        self(value)
    }
}

/// One entry of a transform table
#[derive(Clone)]
pub enum Transform {
    /// Function applied to the whole field value
    Leaf(Arc<dyn TransformFn>),
    /// Table applied to the sub-keys of a record, or of each record in an array
    Nested(TransformSpec),
}

impl Transform {
    /// Wrap an infallible function
    pub fn leaf<F>(f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        Transform::Leaf(Arc::new(move |value: Value| -> anyhow::Result<Value> {
            Ok(f(value))
        }))
    }

    /// Wrap a fallible function; its error is propagated as-is
    pub fn try_leaf<F, E>(f: F) -> Self
    where
        F: Fn(Value) -> Result<Value, E> + Send + Sync + 'static,
        E: Into<anyhow::Error>,
    {
        Transform::Leaf(Arc::new(move |value: Value| -> anyhow::Result<Value> {
            f(value).map_err(Into::into)
        }))
    }

    pub fn nested(spec: TransformSpec) -> Self {
        Transform::Nested(spec)
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Transform::Leaf(_))
    }

    pub fn is_nested(&self) -> bool {
        matches!(self, Transform::Nested(_))
    }
}

impl From<TransformSpec> for Transform {
    fn from(spec: TransformSpec) -> Self {
        Transform::Nested(spec)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transform::Leaf(_) => f.write_str("Leaf(<fn>)"),
            Transform::Nested(spec) => f.debug_tuple("Nested").field(spec).finish(),
        }
    }
}

/// Ordered table from target key to transform
#[derive(Clone, Default)]
pub struct TransformSpec {
    entries: IndexMap<String, Transform>,
}

impl TransformSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`TransformSpec::insert`]
    pub fn with(mut self, key: impl Into<String>, transform: impl Into<Transform>) -> Self {
        self.insert(key, transform);
        self
    }

    /// Add or replace the transform for `key`
    pub fn insert(&mut self, key: impl Into<String>, transform: impl Into<Transform>) -> Option<Transform> {
        self.entries.insert(key.into(), transform.into())
    }

    pub fn get(&self, key: &str) -> Option<&Transform> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for TransformSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

impl<K: Into<String>> FromIterator<(K, Transform)> for TransformSpec {
    fn from_iter<I: IntoIterator<Item = (K, Transform)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(k, t)| (k.into(), t)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_applies_function() {
        let double = Transform::leaf(|v: Value| Value::from(v.as_f64().unwrap_or(0.0) * 2.0));
        match double {
            Transform::Leaf(f) => assert_eq!(f.apply(Value::from(21)).unwrap(), Value::from(42)),
            Transform::Nested(_) => panic!("expected a leaf"),
        }
    }

    #[test]
    fn test_try_leaf_keeps_error() {
        let failing = Transform::try_leaf(|_v: Value| -> Result<Value, ConversionError> {
            Err(ConversionError {
                from: "string".to_string(),
                to: "number".to_string(),
                value: "abc".to_string(),
            })
        });
        let Transform::Leaf(f) = failing else {
            panic!("expected a leaf");
        };

        let err = f.apply(Value::from("abc")).unwrap_err();
        assert!(err.downcast_ref::<ConversionError>().is_some());
    }

    #[test]
    fn test_spec_builder_keeps_declared_order() {
        let spec = TransformSpec::new()
            .with("b", Transform::leaf(|v| v))
            .with("a", TransformSpec::new())
            .with("c", Transform::leaf(|v| v));

        assert_eq!(spec.keys().collect::<Vec<_>>(), vec!["b", "a", "c"]);
        assert!(spec.get("a").unwrap().is_nested());
        assert!(spec.get("b").unwrap().is_leaf());
        assert!(!spec.contains_key("d"));
    }

    #[test]
    fn test_debug_hides_functions() {
        let spec = TransformSpec::new()
            .with("leaf", Transform::leaf(|v| v))
            .with("nested", TransformSpec::new());

        assert_eq!(format!("{:?}", spec), r#"{"leaf": Leaf(<fn>), "nested": Nested({})}"#);
    }
}
