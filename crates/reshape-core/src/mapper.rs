//! Record mapper
//!
//! The mapper walks the fields of a source record in order and, for each one,
//! applies exclusion, rename resolution and transform dispatch before writing
//! it into a freshly allocated target record. Values are copied through a
//! [`CloneContext`] created for that single call, which shares nested
//! instances when `deep` is off and copies them (with cycle detection) when
//! it is on.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

use crate::clone::CloneContext;
use crate::options::MapOptions;
use crate::transform::{Transform, TransformSpec};
use crate::value::{Record, Value};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};

/// Compiled form of [`MapOptions`], reusable across calls
///
/// Compilation resolves the rename table into a source-to-target index once.
/// When several target keys name the same source key, the first one in the
/// table's declared order wins.
///
/// # Examples
///
/// ```
/// use reshape_core::{MapOptions, Mapper, Record, Value};
///
/// let mapper = Mapper::new(
///     &MapOptions::new()
///         .rename("name", "full_name")
///         .rename("id", "user_id"),
/// );
///
/// let source = Record::from_iter([
///     ("full_name", Value::from("John Doe")),
///     ("user_id", Value::from("123")),
/// ]);
/// let target = mapper.map(&source).unwrap();
///
/// assert_eq!(target.keys(), vec!["name", "id"]);
/// assert_eq!(target.get("name"), Some(Value::from("John Doe")));
/// ```
#[derive(Debug, Clone)]
pub struct Mapper {
    exclude: HashSet<String>,
    /// Source key to target key
    renames: HashMap<String, String>,
    transforms: TransformSpec,
    deep: bool,
}

impl Mapper {
    pub fn new(options: &MapOptions) -> Self {
        let mut renames: HashMap<String, String> = HashMap::with_capacity(options.field_mappings.len());
        for (target, source) in &options.field_mappings {
            match renames.get(source) {
                Some(kept) => log::warn!(
                    "field '{}' is mapped to both '{}' and '{}'; keeping '{}'",
                    source,
                    kept,
                    target,
                    kept
                ),
                None => {
                    renames.insert(source.clone(), target.clone());
                }
            }
        }

        Self {
            exclude: options.exclude.iter().cloned().collect(),
            renames,
            transforms: options.transforms.clone(),
            deep: options.deep,
        }
    }

    pub fn is_deep(&self) -> bool {
        self.deep
    }

    /// Key under which the source field `source_key` is written
    pub fn target_key<'a>(&'a self, source_key: &'a str) -> &'a str {
        self.renames
            .get(source_key)
            .map(String::as_str)
            .unwrap_or(source_key)
    }

    /// Map `source` into a new record
    ///
    /// Fails with [`Error::CircularReference`] when `deep` is set and the
    /// source graph contains a cycle, or with [`Error::Transform`] when a
    /// caller-supplied transform fails. No partial result is returned.
    pub fn map(&self, source: &Record) -> Result<Record> {
        log::debug!(
            "mapping record with {} fields (deep: {}, transforms: {})",
            source.len(),
            self.deep,
            self.transforms.len()
        );

        let mut context = CloneContext::new(self.deep);
        context.track(source.id(), |ctx| self.map_fields(source, ctx))
    }

    fn map_fields(&self, source: &Record, ctx: &mut CloneContext) -> Result<Record> {
        let target = Record::new();

        for (source_key, value) in source.entries() {
            if self.exclude.contains(&source_key) {
                log::trace!("excluding field '{}'", source_key);
                continue;
            }

            let target_key = self.target_key(&source_key);
            if target_key != source_key {
                log::trace!("renaming field '{}' to '{}'", source_key, target_key);
            }

            let mapped = ctx.at_key(&source_key, |ctx| {
                map_field(&self.transforms, target_key, &value, ctx)
            })?;
            target.insert(target_key, mapped);
        }

        Ok(target)
    }
}

impl From<&MapOptions> for Mapper {
    fn from(options: &MapOptions) -> Self {
        Mapper::new(options)
    }
}

impl From<MapOptions> for Mapper {
    fn from(options: MapOptions) -> Self {
        Mapper::new(&options)
    }
}

// Dispatch one field on the transform entry registered for `key`.
fn map_field(
    transforms: &TransformSpec,
    key: &str,
    value: &Value,
    ctx: &mut CloneContext,
) -> Result<Value> {
    match transforms.get(key) {
        Some(Transform::Leaf(f)) => {
            log::trace!("applying transform to '{}'", key);
            let input = ctx.clone_value(value)?;
            f.apply(input).map_err(Error::Transform)
        }
        Some(Transform::Nested(nested)) => {
            log::trace!("applying nested transforms to '{}'", key);
            map_nested(nested, value, ctx)
        }
        None => ctx.clone_value(value),
    }
}

// Records get a sub-map with no exclusion or renaming, arrays are mapped
// element-wise, and anything else passes through. A shallow map meeting a
// container it is already mapping under `spec` shares it instead.
fn map_nested(spec: &TransformSpec, value: &Value, ctx: &mut CloneContext) -> Result<Value> {
    let table = spec as *const TransformSpec as usize;
    match value {
        Value::Object(record) => ctx.descend(record.id(), table, value, |ctx| {
            let target = Record::new();
            for (key, item) in record.entries() {
                let mapped = ctx.at_key(&key, |ctx| map_field(spec, &key, &item, ctx))?;
                target.insert(key, mapped);
            }
            Ok(Value::Object(target))
        }),
        Value::Array(array) => ctx.descend(array.id(), table, value, |ctx| {
            array
                .to_vec()
                .iter()
                .enumerate()
                .map(|(index, item)| ctx.at_index(index, |ctx| map_nested(spec, item, ctx)))
                .collect::<Result<Vec<_>>>()
                .map(Value::from)
        }),
        other => ctx.clone_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::built_in;
    use crate::value::{Array, Date};

    fn number(value: &Value) -> f64 {
        value.as_f64().unwrap_or(f64::NAN)
    }

    #[test]
    fn test_mapper_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Mapper>();
    }

    #[test]
    fn test_empty_options_copy_every_field() {
        let source = Record::from_iter([
            ("name", Value::from("John")),
            ("age", Value::from(30)),
            ("email", Value::from("john@example.com")),
        ]);
        let target = Mapper::new(&MapOptions::new()).map(&source).unwrap();

        assert_eq!(target, source);
        assert!(!target.ptr_eq(&source));
        assert_eq!(target.keys(), source.keys());
    }

    #[test]
    fn test_exclusion_wins_over_rename_and_transform() {
        let source = Record::from_iter([("internalId", Value::from("123")), ("name", Value::from("John"))]);
        let options = MapOptions::new()
            .exclude("internalId")
            .rename("id", "internalId")
            .transform("id", Transform::leaf(|_| Value::from("leaked")));

        let target = Mapper::new(&options).map(&source).unwrap();
        assert_eq!(target.keys(), vec!["name"]);
    }

    #[test]
    fn test_first_declared_rename_wins() {
        let options = MapOptions::new()
            .rename("first", "shared")
            .rename("second", "shared");
        let mapper = Mapper::new(&options);

        assert_eq!(mapper.target_key("shared"), "first");
        assert_eq!(mapper.target_key("other"), "other");

        let source = Record::from_iter([("shared", 1)]);
        let target = mapper.map(&source).unwrap();
        assert_eq!(target.keys(), vec!["first"]);
    }

    #[test]
    fn test_rename_of_missing_field_produces_nothing() {
        let source = Record::from_iter([("a", 1)]);
        let target = Mapper::new(&MapOptions::new().rename("b", "missing")).map(&source).unwrap();

        assert_eq!(target.keys(), vec!["a"]);
    }

    #[test]
    fn test_transform_keyed_by_target_name() {
        let source = Record::from_iter([("amount_str", "100.50")]);
        let options = MapOptions::new()
            .rename("amount", "amount_str")
            .transform("amount", built_in::parse_float())
            .transform("amount_str", Transform::leaf(|_| Value::from("unused")));

        let target = Mapper::new(&options).map(&source).unwrap();
        assert_eq!(target.get("amount"), Some(Value::from(100.5)));
    }

    #[test]
    fn test_nested_transform_touches_only_matching_keys() {
        let nested = Record::from_iter([("value", 5), ("untouched", 10)]);
        let source = Record::from_iter([("nested", nested.clone())]);
        let options = MapOptions::new().transform(
            "nested",
            TransformSpec::new().with("value", Transform::leaf(|v| Value::from(number(&v) * 10.0))),
        );

        let target = Mapper::new(&options).map(&source).unwrap();
        let mapped = target.get("nested").unwrap();
        let mapped = mapped.as_record().unwrap();

        assert_eq!(mapped.get("value"), Some(Value::from(50)));
        assert_eq!(mapped.get("untouched"), Some(Value::from(10)));
        assert!(!mapped.ptr_eq(&nested));
        assert_eq!(nested.get("value"), Some(Value::from(5)));
    }

    #[test]
    fn test_nested_transform_over_array_of_records() {
        let items = Array::from_values(vec![
            Value::from(Record::from_iter([("price", 1)])),
            Value::from(Record::from_iter([("price", 2)])),
            Value::from("not a record"),
        ]);
        let source = Record::from_iter([("items", items)]);
        let options = MapOptions::new().transform(
            "items",
            TransformSpec::new().with("price", built_in::scale(100.0)),
        );

        let target = Mapper::new(&options).map(&source).unwrap();
        let expected = Value::from(vec![
            Value::from(Record::from_iter([("price", 100)])),
            Value::from(Record::from_iter([("price", 200)])),
            Value::from("not a record"),
        ]);
        assert_eq!(target.get("items"), Some(expected));
    }

    #[test]
    fn test_nested_transform_on_primitive_passes_through() {
        let source = Record::from_iter([("nested", 7)]);
        let options = MapOptions::new().transform(
            "nested",
            TransformSpec::new().with("value", Transform::leaf(|_| Value::Null)),
        );

        let target = Mapper::new(&options).map(&source).unwrap();
        assert_eq!(target.get("nested"), Some(Value::from(7)));
    }

    #[test]
    fn test_shallow_mapping_shares_nested_instances() {
        let nested = Record::from_iter([("v", 1)]);
        let born = Date::parse("1990-01-01").unwrap();
        let source = Record::from_iter([
            ("nested", Value::from(nested.clone())),
            ("born", Value::from(born.clone())),
        ]);

        let target = Mapper::new(&MapOptions::new()).map(&source).unwrap();
        assert!(target.get("nested").unwrap().same(&Value::from(nested)));
        assert!(target.get("born").unwrap().same(&Value::from(born)));
    }

    #[test]
    fn test_leaf_receives_deep_copy() {
        let nested = Record::from_iter([("v", 1)]);
        let source = Record::from_iter([("nested", nested.clone())]);
        let options = MapOptions::new().deep(true).transform(
            "nested",
            Transform::leaf(|v| {
                if let Some(record) = v.as_record() {
                    record.insert("v", 2);
                }
                v
            }),
        );

        let target = Mapper::new(&options).map(&source).unwrap();
        assert_eq!(nested.get("v"), Some(Value::from(1)));
        let mapped = target.get("nested").unwrap();
        assert_eq!(mapped.as_record().unwrap().get("v"), Some(Value::from(2)));
    }

    #[test]
    fn test_deep_nested_transform_detects_cycle() {
        let inner = Record::new();
        inner.insert("value", 1);
        inner.insert("back", inner.clone());
        let source = Record::from_iter([("inner", inner)]);
        let options = MapOptions::new()
            .deep(true)
            .transform("inner", TransformSpec::new().with("value", built_in::scale(2.0)));

        let err = Mapper::new(&options).map(&source).unwrap_err();
        match err {
            Error::CircularReference { path } => assert_eq!(path, "inner.back"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_shallow_nested_transform_tolerates_cycle() {
        let source = Record::new();
        source.insert("value", 1);
        source.insert("self", source.clone());
        let options = MapOptions::new().transform(
            "self",
            TransformSpec::new().with("self", TransformSpec::new().with("value", built_in::scale(3.0))),
        );

        let target = Mapper::new(&options).map(&source).unwrap();
        let level1 = target.get("self").unwrap();
        let level2 = level1.as_record().unwrap().get("self").unwrap();
        let level2 = level2.as_record().unwrap();

        assert_eq!(level2.get("value"), Some(Value::from(3)));
        assert!(level2.get("self").unwrap().same(&Value::from(source)));
    }

    #[test]
    fn test_shallow_nested_transform_tolerates_self_containing_array() {
        let items = Array::new();
        items.push(Record::from_iter([("price", 1)]));
        items.push(items.clone());
        let source = Record::from_iter([("items", items.clone())]);
        let options = MapOptions::new().transform(
            "items",
            TransformSpec::new().with("price", built_in::scale(2.0)),
        );

        let target = Mapper::new(&options).map(&source).unwrap();
        let mapped = target.get("items").unwrap();
        let mapped = mapped.as_array().unwrap();

        assert!(!mapped.ptr_eq(&items));
        let first = mapped.get(0).unwrap();
        assert_eq!(first.as_record().unwrap().get("price"), Some(Value::from(2)));
        assert!(mapped.get(1).unwrap().same(&Value::from(items.clone())));

        let err = Mapper::new(&options.deep(true)).map(&source).unwrap_err();
        match err {
            Error::CircularReference { path } => assert_eq!(path, "items[1]"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_transform_error_aborts_mapping() {
        let source = Record::from_iter([("a", "1"), ("b", "oops")]);
        let options = MapOptions::new()
            .transform("a", built_in::string_to_number())
            .transform("b", built_in::string_to_number());

        let err = Mapper::new(&options).map(&source).unwrap_err();
        match err {
            Error::Transform(inner) => {
                let conversion = inner.downcast_ref::<built_in::ConversionError>().unwrap();
                assert_eq!(conversion.from, "string");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_mapper_is_reusable_after_error() {
        let cyclic = Record::new();
        cyclic.insert("self", cyclic.clone());
        let plain = Record::from_iter([("nested", Record::from_iter([("v", 1)]))]);
        let mapper = Mapper::new(&MapOptions::new().deep(true));

        assert!(mapper.map(&cyclic).unwrap_err().is_circular_reference());
        let copy = mapper.map(&plain).unwrap();
        assert_eq!(copy, plain);
        assert!(!copy.get("nested").unwrap().same(&plain.get("nested").unwrap()));
    }
}
