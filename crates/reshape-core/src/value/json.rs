//! Conversion between value graphs and `serde_json` documents
//!
//! JSON has no dates, no `undefined` and no shared references, so the
//! conversion is lossy in the same way `JSON.stringify` is: dates become
//! ISO 8601 strings, `undefined` record members are dropped, and a cyclic
//! graph cannot be serialised at all.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

use super::{Array, Record, Value};
use crate::clone::CloneContext;
use crate::{Error, Result};
use serde_json::{Map, Number, Value as JsonValue};

impl From<JsonValue> for Value {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect::<Array>())
            }
            JsonValue::Object(map) => Value::Object(map.into_iter().collect::<Record>()),
        }
    }
}

impl Value {
    /// Serialise this value graph into a JSON document
    ///
    /// Fails with [`Error::CircularReference`] if the graph contains a cycle.
    pub fn to_json(&self) -> Result<JsonValue> {
        let mut context = CloneContext::new(true);
        to_json_inner(self, &mut context)
    }
}

impl Record {
    /// Parse a JSON document whose root is an object
    pub fn from_json_str(input: &str) -> Result<Record> {
        let json: JsonValue = serde_json::from_str(input)?;
        match Value::from(json) {
            Value::Object(record) => Ok(record),
            other => Err(Error::Configuration {
                message: format!("expected a JSON object at the root, found {}", other.type_name()),
            }),
        }
    }

    /// Serialise this record into a JSON object
    pub fn to_json(&self) -> Result<JsonValue> {
        Value::Object(self.clone()).to_json()
    }
}

fn number_to_json(n: f64) -> JsonValue {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        JsonValue::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(JsonValue::Number).unwrap_or(JsonValue::Null)
    }
}

fn to_json_inner(value: &Value, context: &mut CloneContext) -> Result<JsonValue> {
    let json = match value {
        Value::Undefined | Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Date(d) => JsonValue::String(d.to_rfc3339()),
        Value::Array(array) => context.track(array.id(), |ctx| {
            array
                .to_vec()
                .iter()
                .enumerate()
                .map(|(index, item)| ctx.at_index(index, |ctx| to_json_inner(item, ctx)))
                .collect::<Result<Vec<_>>>()
                .map(JsonValue::Array)
        })?,
        Value::Object(record) => context.track(record.id(), |ctx| {
            let mut map = Map::new();
            for (key, item) in record.entries() {
                if item.is_undefined() {
                    continue;
                }
                let converted = ctx.at_key(&key, |ctx| to_json_inner(&item, ctx))?;
                map.insert(key, converted);
            }
            Ok(JsonValue::Object(map))
        })?,
    };
    Ok(json)
}
