//! Built-in leaf transforms for common conversions
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

use super::Transform;
use crate::value::{Array, Date, Value};
use thiserror::Error;

/// A built-in conversion could not handle its input
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Type conversion failed: cannot convert {from} to {to} for value: {value}")]
pub struct ConversionError {
    pub from: String,
    pub to: String,
    pub value: String,
}

impl ConversionError {
    fn new(value: &Value, to: &str) -> Self {
        Self {
            from: value.type_name().to_string(),
            to: to.to_string(),
            value: format!("{:?}", value),
        }
    }
}

/// Lenient number parsing with `parseFloat` semantics
///
/// Numbers pass through. Strings yield their longest leading decimal prefix
/// after leading whitespace, so `"100.50 EUR"` becomes `100.5`. Anything that
/// does not start with a number becomes `NaN`. Never fails.
pub fn parse_float() -> Transform {
    Transform::leaf(|value| match value {
        Value::Number(n) => Value::Number(n),
        Value::String(s) => Value::Number(parse_float_prefix(&s)),
        _ => Value::Number(f64::NAN),
    })
}

/// Strict string to number conversion
///
/// The whole (trimmed) string must be a number. Numbers pass through; any
/// other input fails with [`ConversionError`].
pub fn string_to_number() -> Transform {
    Transform::try_leaf(|value| match value {
        Value::Number(n) => Ok(Value::Number(n)),
        Value::String(ref s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Number)
            .map_err(|_| ConversionError::new(&value, "number")),
        other => Err(ConversionError::new(&other, "number")),
    })
}

/// Convert strings and epoch milliseconds into dates
///
/// Strings are read with [`Date::parse`]. Dates pass through unchanged.
pub fn to_date() -> Transform {
    Transform::try_leaf(|value| match value {
        Value::Date(date) => Ok(Value::Date(date)),
        Value::String(ref s) => Date::parse(s)
            .map(Value::Date)
            .ok_or_else(|| ConversionError::new(&value, "date")),
        Value::Number(n) if n.is_finite() && n.fract() == 0.0 => Date::from_timestamp_millis(n as i64)
            .map(Value::Date)
            .ok_or_else(|| ConversionError::new(&value, "date")),
        other => Err(ConversionError::new(&other, "date")),
    })
}

/// Render primitives and dates as strings
///
/// Records and arrays pass through unchanged.
pub fn to_string_value() -> Transform {
    Transform::leaf(|value| match value {
        Value::Undefined => Value::from("undefined"),
        Value::Null => Value::from("null"),
        Value::Bool(b) => Value::from(b.to_string()),
        Value::Number(n) => Value::from(format_number(n)),
        Value::Date(d) => Value::from(d.to_rfc3339()),
        other => other,
    })
}

/// Linear conversion: `output = input * scale + offset`
///
/// Non-numeric input passes through unchanged.
pub fn linear(scale: f64, offset: f64) -> Transform {
    Transform::leaf(move |value| match value {
        Value::Number(n) => Value::Number(n * scale + offset),
        other => other,
    })
}

/// Multiply numbers by `factor`
pub fn scale(factor: f64) -> Transform {
    linear(factor, 0.0)
}

/// Replace `null` and `undefined` with `default`
///
/// The default is described as JSON so every replacement is a fresh value
/// graph, never an instance shared between results.
pub fn default_value(default: impl Into<serde_json::Value>) -> Transform {
    let default = default.into();
    Transform::leaf(move |value| {
        if value.is_nullish() {
            Value::from(default.clone())
        } else {
            value
        }
    })
}

/// Apply `f` to every element of an array, producing a new array
///
/// Non-array input passes through unchanged.
pub fn each<F>(f: F) -> Transform
where
    F: Fn(Value) -> Value + Send + Sync + 'static,
{
    Transform::leaf(move |value| match value {
        Value::Array(items) => Value::Array(items.to_vec().into_iter().map(&f).collect::<Array>()),
        other => other,
    })
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        n.to_string()
    }
}

fn parse_float_prefix(input: &str) -> f64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut pos = 0;

    let negative = match bytes.first() {
        Some(b'-') => {
            pos += 1;
            true
        }
        Some(b'+') => {
            pos += 1;
            false
        }
        _ => false,
    };

    if s[pos..].starts_with("Infinity") {
        return if negative { f64::NEG_INFINITY } else { f64::INFINITY };
    }

    let int_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    let int_digits = &s[int_start..pos];

    let mut frac_digits = "";
    if pos < bytes.len() && bytes[pos] == b'.' {
        let frac_start = pos + 1;
        let mut end = frac_start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        frac_digits = &s[frac_start..end];
        pos = end;
    }

    if int_digits.is_empty() && frac_digits.is_empty() {
        return f64::NAN;
    }

    let mut exponent = String::new();
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut end = pos + 1;
        let mut candidate = String::from("e");
        if end < bytes.len() && (bytes[end] == b'-' || bytes[end] == b'+') {
            candidate.push(bytes[end] as char);
            end += 1;
        }
        let digits_start = end;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end > digits_start {
            candidate.push_str(&s[digits_start..end]);
            exponent = candidate;
        }
    }

    let normalized = format!(
        "{}{}.{}{}",
        if negative { "-" } else { "" },
        if int_digits.is_empty() { "0" } else { int_digits },
        if frac_digits.is_empty() { "0" } else { frac_digits },
        exponent
    );
    normalized.parse::<f64>().unwrap_or(f64::NAN)
}
