//! Dynamic value graph the mapper reads and produces
//!
//! Records, arrays and dates are shared handles: cloning a handle shares the
//! underlying instance, the way object references behave in a dynamic
//! language. Records and arrays are interior-mutable so that cyclic graphs
//! (a record holding itself) can be built.
//!
//! Equality (`==`) is structural and terminates on cyclic graphs. Identity is
//! available through [`Value::same`] and the `ptr_eq` methods of each handle.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

pub mod json;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// A dynamically typed value
#[derive(Clone, Default)]
pub enum Value {
    /// Absent value, distinct from `Null`
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(Date),
    Array(Array),
    Object(Record),
}

/// Ordered string-keyed record with reference semantics
#[derive(Clone, Default)]
pub struct Record(Rc<RefCell<IndexMap<String, Value>>>);

/// Array with reference semantics
#[derive(Clone, Default)]
pub struct Array(Rc<RefCell<Vec<Value>>>);

/// A point in time with reference semantics
///
/// Two `Date` handles may hold the same instant and still be distinct
/// instances; deep cloning relies on that distinction.
#[derive(Clone)]
pub struct Date(Rc<DateTime<Utc>>);

impl Value {
    /// Identity comparison: primitives by value, handles by instance
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a.ptr_eq(b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// `Null` or `Undefined`
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&Date> {
        match self {
            Value::Date(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Object(r) => Some(r),
            _ => None,
        }
    }

    /// Short type label used in conversion errors and log lines
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a field, returning the previous value
    ///
    /// Overwriting keeps the key at its original position.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.borrow_mut().insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    /// Remove a field, preserving the order of the remaining ones
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Snapshot of the fields in insertion order
    ///
    /// The snapshot holds shared handles, so the record may be mutated while
    /// the snapshot is being walked.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Whether both handles point at the same record instance
    pub fn ptr_eq(&self, other: &Record) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl Array {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(values)))
    }

    pub fn push(&self, value: impl Into<Value>) {
        self.0.borrow_mut().push(value.into());
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// Snapshot of the elements
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &Array) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn id(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl Date {
    pub fn new(instant: DateTime<Utc>) -> Self {
        Self(Rc::new(instant))
    }

    /// Build a date from milliseconds since the Unix epoch
    pub fn from_timestamp_millis(millis: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp_millis(millis).map(Self::new)
    }

    /// Parse an RFC 3339 timestamp, a naive `YYYY-MM-DDTHH:MM:SS[.fff]`
    /// timestamp (read as UTC) or a bare `YYYY-MM-DD` date (UTC midnight)
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if let Ok(instant) = DateTime::parse_from_rfc3339(input) {
            return Some(Self::new(instant.with_timezone(&Utc)));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(Self::new(Utc.from_utc_datetime(&naive)));
        }
        NaiveDate::parse_from_str(input, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| Self::new(Utc.from_utc_datetime(&naive)))
    }

    pub fn instant(&self) -> DateTime<Utc> {
        *self.0
    }

    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// ISO 8601 form with millisecond precision, e.g. `2024-01-01T00:00:00.000Z`
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// A new instance holding the same instant
    pub fn duplicate(&self) -> Self {
        Self::new(self.instant())
    }

    pub fn ptr_eq(&self, other: &Date) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let map = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect::<IndexMap<_, _>>();
        Self(Rc::new(RefCell::new(map)))
    }
}

impl<V: Into<Value>> FromIterator<V> for Array {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::from_values(iter.into_iter().map(Into::into).collect())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Date> for Value {
    fn from(d: Date) -> Self {
        Value::Date(d)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(instant: DateTime<Utc>) -> Self {
        Value::Date(Date::new(instant))
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::Array(Array::from_values(values))
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Object(r)
    }
}

// Structural equality. Pairs of containers already under comparison are
// assumed equal so that cyclic graphs terminate.
fn structural_eq(a: &Value, b: &Value, seen: &mut HashSet<(usize, usize)>) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => x == y || (x.is_nan() && y.is_nan()),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Date(x), Value::Date(y)) => x.instant() == y.instant(),
        (Value::Array(x), Value::Array(y)) => {
            if x.ptr_eq(y) || !seen.insert((x.id(), y.id())) {
                return true;
            }
            let (left, right) = (x.to_vec(), y.to_vec());
            left.len() == right.len()
                && left
                    .iter()
                    .zip(right.iter())
                    .all(|(l, r)| structural_eq(l, r, seen))
        }
        (Value::Object(x), Value::Object(y)) => records_eq(x, y, seen),
        _ => false,
    }
}

fn records_eq(x: &Record, y: &Record, seen: &mut HashSet<(usize, usize)>) -> bool {
    if x.ptr_eq(y) || !seen.insert((x.id(), y.id())) {
        return true;
    }
    let left = x.entries();
    left.len() == y.len()
        && left.iter().all(|(key, value)| match y.get(key) {
            Some(other) => structural_eq(value, &other, seen),
            None => false,
        })
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        structural_eq(self, other, &mut HashSet::new())
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        records_eq(self, other, &mut HashSet::new())
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        structural_eq(
            &Value::Array(self.clone()),
            &Value::Array(other.clone()),
            &mut HashSet::new(),
        )
    }
}

impl PartialEq for Date {
    fn eq(&self, other: &Self) -> bool {
        self.instant() == other.instant()
    }
}

thread_local! {
    static DEBUG_ACTIVE: RefCell<HashSet<usize>> = RefCell::new(HashSet::new());
}

// Formats a container unless it is already being formatted further up the
// stack, in which case `[Circular]` is written instead.
fn debug_guarded(
    id: usize,
    f: &mut fmt::Formatter<'_>,
    body: impl FnOnce(&mut fmt::Formatter<'_>) -> fmt::Result,
) -> fmt::Result {
    struct Release(usize);

    impl Drop for Release {
        fn drop(&mut self) {
            DEBUG_ACTIVE.with(|active| active.borrow_mut().remove(&self.0));
        }
    }

    let entered = DEBUG_ACTIVE.with(|active| active.borrow_mut().insert(id));
    if !entered {
        return f.write_str("[Circular]");
    }
    let _release = Release(id);
    body(f)
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_guarded(self.id(), f, |f| f.debug_map().entries(self.entries()).finish())
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_guarded(self.id(), f, |f| f.debug_list().entries(self.to_vec()).finish())
    }
}

impl fmt::Debug for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Date({})", self.to_rfc3339())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Date(d) => fmt::Debug::fmt(d, f),
            Value::Array(a) => fmt::Debug::fmt(a, f),
            Value::Object(r) => fmt::Debug::fmt(r, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person() -> Record {
        Record::from_iter([("name", Value::from("John")), ("age", Value::from(30))])
    }

    #[test]
    fn test_record_preserves_insertion_order() {
        let record = Record::new();
        record.insert("b", 1);
        record.insert("a", 2);
        record.insert("c", 3);
        record.insert("b", 4);

        assert_eq!(record.keys(), vec!["b", "a", "c"]);
        assert_eq!(record.get("b"), Some(Value::Number(4.0)));

        record.remove("a");
        assert_eq!(record.keys(), vec!["b", "c"]);
    }

    #[test]
    fn test_handles_share_instances() {
        let record = person();
        let alias = record.clone();
        alias.insert("email", "john@example.com");

        assert!(record.ptr_eq(&alias));
        assert!(record.contains_key("email"));
    }

    #[test]
    fn test_structural_equality_ignores_identity_and_key_order() {
        let left = person();
        let right = Record::from_iter([("age", Value::from(30)), ("name", Value::from("John"))]);

        assert_eq!(left, right);
        assert!(!Value::from(left.clone()).same(&Value::from(right)));
        assert!(Value::from(left.clone()).same(&Value::from(left)));
    }

    #[test]
    fn test_structural_equality_on_cycles_terminates() {
        let a = Record::new();
        a.insert("self", a.clone());
        let b = Record::new();
        b.insert("self", b.clone());

        assert_eq!(a, b);

        b.insert("extra", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_debug_marks_back_references() {
        let record = Record::new();
        record.insert("id", 1);
        record.insert("self", record.clone());

        let rendered = format!("{:?}", record);
        assert_eq!(rendered, r#"{"id": 1, "self": [Circular]}"#);
    }

    #[test]
    fn test_debug_releases_container_after_panic() {
        struct Failing(usize);

        impl fmt::Debug for Failing {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                debug_guarded(self.0, f, |_| panic!("formatting failed"))
            }
        }

        let record = person();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            format!("{:?}", Failing(record.id()))
        }));

        assert!(outcome.is_err());
        assert_eq!(format!("{:?}", record), r#"{"name": "John", "age": 30}"#);
    }

    #[test]
    fn test_date_parse_formats() {
        let day = Date::parse("2024-01-01").unwrap();
        assert_eq!(day.to_rfc3339(), "2024-01-01T00:00:00.000Z");

        let stamped = Date::parse("2024-01-01T12:30:00+02:00").unwrap();
        assert_eq!(stamped.to_rfc3339(), "2024-01-01T10:30:00.000Z");

        let naive = Date::parse("2024-01-01T12:30:00.250").unwrap();
        assert_eq!(naive.timestamp_millis() % 1000, 250);

        assert!(Date::parse("yesterday").is_none());
    }

    #[test]
    fn test_date_duplicate_is_new_instance() {
        let date = Date::parse("1990-01-01").unwrap();
        let copy = date.duplicate();

        assert_eq!(date, copy);
        assert!(!date.ptr_eq(&copy));
    }

    #[test]
    fn test_nan_equality_is_structural_but_not_identity() {
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert!(!Value::Number(f64::NAN).same(&Value::Number(f64::NAN)));
    }
}
