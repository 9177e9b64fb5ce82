//! Reshape Core - structural record mapping
//!
//! This crate produces a new record from a source record by dropping fields,
//! renaming fields and transforming field values, optionally as a deep copy
//! with circular-reference detection.
//!
//! # Main Components
//!
//! - **Values**: a dynamic record model with reference semantics ([`Value`], [`Record`])
//! - **Options**: exclusion list, rename table, transform table and `deep` flag ([`MapOptions`])
//! - **Transforms**: leaf functions and nested tables ([`Transform`], [`TransformSpec`])
//! - **Mapper**: the compiled, reusable mapping operation ([`Mapper`])
//! - **Error Handling**: error types using `thiserror` and `anyhow` ([`Error`])
//!
//! # Example
//!
//! ```
//! use reshape_core::{map, MapOptions, Record, Value};
//! use reshape_core::transform::built_in;
//!
//! fn example() -> reshape_core::Result<()> {
//!     let source = Record::from_iter([
//!         ("full_name", Value::from("John Doe")),
//!         ("amount", Value::from("100.50")),
//!         ("internalId", Value::from("x-1")),
//!     ]);
//!
//!     let options = MapOptions::new()
//!         .exclude("internalId")
//!         .rename("name", "full_name")
//!         .transform("amount", built_in::parse_float());
//!
//!     let target = map(&source, &options)?;
//!     assert_eq!(target.get("name"), Some(Value::from("John Doe")));
//!     assert_eq!(target.get("amount"), Some(Value::from(100.5)));
//!     assert!(!target.contains_key("internalId"));
//!     Ok(())
//! }
//! # example().unwrap();
//! ```

pub mod clone;
pub mod error;
pub mod mapper;
pub mod options;
pub mod transform;
pub mod value;

// Re-export main types for convenience
pub use clone::CloneContext;
pub use error::{Error, Result};
pub use mapper::Mapper;
pub use options::MapOptions;
pub use transform::{ConversionError, Transform, TransformFn, TransformSpec};
pub use value::{Array, Date, Record, Value};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Map `source` into a new record according to `options`
///
/// One-shot form of [`Mapper::map`]. Build a [`Mapper`] instead when the same
/// options are applied to many records.
pub fn map(source: &Record, options: &MapOptions) -> Result<Record> {
    Mapper::new(options).map(source)
}
