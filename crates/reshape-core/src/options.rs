//! Mapping configuration
//!
//! `MapOptions` is plain input: built once by the caller, read by the mapper
//! and never mutated by it. The declarative part (`exclude`, `fieldMappings`,
//! `deep`) can be loaded from JSON; transforms are functions and are attached
//! in code.
//!
//! Copyright (c) 2025 Reshape Team
//! Licensed under the Apache-2.0 license

use crate::transform::{Transform, TransformSpec};
use crate::Result;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Configuration for a mapping call
///
/// # Examples
///
/// ```
/// use reshape_core::MapOptions;
/// use reshape_core::transform::built_in;
///
/// let options = MapOptions::new()
///     .exclude("internalId")
///     .rename("name", "full_name")
///     .transform("amount", built_in::parse_float())
///     .deep(true);
///
/// assert!(options.deep);
/// assert_eq!(options.field_mappings.get("name").map(String::as_str), Some("full_name"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapOptions {
    /// Source keys dropped from the output
    pub exclude: IndexSet<String>,

    /// Rename table: target key to source key
    pub field_mappings: IndexMap<String, String>,

    /// Transform table keyed by resolved target key
    #[serde(skip)]
    pub transforms: TransformSpec,

    /// Copy nested records, arrays and dates instead of sharing them
    pub deep: bool,
}

impl MapOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the declarative part of the configuration from JSON
    ///
    /// Recognised keys are `exclude`, `fieldMappings` and `deep`; all are
    /// optional.
    pub fn from_json_str(input: &str) -> Result<Self> {
        Ok(serde_json::from_str(input)?)
    }

    /// Drop `key` from the output
    pub fn exclude(mut self, key: impl Into<String>) -> Self {
        self.exclude.insert(key.into());
        self
    }

    /// Write the source field `source` under `target`
    pub fn rename(mut self, target: impl Into<String>, source: impl Into<String>) -> Self {
        self.field_mappings.insert(target.into(), source.into());
        self
    }

    /// Apply `transform` to the field written under `key`
    pub fn transform(mut self, key: impl Into<String>, transform: impl Into<Transform>) -> Self {
        self.transforms.insert(key, transform);
        self
    }

    /// Replace the whole transform table
    pub fn with_transforms(mut self, transforms: TransformSpec) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }
}
