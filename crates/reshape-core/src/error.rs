//! Error types for the Reshape core library
//!
//! Mapping is permissive: unknown keys, dangling renames and mismatched
//! transforms never fail. The only failure the mapper raises on its own is a
//! circular reference met while deep cloning. Failures raised by
//! caller-supplied transforms are carried through untouched.

use thiserror::Error;

/// Main error type for Reshape operations
#[derive(Error, Debug)]
pub enum Error {
    /// A deep clone reached a record or array that is already being cloned
    #[error("Circular reference detected during deep cloning at '{path}'")]
    CircularReference {
        /// Key path from the source root to the back-reference
        path: String,
    },

    /// A caller-supplied transform failed
    ///
    /// The wrapped error is the one the transform returned; its message and
    /// source chain are forwarded as-is, and `downcast_ref` recovers the
    /// original type.
    #[error(transparent)]
    Transform(anyhow::Error),

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Malformed declarative configuration or input document
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error was raised by cycle detection
    pub fn is_circular_reference(&self) -> bool {
        matches!(self, Error::CircularReference { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}
