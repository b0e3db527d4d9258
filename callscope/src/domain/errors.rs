//! Structured error types for callscope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//!
//! Only two failures are allowed to surface as errors: an unusable filter
//! policy at load time and a failed export. Everything else in the
//! correlation path (malformed records, mismatched exits, evicted frames)
//! is folded into diagnostic counters and never stops the stream.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("Invalid {scope} pattern `{pattern}`: {source}")]
    InvalidPattern {
        scope: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to read policy document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse policy document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to serialize graph snapshot: {0}")]
    SerializationFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
