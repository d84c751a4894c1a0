//! Error types for the IAM access probe core.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors that stop a run before any probe is issued.
///
/// Probe failures are not represented here: a denied or failed storage call is
/// data and ends up in the [`Report`](crate::Report).
#[derive(Debug, Error)]
pub enum AccessProbeError {
    /// The expectation matrix failed structural validation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The expectation matrix is not valid JSON or misses a required top-level key.
    #[error("Configuration error: invalid expectation matrix: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading the matrix or managing the probe payload artifact failed.
    #[error("Failed to {operation} '{path}': {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AccessProbeError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

pub type AccessProbeResult<T> = Result<T, AccessProbeError>;
