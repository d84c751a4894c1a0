//! This crate provides the core logic for IAM access probing:
//! - Expectation matrix loading and validation
//! - Effective expectation resolution and resource catalog expansion
//! - S3 action probes behind a storage capability
//! - Reconciliation of probe outcomes into a mismatch report
//!

mod catalog;
pub mod commands;
mod error;
mod matrix;
mod probe;
mod report;
mod resolve;
pub mod storage;
#[cfg(test)]
mod testing;
mod types;

// Re-exports for a small, focused public API
pub use catalog::expand;
pub use commands::{AccessProbeService, RunOptions};
pub use error::{AccessProbeError, AccessProbeResult};
pub use matrix::ExpectationMatrix;
pub use probe::{
    probe_key, ProbeOutcome, ProbePayload, Prober, DEFAULT_PROBE_FILE_NAME, MISSING_PART_TAG,
    MISSING_UPLOAD_SESSION,
};
pub use report::{
    format_entry, format_report, MismatchEntry, Report, SkippedEntry, NO_MISMATCHES_LINE,
};
pub use resolve::{resolve, MalformedInputError};
pub use storage::s3::{S3StoreFactory, DEFAULT_REGION};
pub use storage::{ObjectStore, StorageError, StorageResult, StoreFactory, UploadedPart};
pub use types::{
    Action, ActionExpectation, ActionOverrides, IamProfile, ResourceCatalog, ResourceDescriptor,
    ResourceKind,
};
