//! IAM Access Probe Service Layer
//!
//! This module provides the service that drives a full probing run. The service
//! holds the storage client factory and the run options; adapters (the CLI, tests)
//! hand it a loaded expectation matrix and receive the resulting report.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::probe::DEFAULT_PROBE_FILE_NAME;
use crate::storage::StoreFactory;

/// Options controlling a probing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// Probe every catalog resource, not only the ones each IAM declares.
    pub expand_catalog: bool,
    /// Child object name used to probe folder resources.
    pub probe_file_name: String,
    /// Consecutive client construction failures after which the run stops.
    pub max_consecutive_client_failures: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            expand_catalog: false,
            probe_file_name: DEFAULT_PROBE_FILE_NAME.to_string(),
            max_consecutive_client_failures: 3,
        }
    }
}

/// Main service struct that holds the client factory and runs the reconciliation
pub struct AccessProbeService<F> {
    pub(crate) factory: F,
    pub(crate) options: RunOptions,
    pub(crate) abort: Arc<AtomicBool>,
}

impl<F: StoreFactory> AccessProbeService<F> {
    pub fn new(factory: F, options: RunOptions) -> Self {
        Self {
            factory,
            options,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the run before the next IAM profile once set.
    ///
    /// Probes already in flight, including multipart sequences, run to completion.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub(crate) fn abort_requested(&self) -> bool {
        self.abort.load(Ordering::SeqCst)
    }

    // run() method implementation is in run.rs
}
