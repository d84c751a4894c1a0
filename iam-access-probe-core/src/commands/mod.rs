//! Commands module - service layer for IAM access probing runs

mod run;
pub(crate) mod service;

pub use service::{AccessProbeService, RunOptions};
