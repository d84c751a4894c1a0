//! Effective expectation resolution for one (iam, bucket, resource) triple.

use thiserror::Error;

use crate::types::{ActionExpectation, ActionOverrides};

/// A resource override that cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed action overrides: {reason}")]
pub struct MalformedInputError {
    pub reason: String,
}

/// Merge `defaults` with a resource's overrides.
///
/// Overrides only apply when the bucket is in the IAM's allow-list; otherwise the
/// defaults are returned unchanged, whatever the overrides contain. Overridden
/// actions keep their default position, new ones are appended.
pub fn resolve(
    defaults: &ActionExpectation,
    overrides: &ActionOverrides,
    bucket_is_allowed: bool,
) -> Result<ActionExpectation, MalformedInputError> {
    let mut effective = defaults.clone();
    if !bucket_is_allowed {
        return Ok(effective);
    }

    match overrides {
        ActionOverrides::Absent => {}
        ActionOverrides::Declared(declared) => {
            for (action, expected) in declared.iter() {
                effective.insert(action, expected);
            }
        }
        ActionOverrides::Malformed(reason) => {
            return Err(MalformedInputError {
                reason: reason.clone(),
            })
        }
    }

    Ok(effective)
}
