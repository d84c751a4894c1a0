//! Expectation matrix loading and validation.
//!
//! Validation happens once, at load time, at two levels:
//! - Top-level violations (unparseable JSON, missing keys, incomplete default
//!   permissions) are fatal and returned as [`AccessProbeError`].
//! - Per-IAM and per-resource violations are recorded as [`SkippedEntry`] values
//!   so the rest of the matrix can still be probed.

use log::warn;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::Path;

use crate::error::{AccessProbeError, AccessProbeResult};
use crate::report::SkippedEntry;
use crate::types::{
    Action, ActionExpectation, ActionOverrides, IamProfile, ResourceCatalog, ResourceDescriptor,
    ResourceKind,
};

#[derive(Deserialize)]
struct RawMatrix {
    buckets: Vec<String>,
    resources: Vec<String>,
    default_expected_permissions: Map<String, Value>,
    iams: Map<String, Value>,
}

/// The declarative expectation matrix for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectationMatrix {
    /// Buckets in declared order.
    pub buckets: Vec<String>,
    /// Catalog of resource names, used when catalog expansion is enabled.
    pub resources: Vec<String>,
    /// Covers every action of the vocabulary.
    pub default_expected_permissions: ActionExpectation,
    /// Valid IAM profiles in declared order.
    pub iams: Vec<IamProfile>,
    /// Entries rejected while loading.
    pub skipped: Vec<SkippedEntry>,
}

impl ExpectationMatrix {
    /// Read and validate a matrix file.
    pub fn from_path(path: impl AsRef<Path>) -> AccessProbeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AccessProbeError::io("read expectation matrix", path, e))?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> AccessProbeResult<Self> {
        let raw: RawMatrix = serde_json::from_str(content)?;

        let default_expected_permissions =
            parse_default_permissions(&raw.default_expected_permissions)?;

        let mut iams = Vec::with_capacity(raw.iams.len());
        let mut skipped = Vec::new();
        for (name, value) in &raw.iams {
            match parse_iam_profile(name, value, &mut skipped) {
                Ok(profile) => iams.push(profile),
                Err(reason) => {
                    warn!("Skipping IAM '{}': {}", name, reason);
                    skipped.push(SkippedEntry::iam(name.as_str(), reason));
                }
            }
        }

        Ok(Self {
            buckets: raw.buckets,
            resources: raw.resources,
            default_expected_permissions,
            iams,
            skipped,
        })
    }
}

fn parse_default_permissions(raw: &Map<String, Value>) -> AccessProbeResult<ActionExpectation> {
    let defaults = parse_action_map(raw).map_err(|reason| {
        AccessProbeError::configuration(format!("default_expected_permissions: {reason}"))
    })?;

    let missing = defaults.missing_actions();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(Action::as_str).collect();
        return Err(AccessProbeError::configuration(format!(
            "default_expected_permissions is missing an expectation for: {}",
            names.join(", ")
        )));
    }

    Ok(defaults)
}

/// Parse a JSON object of action name to boolean, keeping declared order.
fn parse_action_map(raw: &Map<String, Value>) -> Result<ActionExpectation, String> {
    let mut expectation = ActionExpectation::new();
    for (name, value) in raw {
        let action: Action = name.parse()?;
        let expected = value
            .as_bool()
            .ok_or_else(|| format!("expectation for '{name}' must be a boolean, got {value}"))?;
        expectation.insert(action, expected);
    }
    Ok(expectation)
}

fn required_str<'a>(entry: &'a Map<String, Value>, key: &str) -> Result<&'a str, String> {
    match entry.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(format!("'{key}' must be a string")),
        None => Err(format!("missing '{key}'")),
    }
}

/// A credential field: a string with at least one non-whitespace character.
fn required_credential<'a>(entry: &'a Map<String, Value>, key: &str) -> Result<&'a str, String> {
    let value = required_str(entry, key)?;
    if value.trim().is_empty() {
        return Err(format!("'{key}' must not be blank"));
    }
    Ok(value)
}

fn parse_iam_profile(
    name: &str,
    value: &Value,
    skipped: &mut Vec<SkippedEntry>,
) -> Result<IamProfile, String> {
    let entry = value
        .as_object()
        .ok_or_else(|| "IAM entry must be a mapping".to_string())?;

    let access_key = required_credential(entry, "key")?.to_string();
    let secret_key = required_credential(entry, "secret")?.to_string();

    let allowed_buckets = match entry.get("allowed_buckets") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| "'allowed_buckets' must only contain strings".to_string())
            })
            .collect::<Result<BTreeSet<_>, _>>()?,
        Some(_) => return Err("'allowed_buckets' must be a list of bucket names".to_string()),
        None => BTreeSet::new(),
    };

    let resources = match entry.get("resources") {
        Some(Value::Object(resources)) => {
            ResourceCatalog::Declared(parse_resources(name, resources, skipped))
        }
        Some(_) => ResourceCatalog::Invalid("'resources' must be a mapping".to_string()),
        None => ResourceCatalog::Invalid("no 'resources' mapping".to_string()),
    };

    Ok(IamProfile {
        name: name.to_string(),
        access_key,
        secret_key,
        allowed_buckets,
        resources,
    })
}

fn parse_resources(
    iam: &str,
    raw: &Map<String, Value>,
    skipped: &mut Vec<SkippedEntry>,
) -> Vec<ResourceDescriptor> {
    let mut resources = Vec::with_capacity(raw.len());
    for (path, value) in raw {
        match parse_resource(path, value) {
            Ok(resource) => resources.push(resource),
            Err(reason) => {
                warn!("Skipping resource '{}' of IAM '{}': {}", path, iam, reason);
                skipped.push(SkippedEntry::resource(iam, None, path.as_str(), reason));
            }
        }
    }
    resources
}

fn parse_resource(path: &str, value: &Value) -> Result<ResourceDescriptor, String> {
    let entry = value
        .as_object()
        .ok_or_else(|| "resource entry must be a mapping".to_string())?;

    let kind: ResourceKind = required_str(entry, "type")?.parse()?;

    let actions = match entry.get("actions") {
        None | Some(Value::Null) => ActionOverrides::Absent,
        Some(Value::Object(raw)) => match parse_action_map(raw) {
            Ok(expectation) => ActionOverrides::Declared(expectation),
            Err(reason) => ActionOverrides::Malformed(reason),
        },
        Some(_) => ActionOverrides::Malformed(
            "'actions' must be a mapping of action to boolean".to_string(),
        ),
    };

    Ok(ResourceDescriptor::new(path, kind, actions))
}
