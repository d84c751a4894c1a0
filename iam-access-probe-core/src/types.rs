//! Core types shared across the probe engine.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// The fixed S3 action vocabulary that can be probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Action {
    ListBucket,
    PutObject,
    GetObject,
    MultipartUpload,
    AbortMultipartUpload,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::ListBucket,
        Action::PutObject,
        Action::GetObject,
        Action::MultipartUpload,
        Action::AbortMultipartUpload,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ListBucket => "ListBucket",
            Action::PutObject => "PutObject",
            Action::GetObject => "GetObject",
            Action::MultipartUpload => "MultipartUpload",
            Action::AbortMultipartUpload => "AbortMultipartUpload",
        }
    }

    /// Whether the probe for this action addresses an object key rather than the bucket.
    pub fn targets_object(&self) -> bool {
        !matches!(self, Action::ListBucket)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| format!("unknown action '{s}'"))
    }
}

/// Expected allowed/denied value per action.
///
/// Keys are unique. Iteration follows insertion order, and replacing an existing
/// action keeps its original position so reports stay in declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionExpectation {
    entries: Vec<(Action, bool)>,
}

impl ActionExpectation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the expectation for `action`, replacing any previous value in place.
    pub fn insert(&mut self, action: Action, expected: bool) {
        match self.entries.iter_mut().find(|(a, _)| *a == action) {
            Some(entry) => entry.1 = expected,
            None => self.entries.push((action, expected)),
        }
    }

    pub fn get(&self, action: Action) -> Option<bool> {
        self.entries
            .iter()
            .find(|(a, _)| *a == action)
            .map(|(_, expected)| *expected)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Action, bool)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Actions of the vocabulary this expectation has no entry for.
    pub fn missing_actions(&self) -> Vec<Action> {
        Action::ALL
            .into_iter()
            .filter(|action| self.get(*action).is_none())
            .collect()
    }
}

impl FromIterator<(Action, bool)> for ActionExpectation {
    fn from_iter<I: IntoIterator<Item = (Action, bool)>>(iter: I) -> Self {
        let mut expectation = ActionExpectation::new();
        for (action, expected) in iter {
            expectation.insert(action, expected);
        }
        expectation
    }
}

/// How a resource is addressed when probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// A single object, probed at its own key.
    File,
    /// A key prefix, probed through a synthetic child object.
    Folder,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::File => "file",
            ResourceKind::Folder => "folder",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(ResourceKind::File),
            "folder" => Ok(ResourceKind::Folder),
            other => Err(format!(
                "unknown resource type '{other}' (expected 'file' or 'folder')"
            )),
        }
    }
}

/// Per-resource action overrides as declared in the matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOverrides {
    /// No `actions` entry: the defaults apply unchanged.
    Absent,
    Declared(ActionExpectation),
    /// An `actions` entry that is not a mapping of known actions to booleans.
    Malformed(String),
}

/// A named storage location under test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub path: String,
    pub kind: ResourceKind,
    pub actions: ActionOverrides,
}

impl ResourceDescriptor {
    pub fn new(path: impl Into<String>, kind: ResourceKind, actions: ActionOverrides) -> Self {
        Self {
            path: path.into(),
            kind,
            actions,
        }
    }
}

/// The resources an IAM profile declares, or why they cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceCatalog {
    /// Resources in declared order.
    Declared(Vec<ResourceDescriptor>),
    /// Missing or not a mapping; the whole profile is skipped.
    Invalid(String),
}

/// One set of credentials under test.
#[derive(Clone, PartialEq, Eq)]
pub struct IamProfile {
    pub name: String,
    pub access_key: String,
    pub secret_key: String,
    pub allowed_buckets: BTreeSet<String>,
    pub resources: ResourceCatalog,
}

impl IamProfile {
    pub fn is_bucket_allowed(&self, bucket: &str) -> bool {
        self.allowed_buckets.contains(bucket)
    }

    pub fn has_resource(&self, path: &str) -> bool {
        match &self.resources {
            ResourceCatalog::Declared(resources) => resources.iter().any(|r| r.path == path),
            ResourceCatalog::Invalid(_) => false,
        }
    }
}

// Secrets stay out of logs.
impl fmt::Debug for IamProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IamProfile")
            .field("name", &self.name)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("allowed_buckets", &self.allowed_buckets)
            .field("resources", &self.resources)
            .finish()
    }
}
