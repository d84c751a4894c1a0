//! Scripted in-memory storage used by unit tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::storage::{ObjectStore, StorageError, StorageResult, StoreFactory, UploadedPart};
use crate::types::IamProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum StoreOp {
    ListObjects,
    PutObject,
    GetObject,
    CreateMultipartUpload,
    UploadPart,
    CompleteMultipartUpload,
    AbortMultipartUpload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StoreCall {
    pub iam: String,
    pub op: StoreOp,
    pub bucket: String,
    pub key: Option<String>,
}

/// Which calls a scripted store denies or answers incompletely.
#[derive(Debug, Clone, Default)]
pub(crate) struct Script {
    denied: HashSet<StoreOp>,
    denied_in: HashSet<(StoreOp, String)>,
    omit_upload_id: bool,
    omit_e_tag: bool,
}

impl Script {
    pub fn deny(mut self, op: StoreOp) -> Self {
        self.denied.insert(op);
        self
    }

    pub fn deny_in(mut self, op: StoreOp, bucket: &str) -> Self {
        self.denied_in.insert((op, bucket.to_string()));
        self
    }

    pub fn without_upload_id(mut self) -> Self {
        self.omit_upload_id = true;
        self
    }

    pub fn without_e_tag(mut self) -> Self {
        self.omit_e_tag = true;
        self
    }

    fn is_denied(&self, op: StoreOp, bucket: &str) -> bool {
        self.denied.contains(&op) || self.denied_in.contains(&(op, bucket.to_string()))
    }
}

pub(crate) struct ScriptedStore {
    iam: String,
    script: Script,
    calls: Arc<Mutex<Vec<StoreCall>>>,
    completed_parts: Mutex<Vec<String>>,
}

impl ScriptedStore {
    pub fn new(iam: &str, script: Script) -> Self {
        Self::with_log(iam, script, Arc::default())
    }

    fn with_log(iam: &str, script: Script, calls: Arc<Mutex<Vec<StoreCall>>>) -> Self {
        Self {
            iam: iam.to_string(),
            script,
            calls,
            completed_parts: Mutex::default(),
        }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn completed_parts(&self) -> Vec<String> {
        self.completed_parts.lock().unwrap().clone()
    }

    fn record(&self, op: StoreOp, bucket: &str, key: Option<&str>) -> StorageResult<()> {
        self.calls.lock().unwrap().push(StoreCall {
            iam: self.iam.clone(),
            op,
            bucket: bucket.to_string(),
            key: key.map(str::to_string),
        });
        if self.script.is_denied(op, bucket) {
            return Err(StorageError::new("AccessDenied", "Access Denied"));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for ScriptedStore {
    async fn list_objects(&self, bucket: &str) -> StorageResult<()> {
        self.record(StoreOp::ListObjects, bucket, None)
    }

    async fn put_object(&self, bucket: &str, key: &str, _body: &[u8]) -> StorageResult<()> {
        self.record(StoreOp::PutObject, bucket, Some(key))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.record(StoreOp::GetObject, bucket, Some(key))
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> StorageResult<Option<String>> {
        self.record(StoreOp::CreateMultipartUpload, bucket, Some(key))?;
        Ok((!self.script.omit_upload_id).then(|| format!("upload-{key}")))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        part_number: i32,
        _upload_id: &str,
        _body: &[u8],
    ) -> StorageResult<Option<String>> {
        self.record(StoreOp::UploadPart, bucket, Some(key))?;
        Ok((!self.script.omit_e_tag).then(|| format!("\"etag-{part_number}\"")))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        _upload_id: &str,
        parts: &[UploadedPart],
    ) -> StorageResult<()> {
        self.record(StoreOp::CompleteMultipartUpload, bucket, Some(key))?;
        self.completed_parts
            .lock()
            .unwrap()
            .extend(parts.iter().map(|part| part.e_tag.clone()));
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        _upload_id: &str,
    ) -> StorageResult<()> {
        self.record(StoreOp::AbortMultipartUpload, bucket, Some(key))
    }
}

/// Hands out scripted stores per IAM and shares one call log across them.
#[derive(Default)]
pub(crate) struct ScriptedFactory {
    scripts: HashMap<String, Script>,
    unreachable: HashSet<String>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
    connections: Mutex<Vec<String>>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, iam: &str, script: Script) -> Self {
        self.scripts.insert(iam.to_string(), script);
        self
    }

    /// Fail client construction for `iam`.
    pub fn unreachable(mut self, iam: &str) -> Self {
        self.unreachable.insert(iam.to_string());
        self
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn connections(&self) -> Vec<String> {
        self.connections.lock().unwrap().clone()
    }
}

#[async_trait]
impl StoreFactory for ScriptedFactory {
    async fn connect(&self, profile: &IamProfile) -> StorageResult<Box<dyn ObjectStore>> {
        self.connections.lock().unwrap().push(profile.name.clone());
        if self.unreachable.contains(&profile.name) {
            return Err(StorageError::new(
                "DispatchFailure",
                format!("could not reach endpoint for {}", profile.name),
            ));
        }
        let script = self.scripts.get(&profile.name).cloned().unwrap_or_default();
        Ok(Box::new(ScriptedStore::with_log(
            &profile.name,
            script,
            Arc::clone(&self.calls),
        )))
    }
}
