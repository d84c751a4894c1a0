//! Action probes: one storage operation sequence per action.
//!
//! A probe never fails: every storage error becomes a failed [`ProbeOutcome`].
//! Calls that succeed but lack a field the next step needs (no upload id, no part
//! ETag) are reported with their own error kind so they can be told apart from
//! permission denials.

use log::{debug, warn};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

use crate::error::{AccessProbeError, AccessProbeResult};
use crate::storage::{ObjectStore, StorageError, UploadedPart};
use crate::types::{Action, ResourceKind};

/// Name of the synthetic child object used to probe folder resources.
pub const DEFAULT_PROBE_FILE_NAME: &str = "test_file";

/// Error kind for a multipart initiation that returned no upload id.
pub const MISSING_UPLOAD_SESSION: &str = "MissingUploadSession";

/// Error kind for a part upload that returned no ETag.
pub const MISSING_PART_TAG: &str = "MissingPartTag";

const PROBE_PART_NUMBER: i32 = 1;

/// The observed result of one probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub succeeded: bool,
    pub error_message: Option<String>,
    pub error_detail_path: Option<String>,
    pub error_kind: Option<String>,
}

impl ProbeOutcome {
    pub fn passed() -> Self {
        Self {
            succeeded: true,
            error_message: None,
            error_detail_path: None,
            error_kind: None,
        }
    }

    pub fn failed(
        message: impl Into<String>,
        detail_path: Option<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            succeeded: false,
            error_message: Some(message.into()),
            error_detail_path: detail_path,
            error_kind: Some(kind.into()),
        }
    }
}

#[derive(Debug)]
enum ProbeFailure {
    Storage(StorageError),
    MissingUploadSession,
    MissingPartTag,
}

impl From<StorageError> for ProbeFailure {
    fn from(err: StorageError) -> Self {
        ProbeFailure::Storage(err)
    }
}

impl ProbeFailure {
    fn into_outcome(self, detail_path: Option<String>) -> ProbeOutcome {
        match self {
            ProbeFailure::Storage(err) => ProbeOutcome::failed(err.message, detail_path, err.kind),
            ProbeFailure::MissingUploadSession => ProbeOutcome::failed(
                "No UploadId received from S3",
                detail_path,
                MISSING_UPLOAD_SESSION,
            ),
            ProbeFailure::MissingPartTag => ProbeOutcome::failed(
                format!("No ETag received from S3 for part {PROBE_PART_NUMBER}"),
                detail_path,
                MISSING_PART_TAG,
            ),
        }
    }
}

/// Object key probed for a resource.
pub fn probe_key(resource_path: &str, kind: ResourceKind, probe_file_name: &str) -> String {
    match kind {
        ResourceKind::Folder => format!("{resource_path}/{probe_file_name}"),
        ResourceKind::File => resource_path.to_string(),
    }
}

/// Temporary file holding the body written by upload probes.
///
/// Created once per run; the file is removed when the payload is dropped.
pub struct ProbePayload {
    file: NamedTempFile,
    body: Vec<u8>,
}

impl ProbePayload {
    pub const CONTENTS: &'static [u8] = b"Test sample\r\n";

    pub fn create() -> AccessProbeResult<Self> {
        let mut file = NamedTempFile::new()
            .map_err(|e| AccessProbeError::io("create probe payload", std::env::temp_dir(), e))?;
        file.write_all(Self::CONTENTS)
            .and_then(|()| file.flush())
            .map_err(|e| AccessProbeError::io("write probe payload", file.path(), e))?;
        let body = std::fs::read(file.path())
            .map_err(|e| AccessProbeError::io("read probe payload", file.path(), e))?;
        debug!("Created probe payload at {}", file.path().display());
        Ok(Self { file, body })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Runs action probes against one store.
pub struct Prober<'a> {
    store: &'a dyn ObjectStore,
    body: &'a [u8],
    probe_file_name: &'a str,
}

impl<'a> Prober<'a> {
    pub fn new(store: &'a dyn ObjectStore, body: &'a [u8], probe_file_name: &'a str) -> Self {
        Self {
            store,
            body,
            probe_file_name,
        }
    }

    /// Perform the operation sequence for `action` and report whether it succeeded.
    pub async fn probe(
        &self,
        bucket: &str,
        resource_path: &str,
        kind: ResourceKind,
        action: Action,
    ) -> ProbeOutcome {
        let key = probe_key(resource_path, kind, self.probe_file_name);
        let result: Result<(), ProbeFailure> = match action {
            Action::ListBucket => self.store.list_objects(bucket).await.map_err(Into::into),
            Action::PutObject => self
                .store
                .put_object(bucket, &key, self.body)
                .await
                .map_err(Into::into),
            Action::GetObject => self.store.get_object(bucket, &key).await.map_err(Into::into),
            Action::MultipartUpload => self.multipart_upload(bucket, &key).await,
            Action::AbortMultipartUpload => self.abort_multipart_upload(bucket, &key).await,
        };

        match result {
            Ok(()) => ProbeOutcome::passed(),
            Err(failure) => {
                debug!("{} on '{}/{}' failed: {:?}", action, bucket, key, failure);
                let detail_path = action.targets_object().then_some(key);
                failure.into_outcome(detail_path)
            }
        }
    }

    async fn multipart_upload(&self, bucket: &str, key: &str) -> Result<(), ProbeFailure> {
        let upload_id = self
            .store
            .create_multipart_upload(bucket, key)
            .await?
            .ok_or(ProbeFailure::MissingUploadSession)?;

        let result = self.upload_and_complete(bucket, key, &upload_id).await;
        if result.is_err() {
            // Do not leave the session open on the backend.
            if let Err(e) = self
                .store
                .abort_multipart_upload(bucket, key, &upload_id)
                .await
            {
                warn!(
                    "Could not clean up multipart upload '{}' on '{}/{}': {}",
                    upload_id, bucket, key, e
                );
            }
        }
        result
    }

    async fn upload_and_complete(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), ProbeFailure> {
        let e_tag = self
            .store
            .upload_part(bucket, key, PROBE_PART_NUMBER, upload_id, self.body)
            .await?
            .ok_or(ProbeFailure::MissingPartTag)?;

        let parts = [UploadedPart {
            part_number: PROBE_PART_NUMBER,
            e_tag,
        }];
        self.store
            .complete_multipart_upload(bucket, key, upload_id, &parts)
            .await?;
        Ok(())
    }

    async fn abort_multipart_upload(&self, bucket: &str, key: &str) -> Result<(), ProbeFailure> {
        let upload_id = self
            .store
            .create_multipart_upload(bucket, key)
            .await?
            .ok_or(ProbeFailure::MissingUploadSession)?;
        self.store
            .abort_multipart_upload(bucket, key, &upload_id)
            .await?;
        Ok(())
    }
}
