//! Object storage capability probed by the engine, and its S3 implementation.

pub mod s3;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::IamProfile;

/// An opaque failure from a storage call.
///
/// `kind` is the backend's classification (an S3 error code, or the transport
/// failure category); the prober records it without interpreting it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct StorageError {
    pub kind: String,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A part uploaded within a multipart session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_number: i32,
    pub e_tag: String,
}

/// The storage operations the probes need, scoped to one set of credentials.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_objects(&self, bucket: &str) -> StorageResult<()>;

    async fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> StorageResult<()>;

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Start a multipart upload. `Ok(None)` means the call succeeded without an upload id.
    async fn create_multipart_upload(&self, bucket: &str, key: &str)
        -> StorageResult<Option<String>>;

    /// Upload one part. `Ok(None)` means the call succeeded without an ETag.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        part_number: i32,
        upload_id: &str,
        body: &[u8],
    ) -> StorageResult<Option<String>>;

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> StorageResult<()>;

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StorageResult<()>;
}

/// Builds one [`ObjectStore`] per IAM profile.
#[async_trait]
pub trait StoreFactory: Send + Sync {
    async fn connect(&self, profile: &IamProfile) -> StorageResult<Box<dyn ObjectStore>>;
}

#[async_trait]
impl<T: StoreFactory + ?Sized> StoreFactory for &T {
    async fn connect(&self, profile: &IamProfile) -> StorageResult<Box<dyn ObjectStore>> {
        (**self).connect(profile).await
    }
}
