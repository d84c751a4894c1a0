//! AWS S3 client wrapper implementing the storage capability

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client as S3Client;
use log::debug;

use super::{ObjectStore, StorageError, StorageResult, StoreFactory, UploadedPart};
use crate::types::IamProfile;

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "eu-west-1";

const CREDENTIALS_PROVIDER_NAME: &str = "expectation-matrix";

/// Convert an SDK failure into an opaque [`StorageError`].
///
/// Service errors are classified by their S3 error code, everything else by the
/// SDK failure category.
fn storage_error<E, R>(operation: &str, err: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let kind = match &err {
        SdkError::ServiceError(service) => service.err().code().unwrap_or("ServiceError"),
        SdkError::ConstructionFailure(_) => "ConstructionFailure",
        SdkError::TimeoutError(_) => "TimeoutError",
        SdkError::DispatchFailure(_) => "DispatchFailure",
        SdkError::ResponseError(_) => "ResponseError",
        _ => "SdkError",
    }
    .to_string();

    let message = match err.message() {
        Some(message) => format!("{operation} failed: {message}"),
        None => format!("{operation} failed: {}", DisplayErrorContext(&err)),
    };

    StorageError::new(kind, message)
}

pub struct S3Store {
    client: S3Client,
}

impl S3Store {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list_objects(&self, bucket: &str) -> StorageResult<()> {
        self.client
            .list_objects()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| storage_error("ListObjects", e))?;
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body.to_vec()))
            .send()
            .await
            .map_err(|e| storage_error("PutObject", e))?;
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("GetObject", e))?;
        Ok(())
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> StorageResult<Option<String>> {
        let response = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| storage_error("CreateMultipartUpload", e))?;
        Ok(response.upload_id().map(str::to_string))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        part_number: i32,
        upload_id: &str,
        body: &[u8],
    ) -> StorageResult<Option<String>> {
        let response = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .part_number(part_number)
            .upload_id(upload_id)
            .body(ByteStream::from(body.to_vec()))
            .send()
            .await
            .map_err(|e| storage_error("UploadPart", e))?;
        Ok(response.e_tag().map(str::to_string))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
    ) -> StorageResult<()> {
        let completed_parts = parts
            .iter()
            .map(|part| {
                CompletedPart::builder()
                    .e_tag(&part.e_tag)
                    .part_number(part.part_number)
                    .build()
            })
            .collect();
        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(|e| storage_error("CompleteMultipartUpload", e))?;
        Ok(())
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StorageResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| storage_error("AbortMultipartUpload", e))?;
        Ok(())
    }
}

/// Creates S3 clients authenticated with each profile's static keys.
#[derive(Debug, Clone)]
pub struct S3StoreFactory {
    region: String,
    endpoint_url: Option<String>,
}

impl S3StoreFactory {
    /// `endpoint_url` targets an S3-compatible endpoint instead of AWS and switches
    /// to path-style addressing.
    pub fn new(region: impl Into<String>, endpoint_url: Option<String>) -> Self {
        Self {
            region: region.into(),
            endpoint_url,
        }
    }
}

impl Default for S3StoreFactory {
    fn default() -> Self {
        Self::new(DEFAULT_REGION, None)
    }
}

#[async_trait]
impl StoreFactory for S3StoreFactory {
    async fn connect(&self, profile: &IamProfile) -> StorageResult<Box<dyn ObjectStore>> {
        if profile.access_key.trim().is_empty() || profile.secret_key.trim().is_empty() {
            return Err(StorageError::new(
                "InvalidCredentials",
                format!("IAM '{}' has an empty access key or secret", profile.name),
            ));
        }

        let credentials = Credentials::new(
            profile.access_key.clone(),
            profile.secret_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER_NAME,
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(credentials);
        if let Some(endpoint) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.endpoint_url.is_some())
            .build();

        debug!(
            "Created S3 client for IAM '{}' in region '{}'",
            profile.name, self.region
        );
        Ok(Box::new(S3Store::new(S3Client::from_conf(s3_config))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceCatalog;
    use aws_sdk_s3::error::ErrorMetadata;
    use aws_sdk_s3::operation::get_object::GetObjectError;
    use std::collections::BTreeSet;

    fn profile(key: &str, secret: &str) -> IamProfile {
        IamProfile {
            name: "writer".into(),
            access_key: key.into(),
            secret_key: secret.into(),
            allowed_buckets: BTreeSet::new(),
            resources: ResourceCatalog::Declared(vec![]),
        }
    }

    #[tokio::test]
    async fn test_connect_rejects_blank_credentials() {
        let factory = S3StoreFactory::default();
        let err = match factory.connect(&profile("", "secret")).await {
            Ok(_) => panic!("blank access key must be rejected"),
            Err(e) => e,
        };
        assert_eq!(err.kind, "InvalidCredentials");
        assert!(err.message.contains("writer"));
    }

    #[tokio::test]
    async fn test_connect_builds_client_for_custom_endpoint() {
        let factory = S3StoreFactory::new("us-east-1", Some("http://localhost:9000".into()));
        assert!(factory.connect(&profile("AKIA", "secret")).await.is_ok());
    }

    #[test]
    fn test_service_error_kind_is_s3_error_code() {
        let service = GetObjectError::generic(
            ErrorMetadata::builder()
                .code("AccessDenied")
                .message("Access Denied")
                .build(),
        );
        let err = storage_error("GetObject", SdkError::service_error(service, ()));

        assert_eq!(err.kind, "AccessDenied");
        assert_eq!(err.message, "GetObject failed: Access Denied");
    }

    #[test]
    fn test_non_service_error_kind_is_failure_category() {
        let sdk_err: SdkError<GetObjectError, ()> =
            SdkError::construction_failure("bucket name is invalid");
        let err = storage_error("GetObject", sdk_err);

        assert_eq!(err.kind, "ConstructionFailure");
        assert!(err.message.starts_with("GetObject failed: "));
    }
}
