//! `ObjectStore` backed by the AWS SDK.
//!
//! Works against AWS S3 and, when an endpoint URL is configured, against
//! S3-compatible services (path-style addressing is forced in that case).

use super::{ObjectStore, StoreError, StorePart, StoreResult};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::Region,
    error::DisplayErrorContext,
    presigning::PresigningConfig,
    types::{CompletedMultipartUpload, CompletedPart},
};
use std::time::Duration;
use tracing::debug;

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    /// Build a client from the default AWS provider chain (env credentials,
    /// profiles, instance metadata) for `region`.
    pub async fn connect(region: &str, endpoint_url: Option<&str>) -> Self {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let Some(endpoint) = endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if endpoint_url.is_some() {
            builder = builder.force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }
}

fn backend<E: std::error::Error>(op: &str, err: E) -> StoreError {
    StoreError::Backend(format!("{}: {}", op, DisplayErrorContext(err)))
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StoreResult<String> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| backend("CreateMultipartUpload", err))?;

        output.upload_id().map(str::to_string).ok_or_else(|| {
            StoreError::Backend("CreateMultipartUpload returned no upload id".into())
        })
    }

    async fn presign_upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        ttl: Duration,
    ) -> StoreResult<String> {
        let presigning =
            PresigningConfig::expires_in(ttl).map_err(|err| backend("PresigningConfig", err))?;

        let request = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .presigned(presigning)
            .await
            .map_err(|err| backend("UploadPart presign", err))?;

        Ok(request.uri().to_string())
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[StorePart],
    ) -> StoreResult<String> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|part| {
                        CompletedPart::builder()
                            .part_number(part.part_number)
                            .e_tag(&part.etag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(|err| backend("CompleteMultipartUpload", err))?;

        let location = output
            .location()
            .map(str::to_string)
            .unwrap_or_else(|| format!("s3://{}/{}", bucket, key));
        debug!("assembled {} from {} parts", location, parts.len());
        Ok(location)
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()> {
        match self
            .client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_no_such_upload()) =>
            {
                Err(StoreError::NoSuchUpload(upload_id.to_string()))
            }
            Err(err) => Err(backend("AbortMultipartUpload", err)),
        }
    }

    async fn check_bucket(&self, bucket: &str) -> StoreResult<()> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(()),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => {
                Err(StoreError::BucketNotFound(bucket.to_string()))
            }
            Err(err) => Err(backend("HeadBucket", err)),
        }
    }
}
