//! Object-store collaborator used by the upload coordinator.
//!
//! The coordinator never moves part bytes itself: it asks the store to open a
//! multipart upload, to sign per-part write URLs for clients, and finally to
//! assemble (or abort) the upload. `S3ObjectStore` talks to S3 or any
//! S3-compatible endpoint; `MemoryObjectStore` keeps everything in process.

pub mod memory;
pub mod s3;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

use crate::models::upload::PartDescriptor;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("multipart upload `{0}` not found")]
    NoSuchUpload(String),
    #[error("at least one part is required to complete an upload")]
    NoParts,
    #[error("parts must be listed in strictly ascending part-number order")]
    InvalidPartOrder,
    #[error("part {part_number} rejected: {reason}")]
    InvalidPart { part_number: i32, reason: String },
    #[error("part number {0} is outside the range the store accepts")]
    PartNumberOutOfRange(i64),
    #[error("part capability rejected: {0}")]
    CapabilityRejected(String),
    #[error("object store request failed: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Narrow a client-supplied part number to the width stores work with.
pub fn store_part_number(part_number: i64) -> StoreResult<i32> {
    i32::try_from(part_number).map_err(|_| StoreError::PartNumberOutOfRange(part_number))
}

/// One entry of the part list handed to the store on completion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorePart {
    pub part_number: i32,
    pub etag: String,
}

impl TryFrom<PartDescriptor> for StorePart {
    type Error = StoreError;

    fn try_from(part: PartDescriptor) -> StoreResult<Self> {
        Ok(Self {
            part_number: store_part_number(part.part_number)?,
            etag: part.etag,
        })
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Open a multipart upload for `key`, returning the store's upload ID.
    async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StoreResult<String>;

    /// Produce a URL that lets its holder PUT the bytes of one part, valid
    /// for `ttl`.
    async fn presign_upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        ttl: Duration,
    ) -> StoreResult<String>;

    /// Assemble the final object. `parts` are sorted by part number.
    /// Returns the location of the assembled object.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[StorePart],
    ) -> StoreResult<String>;

    /// Discard an upload and any parts stored for it.
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()>;

    /// Readiness probe: the bucket exists and is reachable.
    async fn check_bucket(&self, bucket: &str) -> StoreResult<()>;
}
