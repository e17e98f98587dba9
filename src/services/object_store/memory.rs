//! In-process `ObjectStore`.
//!
//! Keeps pending uploads, their parts and assembled objects in memory, and
//! hands out capability URLs of the form `{base_url}/memory-store/parts/{signature}`
//! which `put_part` redeems. Assembly is validated the way S3 does it: parts
//! must be listed in ascending order, each one must exist, and its ETag must
//! match. Intended for tests and for running the control plane locally
//! without a bucket.

use super::{ObjectStore, StoreError, StorePart, StoreResult};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Path prefix under which capability URLs are served.
pub const PARTS_PATH: &str = "/memory-store/parts";

/// Largest part body accepted over HTTP.
pub const MAX_PART_BYTES: usize = 64 * 1024 * 1024;

/// An assembled object.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub content_type: String,
    pub etag: String,
    pub data: Bytes,
}

/// The `(bucket, key, upload_id, part_number)` a capability writes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapabilityTarget {
    pub bucket: String,
    pub key: String,
    pub upload_id: String,
    pub part_number: i32,
}

/// Snapshot of how often each store operation was invoked.
#[cfg(test)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub initiate: usize,
    pub presign: usize,
    pub complete: usize,
    pub abort: usize,
}

struct StoredPart {
    digest: md5::Digest,
    data: Bytes,
}

struct PendingUpload {
    bucket: String,
    key: String,
    content_type: String,
    parts: BTreeMap<i32, StoredPart>,
}

struct IssuedCapability {
    target: CapabilityTarget,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    buckets: HashSet<String>,
    uploads: HashMap<String, PendingUpload>,
    capabilities: HashMap<String, IssuedCapability>,
    objects: HashMap<(String, String), StoredObject>,
}

#[derive(Default)]
struct Counters {
    initiate: AtomicUsize,
    presign: AtomicUsize,
    complete: AtomicUsize,
    abort: AtomicUsize,
}

pub struct MemoryObjectStore {
    base_url: String,
    state: Mutex<State>,
    counters: Counters,
}

impl MemoryObjectStore {
    /// Create a store that already holds `buckets` and issues capability URLs
    /// rooted at `base_url`.
    pub fn new<I, S>(base_url: impl Into<String>, buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = State {
            buckets: buckets.into_iter().map(Into::into).collect(),
            ..State::default()
        };
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            state: Mutex::new(state),
            counters: Counters::default(),
        }
    }

    #[cfg(test)]
    pub fn calls(&self) -> CallCounts {
        CallCounts {
            initiate: self.counters.initiate.load(Ordering::SeqCst),
            presign: self.counters.presign.load(Ordering::SeqCst),
            complete: self.counters.complete.load(Ordering::SeqCst),
            abort: self.counters.abort.load(Ordering::SeqCst),
        }
    }

    /// Resolve the target a capability URL (or bare signature) writes to.
    #[cfg(test)]
    pub async fn capability_target(&self, url: &str) -> Option<CapabilityTarget> {
        let state = self.state.lock().await;
        state
            .capabilities
            .get(signature_of(url))
            .map(|cap| cap.target.clone())
    }

    /// Store the bytes of one part through a capability, returning its ETag.
    ///
    /// Re-uploading the same part number replaces the earlier bytes.
    pub async fn put_part(&self, url: &str, data: Bytes) -> StoreResult<String> {
        let signature = signature_of(url);
        let mut state = self.state.lock().await;

        let (target, expires_at) = match state.capabilities.get(signature) {
            Some(cap) => (cap.target.clone(), cap.expires_at),
            None => return Err(StoreError::CapabilityRejected("unknown or revoked".into())),
        };
        if Utc::now() > expires_at {
            return Err(StoreError::CapabilityRejected(format!(
                "expired at {}",
                expires_at.to_rfc3339()
            )));
        }

        let upload = state
            .uploads
            .get_mut(&target.upload_id)
            .ok_or_else(|| StoreError::NoSuchUpload(target.upload_id.clone()))?;

        let digest = md5::compute(&data);
        let etag = format!("{:x}", digest);
        debug!(
            "stored part {} ({} bytes) of {}/{} for upload {}",
            target.part_number,
            data.len(),
            target.bucket,
            target.key,
            target.upload_id
        );
        upload
            .parts
            .insert(target.part_number, StoredPart { digest, data });
        Ok(etag)
    }

    pub async fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        let state = self.state.lock().await;
        state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    #[cfg(test)]
    pub async fn pending_uploads(&self) -> usize {
        self.state.lock().await.uploads.len()
    }

    fn find_upload<'a>(
        state: &'a State,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<&'a PendingUpload> {
        match state.uploads.get(upload_id) {
            Some(upload) if upload.bucket == bucket && upload.key == key => Ok(upload),
            _ => Err(StoreError::NoSuchUpload(upload_id.to_string())),
        }
    }
}

/// Accepts either a full capability URL or its trailing signature segment.
fn signature_of(url: &str) -> &str {
    url.rsplit('/').next().unwrap_or(url)
}

/// Compare ETags the way S3 does, ignoring surrounding quotes.
fn etag_matches(stored: &str, supplied: &str) -> bool {
    stored == supplied.trim_matches('"')
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> StoreResult<String> {
        self.counters.initiate.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if !state.buckets.contains(bucket) {
            return Err(StoreError::BucketNotFound(bucket.to_string()));
        }

        let upload_id = general_purpose::URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes());
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn presign_upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        ttl: Duration,
    ) -> StoreResult<String> {
        self.counters.presign.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        Self::find_upload(&state, bucket, key, upload_id)?;

        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|err| StoreError::Backend(format!("invalid capability ttl: {}", err)))?;
        let now = Utc::now();
        state.capabilities.retain(|_, cap| cap.expires_at >= now);

        let signature = general_purpose::URL_SAFE_NO_PAD.encode(Uuid::new_v4().as_bytes());
        state.capabilities.insert(
            signature.clone(),
            IssuedCapability {
                target: CapabilityTarget {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    upload_id: upload_id.to_string(),
                    part_number,
                },
                expires_at: now + ttl,
            },
        );

        Ok(format!("{}{}/{}", self.base_url, PARTS_PATH, signature))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[StorePart],
    ) -> StoreResult<String> {
        self.counters.complete.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        let upload = Self::find_upload(&state, bucket, key, upload_id)?;

        if parts.is_empty() {
            return Err(StoreError::NoParts);
        }
        if parts
            .windows(2)
            .any(|pair| pair[0].part_number >= pair[1].part_number)
        {
            return Err(StoreError::InvalidPartOrder);
        }

        let mut body = BytesMut::new();
        let mut combined = md5::Context::new();
        for part in parts {
            let stored =
                upload
                    .parts
                    .get(&part.part_number)
                    .ok_or_else(|| StoreError::InvalidPart {
                        part_number: part.part_number,
                        reason: "part was never uploaded".into(),
                    })?;
            if !etag_matches(&format!("{:x}", stored.digest), &part.etag) {
                return Err(StoreError::InvalidPart {
                    part_number: part.part_number,
                    reason: "etag does not match uploaded part".into(),
                });
            }
            body.extend_from_slice(&stored.data);
            combined.consume(stored.digest.0);
        }

        let object = StoredObject {
            content_type: upload.content_type.clone(),
            etag: format!("{:x}-{}", combined.compute(), parts.len()),
            data: body.freeze(),
        };

        state.uploads.remove(upload_id);
        state
            .capabilities
            .retain(|_, cap| cap.target.upload_id != upload_id);
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), object);

        Ok(format!("{}/{}/{}", self.base_url, bucket, key))
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> StoreResult<()> {
        self.counters.abort.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        Self::find_upload(&state, bucket, key, upload_id)?;

        state.uploads.remove(upload_id);
        state
            .capabilities
            .retain(|_, cap| cap.target.upload_id != upload_id);
        Ok(())
    }

    async fn check_bucket(&self, bucket: &str) -> StoreResult<()> {
        if self.state.lock().await.buckets.contains(bucket) {
            Ok(())
        } else {
            Err(StoreError::BucketNotFound(bucket.to_string()))
        }
    }
}
