//! src/services/upload_service.rs
//!
//! UploadService — the multipart upload protocol. A session moves through
//! start → part signing (any number of times) → completion, with an explicit
//! abort and an age-based expiry as the other ways out. Part bytes never pass
//! through this service: clients PUT them straight to the object store with
//! the signed URLs handed out here.

use crate::{
    models::upload::{PartCapability, PartDescriptor, UploadSession, UploadStartResponse},
    services::{
        object_key::ObjectKeys,
        object_store::{ObjectStore, StoreError, StorePart, StoreResult, store_part_number},
        session_registry::{RegistryError, SessionRegistry},
    },
};
use chrono::Utc;
use futures::future::join_all;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Part size recommended to every client, regardless of declared file size.
pub const PART_SIZE_BYTES: u64 = 10_485_760;

/// Lifetime of a signed part URL.
pub const PART_URL_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload session `{0}` not found")]
    SessionNotFound(String),
    #[error("upload session `{0}` already exists")]
    DuplicateSession(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RegistryError> for UploadError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::SessionNotFound(id) => UploadError::SessionNotFound(id),
            RegistryError::DuplicateSession(id) => UploadError::DuplicateSession(id),
        }
    }
}

pub type UploadResult<T> = Result<T, UploadError>;

/// Produces document ids for new sessions.
pub type IdFn = Arc<dyn Fn() -> String + Send + Sync>;

/// Coordinates multipart uploads between clients and the object store.
///
/// Cheap to clone; clones share the registry and store.
#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn ObjectStore>,
    registry: SessionRegistry,
    keys: ObjectKeys,
    bucket: String,
    new_id: IdFn,
}

impl UploadService {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        registry: SessionRegistry,
        keys: ObjectKeys,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            store,
            registry,
            keys,
            bucket: bucket.into(),
            new_id: Arc::new(|| Uuid::new_v4().to_string()),
        }
    }

    /// Replace the UUID v4 document id generator.
    pub fn with_id_generator(mut self, new_id: IdFn) -> Self {
        self.new_id = new_id;
        self
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Open a store-side multipart upload and register a session for it.
    ///
    /// No session is registered when the store refuses to open the upload.
    pub async fn start(
        &self,
        file_name: &str,
        declared_size: u64,
        file_type: &str,
    ) -> UploadResult<UploadStartResponse> {
        let document_id = (self.new_id)();
        let key = self.keys.key_for(file_name);
        let content_type = content_type_for(file_type);

        let upload_id = self
            .store
            .initiate_multipart_upload(&self.bucket, &key, content_type)
            .await
            .inspect_err(|err| warn!("failed to initiate upload for {}: {}", key, err))?;

        if let Err(err) = self
            .registry
            .create(&document_id, &upload_id, file_name)
            .await
        {
            // keep "session exists iff store upload is open"
            if let Err(abort_err) = self
                .store
                .abort_multipart_upload(&self.bucket, &key, &upload_id)
                .await
            {
                warn!("could not abort orphaned upload {}: {}", upload_id, abort_err);
            }
            return Err(err.into());
        }

        info!(
            "started upload {} for {} ({} bytes declared, {})",
            document_id, key, declared_size, content_type
        );

        Ok(UploadStartResponse {
            document_id,
            part_size_in_bytes: PART_SIZE_BYTES,
        })
    }

    /// Sign a write URL for one part. Does not touch the session.
    ///
    /// The session is looked up before the part number is looked at, so an
    /// unknown document is reported as such whatever number was asked for.
    /// Beyond fitting the store's integer width, part numbers are passed
    /// through unchecked; the store decides which it accepts.
    pub async fn part_url(
        &self,
        document_id: &str,
        part_number: i64,
    ) -> UploadResult<PartCapability> {
        let session = self.registry.get(document_id).await?;
        let part_number = store_part_number(part_number)?;
        let key = self.keys.key_for(&session.file_name);
        let expiration = Utc::now() + chrono::Duration::seconds(PART_URL_TTL.as_secs() as i64);

        let url = self
            .store
            .presign_upload_part(
                &self.bucket,
                &key,
                &session.store_upload_id,
                part_number,
                PART_URL_TTL,
            )
            .await
            .inspect_err(|err| {
                warn!("failed to sign part {} of {}: {}", part_number, document_id, err)
            })?;

        Ok(PartCapability { url, expiration })
    }

    /// Ask the store to assemble the uploaded parts, then drop the session.
    ///
    /// When the store rejects the assembly the session is kept so the client
    /// can retry.
    pub async fn complete(
        &self,
        document_id: &str,
        parts: Vec<PartDescriptor>,
    ) -> UploadResult<String> {
        let session = self.registry.get(document_id).await?;
        let key = self.keys.key_for(&session.file_name);
        let mut parts = parts
            .into_iter()
            .map(StorePart::try_from)
            .collect::<StoreResult<Vec<_>>>()?;
        parts.sort_by_key(|part| part.part_number);

        let location = self
            .store
            .complete_multipart_upload(&self.bucket, &key, &session.store_upload_id, &parts)
            .await
            .inspect_err(|err| warn!("failed to complete upload {}: {}", document_id, err))?;

        self.registry.delete(document_id).await;
        info!(
            "completed upload {} ({} parts) at {}",
            document_id,
            parts.len(),
            location
        );
        Ok(session.document_id)
    }

    /// Abandon an upload: discard it in the store, then drop the session.
    ///
    /// A store that no longer knows the upload counts as already aborted;
    /// that case is logged at `warn`, since it is also what a just-finished
    /// completion looks like.
    pub async fn abort(&self, document_id: &str) -> UploadResult<String> {
        let session = self.registry.get(document_id).await?;
        self.abort_session(&session).await?;
        info!("aborted upload {}", document_id);
        Ok(session.document_id)
    }

    /// Abort every session older than `ttl`. Returns how many were removed;
    /// sessions whose abort fails stay registered for the next pass.
    pub async fn expire_sessions(&self, ttl: chrono::Duration) -> usize {
        let stale = self.registry.created_before(Utc::now() - ttl).await;
        let results = join_all(stale.iter().map(|session| self.abort_session(session))).await;

        let mut expired = 0;
        for (session, result) in stale.iter().zip(results) {
            match result {
                Ok(()) => {
                    info!(
                        "expired upload {} started at {}",
                        session.document_id, session.created_at
                    );
                    expired += 1;
                }
                Err(err) => warn!(
                    "could not expire upload {}: {}",
                    session.document_id, err
                ),
            }
        }
        expired
    }

    /// Readiness: the target bucket is reachable.
    pub async fn check_store(&self) -> UploadResult<()> {
        self.store.check_bucket(&self.bucket).await?;
        Ok(())
    }

    async fn abort_session(&self, session: &UploadSession) -> UploadResult<()> {
        let key = self.keys.key_for(&session.file_name);
        match self
            .store
            .abort_multipart_upload(&self.bucket, &key, &session.store_upload_id)
            .await
        {
            Ok(()) => {}
            Err(StoreError::NoSuchUpload(upload_id)) => warn!(
                "store has no upload {} for session {} (completed or aborted elsewhere?), dropping session",
                upload_id, session.document_id
            ),
            Err(err) => return Err(err.into()),
        }
        self.registry.delete(&session.document_id).await;
        Ok(())
    }
}

/// MIME type used when opening the upload.
fn content_type_for(file_type: &str) -> &str {
    if file_type.eq_ignore_ascii_case("pdf") {
        "application/pdf"
    } else if file_type.contains('/') {
        file_type
    } else {
        "application/octet-stream"
    }
}
