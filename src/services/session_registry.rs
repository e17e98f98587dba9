//! In-memory registry of upload sessions keyed by document id.
//!
//! The registry is shared by every request handler and the expiry sweeper.
//! Each operation takes the lock only for the map access itself, so callers
//! never hold it across an object-store round trip.

use crate::models::upload::UploadSession;
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("upload session `{0}` not found")]
    SessionNotFound(String),
    #[error("upload session `{0}` already exists")]
    DuplicateSession(String),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, UploadSession>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session created now.
    pub async fn create(
        &self,
        document_id: &str,
        store_upload_id: &str,
        file_name: &str,
    ) -> RegistryResult<UploadSession> {
        let session = UploadSession {
            document_id: document_id.to_string(),
            store_upload_id: store_upload_id.to_string(),
            file_name: file_name.to_string(),
            created_at: Utc::now(),
        };
        self.insert(session.clone()).await?;
        Ok(session)
    }

    /// Register a fully-formed session. Fails if the document id is taken.
    pub async fn insert(&self, session: UploadSession) -> RegistryResult<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.document_id) {
            return Err(RegistryError::DuplicateSession(session.document_id));
        }
        sessions.insert(session.document_id.clone(), session);
        Ok(())
    }

    pub async fn get(&self, document_id: &str) -> RegistryResult<UploadSession> {
        self.sessions
            .read()
            .await
            .get(document_id)
            .cloned()
            .ok_or_else(|| RegistryError::SessionNotFound(document_id.to_string()))
    }

    /// Remove a session. Removing an absent session is a no-op returning `None`.
    pub async fn delete(&self, document_id: &str) -> Option<UploadSession> {
        self.sessions.write().await.remove(document_id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Sessions registered strictly before `cutoff`.
    pub async fn created_before(&self, cutoff: DateTime<Utc>) -> Vec<UploadSession> {
        self.sessions
            .read()
            .await
            .values()
            .filter(|session| session.created_at < cutoff)
            .cloned()
            .collect()
    }
}
