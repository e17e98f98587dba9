//! Represents multipart upload sessions, parts and the JSON bodies exchanged
//! with clients over `/uploads/*`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An in-flight multipart upload, as tracked by the session registry.
///
/// Sessions are immutable once registered; the coordinator only ever reads
/// them or removes them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSession {
    /// Client-facing identifier (UUID v4 string), never reused.
    pub document_id: String,

    /// Upload ID returned by the object store when the upload was initiated.
    pub store_upload_id: String,

    /// Original file name; the object key is re-derived from it on every call.
    pub file_name: String,

    /// When the session was registered.
    pub created_at: DateTime<Utc>,
}

/// A part the client reports as uploaded when completing a session.
///
/// The part number is kept as wide as clients may send it; range checks
/// happen only once the session is known.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct PartDescriptor {
    /// Part number (1-based, as accepted by the store).
    #[serde(alias = "partNumber")]
    pub part_number: i64,

    /// Content tag (ETag) the store returned for the part.
    #[serde(alias = "contentTag")]
    pub etag: String,
}

/// Time-limited write capability for a single part. Never persisted.
#[derive(Serialize, Clone, Debug)]
pub struct PartCapability {
    pub url: String,
    pub expiration: DateTime<Utc>,
}

/// Body of `POST /uploads/start`.
#[derive(Deserialize, Debug)]
pub struct UploadStartRequest {
    #[serde(alias = "fileName")]
    pub file_name: String,
    pub size: u64,
    #[serde(default = "default_file_type", alias = "fileType")]
    pub file_type: String,
}

fn default_file_type() -> String {
    "PDF".into()
}

#[derive(Serialize, Debug)]
pub struct UploadStartResponse {
    pub document_id: String,
    pub part_size_in_bytes: u64,
}

/// Query string of `GET /uploads/part-url`.
#[derive(Deserialize, Debug)]
pub struct PartUrlQuery {
    #[serde(alias = "documentId")]
    pub document_id: String,
    #[serde(alias = "partNumber")]
    pub part_number: i64,
}

/// Body of `POST /uploads/complete`.
#[derive(Deserialize, Debug)]
pub struct UploadCompleteRequest {
    #[serde(alias = "documentId")]
    pub document_id: String,
    pub parts: Vec<PartDescriptor>,
}

/// Body of `POST /uploads/abort`.
#[derive(Deserialize, Debug)]
pub struct UploadAbortRequest {
    #[serde(alias = "documentId")]
    pub document_id: String,
}

/// Response for both completion and abort: echoes the document id.
#[derive(Serialize, Debug)]
pub struct DocumentIdResponse {
    pub document_id: String,
}
