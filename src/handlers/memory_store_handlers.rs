//! Data-plane endpoints of the in-process object store.
//!
//! Only mounted when the server runs with `--store memory`. They stand in for
//! the bucket itself: clients PUT part bytes to the signed URLs handed out by
//! `/uploads/part-url` and receive the part's ETag header back.

use crate::{errors::AppError, services::object_store::MemoryObjectStore};
use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use std::sync::Arc;

/// `PUT /memory-store/parts/{signature}`
pub async fn put_part(
    State(store): State<Arc<MemoryObjectStore>>,
    Path(signature): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    let etag = store.put_part(&signature, body).await?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
        response.headers_mut().insert(header::ETAG, value);
    }
    Ok(response)
}

/// `GET /memory-store/objects/{bucket}/{*key}` — download an assembled object.
pub async fn get_object(
    State(store): State<Arc<MemoryObjectStore>>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let object = store
        .object(&bucket, &key)
        .await
        .ok_or_else(|| AppError::not_found(format!("object `{}` not found", key)))?;

    let mut response = Response::new(Body::from(object.data));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&object.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", object.etag)) {
        headers.insert(header::ETAG, value);
    }
    Ok(response)
}
