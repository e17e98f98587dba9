//! HTTP handlers for the `/uploads/*` protocol.
//! Thin adapters: parse the request, call `UploadService`, shape the JSON.

use crate::{
    errors::AppError,
    models::upload::{
        DocumentIdResponse, PartCapability, PartUrlQuery, UploadAbortRequest,
        UploadCompleteRequest, UploadStartRequest, UploadStartResponse,
    },
    services::upload_service::UploadService,
};
use axum::{
    Json,
    extract::{Query, State},
};
use serde_json::{Value, json};

/// `GET /`
pub async fn root() -> Json<Value> {
    Json(json!({ "greeting": "Welcome to the upload coordinator" }))
}

/// `POST /uploads/start`
pub async fn start_upload(
    State(service): State<UploadService>,
    Json(req): Json<UploadStartRequest>,
) -> Result<Json<UploadStartResponse>, AppError> {
    let started = service
        .start(&req.file_name, req.size, &req.file_type)
        .await?;
    Ok(Json(started))
}

/// `GET /uploads/part-url?document_id=&part_number=`
pub async fn get_part_url(
    State(service): State<UploadService>,
    Query(q): Query<PartUrlQuery>,
) -> Result<Json<PartCapability>, AppError> {
    let capability = service.part_url(&q.document_id, q.part_number).await?;
    Ok(Json(capability))
}

/// `POST /uploads/complete`
pub async fn complete_upload(
    State(service): State<UploadService>,
    Json(req): Json<UploadCompleteRequest>,
) -> Result<Json<DocumentIdResponse>, AppError> {
    let document_id = service.complete(&req.document_id, req.parts).await?;
    Ok(Json(DocumentIdResponse { document_id }))
}

/// `POST /uploads/abort`
pub async fn abort_upload(
    State(service): State<UploadService>,
    Json(req): Json<UploadAbortRequest>,
) -> Result<Json<DocumentIdResponse>, AppError> {
    let document_id = service.abort(&req.document_id).await?;
    Ok(Json(DocumentIdResponse { document_id }))
}
