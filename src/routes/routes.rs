//! Defines routes for the upload protocol.
//!
//! ## Structure
//! - **Upload endpoints**
//!   - `POST /uploads/start`    — open a session, returns `document_id`
//!   - `GET  /uploads/part-url` — sign a write URL for one part
//!   - `POST /uploads/complete` — assemble the parts and close the session
//!   - `POST /uploads/abort`    — discard the upload and close the session
//!
//! - **Memory store endpoints** (only with `--store memory`)
//!   - `PUT  /memory-store/parts/{signature}`       — redeem a part URL
//!   - `GET  /memory-store/objects/{bucket}/{*key}` — fetch an assembled object

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        memory_store_handlers::{get_object, put_part},
        upload_handlers::{abort_upload, complete_upload, get_part_url, root, start_upload},
    },
    services::{
        object_store::{MemoryObjectStore, memory::MAX_PART_BYTES},
        upload_service::UploadService,
    },
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use std::sync::Arc;

/// Build the router for the upload API. Handlers share `UploadService` as state.
pub fn routes() -> Router<UploadService> {
    Router::new()
        .route("/", get(root))
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/uploads/start", post(start_upload))
        .route("/uploads/part-url", get(get_part_url))
        .route("/uploads/complete", post(complete_upload))
        .route("/uploads/abort", post(abort_upload))
}

/// Routes that let clients talk to the in-process store directly.
pub fn memory_store_routes() -> Router<Arc<MemoryObjectStore>> {
    Router::new()
        .route("/memory-store/parts/{signature}", put(put_part))
        .route("/memory-store/objects/{bucket}/{*key}", get(get_object))
        .layer(DefaultBodyLimit::max(MAX_PART_BYTES))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{object_key::ObjectKeys, session_registry::SessionRegistry};
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const BASE: &str = "http://localhost:8000";
    const BUCKET: &str = "uploaded-doc-bucket";

    fn app_with_buckets(buckets: &[&str]) -> Router {
        let store = Arc::new(MemoryObjectStore::new(BASE, buckets.iter().copied()));
        let service = UploadService::new(
            store.clone(),
            SessionRegistry::new(),
            ObjectKeys::per_uploader("user_123"),
            BUCKET,
        );
        routes()
            .with_state(service)
            .merge(memory_store_routes().with_state(store))
    }

    fn app() -> Router {
        app_with_buckets(&[BUCKET])
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    async fn upload_part(app: &Router, url: &str, data: &'static str) -> String {
        let path = url.strip_prefix(BASE).unwrap();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(path)
                    .body(Body::from(data))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        response.headers()[header::ETAG]
            .to_str()
            .unwrap()
            .trim_matches('"')
            .to_string()
    }

    #[tokio::test]
    async fn full_upload_over_http() {
        let app = app();

        let (status, started) = send(
            &app,
            post_json(
                "/uploads/start",
                json!({"file_name": "report.pdf", "size": 15000000, "file_type": "PDF"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(started["part_size_in_bytes"], 10485760);
        let doc = started["document_id"].as_str().unwrap().to_string();

        let mut parts = Vec::new();
        for (n, data) in [(1, "%PDF-1.7 "), (2, "body %%EOF")] {
            let (status, cap) = send(
                &app,
                get_req(&format!("/uploads/part-url?document_id={}&part_number={}", doc, n)),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert!(cap["expiration"].is_string());
            let etag = upload_part(&app, cap["url"].as_str().unwrap(), data).await;
            parts.push(json!({"part_number": n, "etag": etag}));
        }

        let (status, done) = send(
            &app,
            post_json("/uploads/complete", json!({"document_id": doc, "parts": parts})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(done["document_id"], doc.as_str());

        let response = app
            .clone()
            .oneshot(get_req("/memory-store/objects/uploaded-doc-bucket/user_123/report.pdf"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"%PDF-1.7 body %%EOF");

        let (status, err) = send(
            &app,
            get_req(&format!("/uploads/part-url?document_id={}&part_number=1", doc)),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(err["status"], 404);
    }

    #[tokio::test]
    async fn camel_case_requests_are_accepted() {
        let app = app();
        let (status, started) = send(
            &app,
            post_json("/uploads/start", json!({"fileName": "a.pdf", "size": 10})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let doc = started["document_id"].as_str().unwrap();

        let (status, _) = send(
            &app,
            get_req(&format!("/uploads/part-url?documentId={}&partNumber=1", doc)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_sessions_are_404() {
        let app = app();
        let (status, _) = send(
            &app,
            get_req("/uploads/part-url?document_id=nope&part_number=1"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            &app,
            post_json(
                "/uploads/complete",
                json!({"document_id": "nope", "parts": [{"part_number": 1, "etag": "x"}]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Upload session not found");

        let (status, _) = send(
            &app,
            post_json("/uploads/abort", json!({"document_id": "nope"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_sessions_are_404_whatever_the_part_number() {
        let app = app();
        for n in ["4294967296", "99999999999", "-4294967296"] {
            let (status, body) = send(
                &app,
                get_req(&format!("/uploads/part-url?document_id=nope&part_number={}", n)),
            )
            .await;
            assert_eq!(status, StatusCode::NOT_FOUND, "part_number={}", n);
            assert_eq!(body["error"], "Upload session not found");
        }

        let (status, _) = send(
            &app,
            post_json(
                "/uploads/complete",
                json!({"document_id": "nope", "parts": [{"part_number": 4294967296u64, "etag": "x"}]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn out_of_range_part_number_on_live_session_keeps_it_open() {
        let app = app();
        let (_, started) = send(
            &app,
            post_json("/uploads/start", json!({"file_name": "big.pdf", "size": 1})),
        )
        .await;
        let doc = started["document_id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            get_req(&format!(
                "/uploads/part-url?document_id={}&part_number=4294967296",
                doc
            )),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("4294967296"));

        let (status, _) = send(
            &app,
            get_req(&format!("/uploads/part-url?document_id={}&part_number=1", doc)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn failed_assembly_is_a_server_fault_and_retryable() {
        let app = app();
        let (_, started) = send(
            &app,
            post_json("/uploads/start", json!({"file_name": "x.pdf", "size": 1})),
        )
        .await;
        let doc = started["document_id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            post_json(
                "/uploads/complete",
                json!({"document_id": doc, "parts": [{"part_number": 1, "etag": "missing"}]}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        // session survives, so abort still finds it
        let (status, body) =
            send(&app, post_json("/uploads/abort", json!({"document_id": doc}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["document_id"], doc.as_str());
    }

    #[tokio::test]
    async fn start_fails_when_bucket_is_missing() {
        let app = app_with_buckets(&[]);
        let (status, _) = send(
            &app,
            post_json("/uploads/start", json!({"file_name": "x.pdf", "size": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, ready) = send(&app, get_req("/readyz")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ready["checks"]["object_store"]["ok"], false);
    }

    #[tokio::test]
    async fn forged_part_url_is_forbidden() {
        let app = app();
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/memory-store/parts/not-a-real-signature")
                    .body(Body::from("x"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn health_and_readiness() {
        let app = app();
        let (status, body) = send(&app, get_req("/healthz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (status, body) = send(&app, get_req("/readyz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["open_sessions"], 0);

        let (status, body) = send(&app, get_req("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["greeting"].is_string());
    }
}
