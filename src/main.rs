use anyhow::Result;
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

use config::{AppConfig, StoreBackend};
use services::{
    object_key::ObjectKeys,
    object_store::{MemoryObjectStore, ObjectStore, S3ObjectStore},
    session_registry::SessionRegistry,
    sweeper,
    upload_service::UploadService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting upload-coordinator with config: {:?}", cfg);

    // --- Object store ---
    let mut memory_store = None;
    let store: Arc<dyn ObjectStore> = match cfg.store {
        StoreBackend::S3 => {
            let s3 = S3ObjectStore::connect(&cfg.region, cfg.endpoint_url.as_deref()).await;
            if let Err(err) = s3.check_bucket(&cfg.bucket).await {
                tracing::warn!(
                    "Could not verify bucket {}: {}. Will attempt uploads anyway.",
                    cfg.bucket,
                    err
                );
            }
            Arc::new(s3)
        }
        StoreBackend::Memory => {
            let base_url = cfg.public_base_url();
            tracing::warn!(
                "Using in-memory object store; part URLs are served from {}",
                base_url
            );
            let memory = Arc::new(MemoryObjectStore::new(base_url, [cfg.bucket.clone()]));
            memory_store = Some(memory.clone());
            memory
        }
    };

    // --- Initialize core service ---
    let service = UploadService::new(
        store,
        SessionRegistry::new(),
        ObjectKeys::per_uploader(cfg.uploader_id.clone()),
        cfg.bucket.clone(),
    );

    if let Some(ttl) = cfg.session_ttl {
        tracing::info!(
            "Expiring sessions older than {:?}, sweeping every {:?}",
            ttl,
            cfg.sweep_interval
        );
        sweeper::spawn(service.clone(), ttl, cfg.sweep_interval);
    }

    // --- Build router ---
    let mut app: Router = routes::routes::routes().with_state(service);
    if let Some(memory) = memory_store {
        app = app.merge(routes::routes::memory_store_routes().with_state(memory));
    }

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
