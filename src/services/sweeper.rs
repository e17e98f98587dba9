//! Background expiry of abandoned upload sessions.

use crate::services::upload_service::UploadService;
use std::time::Duration;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error, info};

/// Spawn a task that, every `interval`, aborts sessions older than `ttl`.
pub fn spawn(service: UploadService, ttl: Duration, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ttl = match chrono::Duration::from_std(ttl) {
            Ok(ttl) => ttl,
            Err(err) => {
                error!("session ttl {:?} out of range, sweeper disabled: {}", ttl, err);
                return;
            }
        };

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let expired = service.expire_sessions(ttl).await;
            if expired > 0 {
                info!("sweeper expired {} upload session(s)", expired);
            } else {
                debug!("sweeper found no expired sessions");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::upload::UploadSession,
        services::{
            object_key::ObjectKeys, object_store::MemoryObjectStore,
            session_registry::SessionRegistry,
        },
    };
    use chrono::Utc;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn sweeper_removes_stale_sessions_on_tick() {
        let store = Arc::new(MemoryObjectStore::new("http://localhost:8000", ["b"]));
        let service = UploadService::new(
            store.clone(),
            SessionRegistry::new(),
            ObjectKeys::per_uploader("u"),
            "b",
        );
        service
            .registry()
            .insert(UploadSession {
                document_id: "old".into(),
                store_upload_id: "gone-already".into(),
                file_name: "old.pdf".into(),
                created_at: Utc::now() - chrono::Duration::hours(3),
            })
            .await
            .unwrap();

        let handle = spawn(
            service.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );

        tokio::time::sleep(Duration::from_secs(61)).await;
        // let the sweep run to completion
        for _ in 0..10 {
            if service.registry().len().await == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(service.registry().len().await, 0);
        assert_eq!(store.calls().abort, 1);
        handle.abort();
    }
}
