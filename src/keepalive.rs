//! HTTP keep-alive endpoint.
//!
//! Hosting platforms that idle unused services ping `GET /`. Runs on a
//! separate tokio task; disabled when no port is configured.

use crate::store::Store;
use axum::{extract::State, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Clone)]
pub struct KeepAliveState {
    pub store: Arc<Store>,
    pub bot_name: String,
}

/// Handler for GET / - one-line liveness summary.
async fn summary(State(state): State<KeepAliveState>) -> String {
    match state.store.load().await {
        Ok(doc) => format!(
            "{} - {} channel(s) - {} member(s) - online",
            state.bot_name,
            doc.channels.len(),
            doc.member_count()
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Keep-alive could not read the store");
            format!("{} - online (store unavailable)", state.bot_name)
        }
    }
}

pub fn router(state: KeepAliveState) -> Router {
    Router::new().route("/", get(summary)).with_state(state)
}

/// Run the keep-alive HTTP server.
///
/// Binds to `0.0.0.0:port`. This is a long-running task that should be
/// spawned in the background.
pub async fn run_keepalive_server(port: u16, state: KeepAliveState) {
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Keep-alive HTTP server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind keep-alive server on {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Keep-alive server error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Channel, DocumentSeed, JsonFileBackend};
    use crate::telegram::traits::{ChannelId, UserId};

    #[tokio::test]
    async fn test_summary_counts_channels() {
        let store = Arc::new(Store::in_memory(DocumentSeed {
            super_admins: vec![UserId(1)],
            channels: vec![Channel::new(
                ChannelId(-1001),
                "VIP".to_string(),
                "https://t.me/+v".to_string(),
                0,
            )],
        }));
        let state = KeepAliveState {
            store,
            bot_name: "timegate_bot".to_string(),
        };

        assert_eq!(
            summary(State(state)).await,
            "timegate_bot - 1 channel(s) - 0 member(s) - online"
        );
    }

    #[tokio::test]
    async fn test_summary_survives_corrupt_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("members.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = Arc::new(Store::new(
            JsonFileBackend::new(&path),
            DocumentSeed::default(),
        ));
        let state = KeepAliveState {
            store,
            bot_name: "bot".to_string(),
        };

        assert_eq!(summary(State(state)).await, "bot - online (store unavailable)");
    }
}
