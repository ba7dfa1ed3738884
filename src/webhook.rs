use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tracing::{info, warn};

use crate::{
    command::{dispatch_update, CommandCore, ReplySink},
    notify::telegram::Update,
};

#[derive(Clone)]
pub struct AppState {
    core: Arc<CommandCore>,
    replies: Arc<dyn ReplySink>,
}

impl AppState {
    pub fn new(core: CommandCore, replies: Arc<dyn ReplySink>) -> Self {
        Self {
            core: Arc::new(core),
            replies,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(banner))
        .route("/healthz", get(health))
        .route("/webhook", post(webhook))
        .with_state(state)
}

pub async fn start_server(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(router(state).into_make_service())
        .await?;

    Ok(())
}

async fn banner() -> &'static str {
    "Address Monitor Bot 🤖"
}

async fn health() -> StatusCode {
    StatusCode::OK
}

// Telegram redelivers anything that isn't a 200, so every update is acknowledged.
async fn webhook(State(state): State<AppState>, body: Bytes) -> &'static str {
    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => dispatch_update(&state.core, state.replies.as_ref(), &update).await,
        Err(err) => warn!(%err, "ignoring malformed update"),
    }

    "ok"
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use serde_json::json;

    use super::*;
    use crate::{
        command::tests::{test_registry, MemoryStore, RecordedReplies},
        test_utils::serve,
    };

    async fn app() -> (reqwest::Url, Arc<RecordedReplies>) {
        let replies = Arc::new(RecordedReplies::default());
        let core = CommandCore::new(
            test_registry(),
            Arc::new(MemoryStore::default()),
            HashSet::from(["42".to_string()]),
        );
        let url = serve(router(AppState::new(core, replies.clone()))).await;
        (url, replies)
    }

    async fn post_update(url: &reqwest::Url, body: String) -> (StatusCode, String) {
        let response = reqwest::Client::new()
            .post(url.join("webhook").unwrap())
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .unwrap();
        (response.status(), response.text().await.unwrap())
    }

    #[tokio::test]
    async fn test_command_update_is_answered() {
        let (url, replies) = app().await;

        let update = json!({
            "update_id": 1,
            "message": {"chat": {"id": -100}, "from": {"id": 42}, "text": "/add 0xABC base"}
        });
        let (status, body) = post_update(&url, update.to_string()).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
        let replies = replies.0.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "-100");
        assert!(replies[0].1.starts_with("✅ *Wallet Added*"));
    }

    #[tokio::test]
    async fn test_textless_and_malformed_updates_are_acknowledged() {
        let (url, replies) = app().await;

        let sticker = json!({"update_id": 2, "message": {"chat": {"id": -100}}});
        assert_eq!(
            post_update(&url, sticker.to_string()).await,
            (StatusCode::OK, "ok".to_string())
        );
        assert_eq!(
            post_update(&url, "not json".to_string()).await,
            (StatusCode::OK, "ok".to_string())
        );
        assert!(replies.0.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_banner_and_health() {
        let (url, _) = app().await;
        let client = reqwest::Client::new();

        let banner = client.get(url.clone()).send().await.unwrap();
        assert_eq!(banner.text().await.unwrap(), "Address Monitor Bot 🤖");

        let health = client.get(url.join("healthz").unwrap()).send().await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);
    }
}
