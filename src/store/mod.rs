mod file;
mod github;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::{config::AppConfig, error::StoreError, wallet::WalletRecord};

pub use file::FileStore;
pub use github::GithubStore;

/// Token identifying the version of the list a write is based on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Version {
    /// Backend without versioning, every write wins.
    Unversioned,
    Sha(String),
}

/// Whole-list persistence for tracked wallets.
///
/// Callers read, change the list in memory and write it back with the version they read. A
/// versioned backend rejects the write with [`StoreError::Conflict`] when someone else wrote in
/// between.
#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn read(&self) -> Result<(Vec<WalletRecord>, Version), StoreError>;

    async fn write(
        &self,
        wallets: &[WalletRecord],
        version: &Version,
        message: &str,
    ) -> Result<(), StoreError>;
}

/// Pretty printed so diffs of the stored list stay readable.
fn encode_wallets(wallets: &[WalletRecord]) -> Result<String, StoreError> {
    Ok(serde_json::to_string_pretty(wallets)?)
}

pub fn from_config(config: &AppConfig, client: reqwest::Client) -> Result<Arc<dyn WalletStore>> {
    match config.github_store() {
        Some((repo, token)) => {
            info!(repo, path = %config.wallets_path, "using github wallet store");
            Ok(Arc::new(GithubStore::new(
                client,
                config.github_api_url.clone(),
                repo,
                &config.wallets_path,
                token,
            )?))
        }
        None => {
            info!(path = %config.wallets_path, "using local wallet file");
            Ok(Arc::new(FileStore::new(&config.wallets_path)))
        }
    }
}
