use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{encode_wallets, Version, WalletStore};
use crate::{error::StoreError, wallet::WalletRecord};

const USER_AGENT: &str = "address-monitor-bot";

#[derive(Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

/// Wallet list stored as a file in a GitHub repository, via the contents API.
///
/// The blob sha doubles as the version token, GitHub refuses a write based on a stale sha.
pub struct GithubStore {
    client: reqwest::Client,
    contents_url: Url,
    token: String,
}

impl GithubStore {
    pub fn new(
        client: reqwest::Client,
        mut api_url: Url,
        repo: &str,
        path: &str,
        token: &str,
    ) -> anyhow::Result<Self> {
        // Enterprise APIs live under a path like /api/v3, join would drop its last segment.
        if !api_url.path().ends_with('/') {
            api_url.set_path(&format!("{}/", api_url.path()));
        }
        let contents_url = api_url
            .join(&format!(
                "repos/{}/contents/{}",
                repo.trim_matches('/'),
                path.trim_start_matches('/')
            ))
            .with_context(|| format!("invalid github contents path {}/{}", repo, path))?;

        Ok(Self {
            client,
            contents_url,
            token: token.to_string(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
    }
}

/// Whether a rejected PUT means our sha was stale rather than a malformed request.
fn is_conflict(status: StatusCode, body: &str) -> bool {
    match status {
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => true,
        StatusCode::UNPROCESSABLE_ENTITY => body.contains("sha"),
        _ => false,
    }
}

#[async_trait]
impl WalletStore for GithubStore {
    async fn read(&self) -> Result<(Vec<WalletRecord>, Version), StoreError> {
        let response = self.authorized(self.client.get(self.contents_url.clone())).send().await?;

        match response.status() {
            StatusCode::OK => {
                let ContentsResponse { content, sha } = response.json().await?;
                // GitHub wraps the base64 payload at 60 columns.
                let content: String = content.split_whitespace().collect();
                let wallets = serde_json::from_slice(&STANDARD.decode(content)?)?;
                Ok((wallets, Version::Sha(sha)))
            }
            // No file yet, the first write creates it.
            StatusCode::NOT_FOUND => Ok((Vec::new(), Version::Unversioned)),
            status => Err(StoreError::Status {
                status,
                body: response.text().await?,
            }),
        }
    }

    async fn write(
        &self,
        wallets: &[WalletRecord],
        version: &Version,
        message: &str,
    ) -> Result<(), StoreError> {
        let mut body = json!({
            "message": message,
            "content": STANDARD.encode(encode_wallets(wallets)?),
        });
        if let Version::Sha(sha) = version {
            body["sha"] = json!(sha);
        }

        let response = self
            .authorized(self.client.put(self.contents_url.clone()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(message, wallets = wallets.len(), "committed wallet list");
            return Ok(());
        }

        let body = response.text().await?;
        if is_conflict(status, &body) {
            debug!(%status, body, "wallet list changed since it was read");
            Err(StoreError::Conflict)
        } else {
            Err(StoreError::Status { status, body })
        }
    }
}
