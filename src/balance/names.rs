use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

#[derive(Deserialize)]
struct ResolveResponse {
    name: Option<String>,
}

/// Reverse resolves 0x addresses to a human readable ENS name.
#[derive(Clone)]
pub struct NameResolver {
    client: reqwest::Client,
    base_url: Url,
}

impl NameResolver {
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    async fn fetch_name(&self, address: &str) -> anyhow::Result<Option<String>> {
        let url = self.base_url.join(address)?;
        let response = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<ResolveResponse>()
            .await?;

        Ok(response.name.filter(|name| !name.is_empty()))
    }

    /// Never fails, a missing name just means we show the address instead.
    pub async fn resolve(&self, address: &str) -> Option<String> {
        match self.fetch_name(address).await {
            Ok(name) => name,
            Err(err) => {
                debug!(address, %err, "failed to resolve name, skipping");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::test_utils::serve;

    async fn resolve_handler(Path(address): Path<String>) -> Result<Json<Value>, StatusCode> {
        match address.as_str() {
            "0xd8da6bf26964af9d7eed9e03e53415d37aa96045" => {
                Ok(Json(json!({"address": address, "name": "vitalik.eth"})))
            }
            "0x0000000000000000000000000000000000000001" => {
                Ok(Json(json!({"address": address, "name": null})))
            }
            _ => Err(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    async fn resolver() -> NameResolver {
        let url = serve(Router::new().route("/ens/resolve/:address", get(resolve_handler))).await;
        NameResolver::new(reqwest::Client::new(), url.join("ens/resolve/").unwrap())
    }

    #[tokio::test]
    async fn test_resolves_name() {
        let names = resolver().await;
        assert_eq!(
            names
                .resolve("0xd8da6bf26964af9d7eed9e03e53415d37aa96045")
                .await,
            Some("vitalik.eth".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_name_and_failures_are_none() {
        let names = resolver().await;
        assert_eq!(
            names
                .resolve("0x0000000000000000000000000000000000000001")
                .await,
            None
        );
        assert_eq!(names.resolve("0xbroken").await, None);
    }
}
