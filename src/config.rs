use std::{collections::HashSet, time::Duration};

use reqwest::Url;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};

use crate::env::{deserialize_hash_set, deserialize_optional_url, deserialize_url, get_app_config};

#[serde_as]
#[derive(Clone, Deserialize)]
pub struct AppConfig {
    /// Telegram user ids allowed to add and remove wallets.
    #[serde(default, deserialize_with = "deserialize_hash_set")]
    pub admin_ids: HashSet<String>,
    pub alchemy_api_key: String,
    /// Secondary channel for the low balance digest. Digests are skipped when unset.
    #[serde(default, deserialize_with = "deserialize_optional_url")]
    pub discord_webhook_url: Option<Url>,
    #[serde(
        default = "default_filecoin_rpc_url",
        deserialize_with = "deserialize_url"
    )]
    pub filecoin_rpc_url: Url,
    #[serde(
        default = "default_github_api_url",
        deserialize_with = "deserialize_url"
    )]
    pub github_api_url: Url,
    /// `owner/name` of the repository holding the wallet list.
    pub github_repo: Option<String>,
    pub github_token: Option<String>,
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
    #[serde(default = "default_name_resolution")]
    pub name_resolution: bool,
    #[serde(
        default = "default_name_resolver_url",
        deserialize_with = "deserialize_url"
    )]
    pub name_resolver_url: Url,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_request_timeout", rename = "request_timeout_secs")]
    pub request_timeout: Duration,
    #[serde(
        default = "default_telegram_api_url",
        deserialize_with = "deserialize_url"
    )]
    pub telegram_api_url: Url,
    pub telegram_bot_token: String,
    /// Local file path, or the path inside `github_repo` when the GitHub store is used.
    #[serde(default = "default_wallets_path")]
    pub wallets_path: String,
}

/// Just enough config to call the bot API, for tooling that never touches a chain or the store.
#[serde_as]
#[derive(Clone, Deserialize)]
pub struct TelegramConfig {
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_request_timeout", rename = "request_timeout_secs")]
    pub request_timeout: Duration,
    #[serde(
        default = "default_telegram_api_url",
        deserialize_with = "deserialize_url"
    )]
    pub telegram_api_url: Url,
    pub telegram_bot_token: String,
}

impl TelegramConfig {
    pub fn from_env() -> Self {
        get_app_config()
    }

    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
    }
}

fn default_filecoin_rpc_url() -> Url {
    Url::parse("https://api.node.glif.io/rpc/v1").expect("valid default url")
}

fn default_github_api_url() -> Url {
    Url::parse("https://api.github.com").expect("valid default url")
}

fn default_max_concurrent_queries() -> usize {
    16
}

fn default_name_resolution() -> bool {
    true
}

fn default_name_resolver_url() -> Url {
    Url::parse("https://api.ensideas.com/ens/resolve/").expect("valid default url")
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_telegram_api_url() -> Url {
    Url::parse("https://api.telegram.org").expect("valid default url")
}

fn default_wallets_path() -> String {
    "wallets.json".to_string()
}

impl AppConfig {
    /// Reads the config from the environment, exits the process if it is invalid.
    pub fn from_env() -> Self {
        get_app_config()
    }

    /// Both the repo and a token are needed to talk to GitHub, otherwise we fall back to the
    /// local file.
    pub fn github_store(&self) -> Option<(&str, &str)> {
        match (&self.github_repo, &self.github_token) {
            (Some(repo), Some(token)) if !repo.is_empty() && !token.is_empty() => {
                Some((repo.as_str(), token.as_str()))
            }
            _ => None,
        }
    }

    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    envy::from_iter(
        vec![
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("ALCHEMY_API_KEY", "alchemy-key"),
            ("ADMIN_IDS", "42"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string())),
    )
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_vars(vars: Vec<(&str, &str)>) -> AppConfig {
        envy::from_iter(
            vars.into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        )
        .unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = test_config();
        assert_eq!(config.wallets_path, "wallets.json");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.max_concurrent_queries, 16);
        assert!(config.name_resolution);
        assert!(config.discord_webhook_url.is_none());
        assert!(config.github_store().is_none());
        assert!(config.admin_ids.contains("42"));
    }

    #[test]
    fn test_overrides() {
        let config = from_vars(vec![
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("ALCHEMY_API_KEY", "alchemy-key"),
            ("REQUEST_TIMEOUT_SECS", "3"),
            ("GITHUB_REPO", "acme/wallets"),
            ("GITHUB_TOKEN", "ghp_x"),
            ("NAME_RESOLUTION", "false"),
        ]);
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.github_store(), Some(("acme/wallets", "ghp_x")));
        assert!(!config.name_resolution);
    }

    #[test]
    fn test_telegram_config_needs_only_the_token() {
        let config: TelegramConfig = envy::from_iter(vec![(
            "TELEGRAM_BOT_TOKEN".to_string(),
            "123:abc".to_string(),
        )])
        .unwrap();

        assert_eq!(config.telegram_bot_token, "123:abc");
        assert_eq!(config.telegram_api_url.as_str(), "https://api.telegram.org/");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_github_store_needs_token() {
        let config = from_vars(vec![
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("ALCHEMY_API_KEY", "alchemy-key"),
            ("GITHUB_REPO", "acme/wallets"),
        ]);
        assert!(config.github_store().is_none());
    }
}
