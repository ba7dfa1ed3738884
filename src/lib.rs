mod balance;
mod bot;
mod chain;
mod check;
mod command;
mod config;
mod env;
mod error;
mod log;
mod notify;
mod store;
#[cfg(test)]
mod test_utils;
mod wallet;
mod webhook;

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Url;
use tracing::{info, warn};

use crate::{
    balance::RpcBalanceQuery,
    chain::ChainRegistry,
    check::check_all,
    command::CommandCore,
    config::{AppConfig, TelegramConfig},
    notify::{format_balance, notify_all, DigestSink, DiscordWebhook, TelegramApi},
    webhook::AppState,
};

struct Services {
    config: AppConfig,
    client: reqwest::Client,
    registry: Arc<ChainRegistry>,
    telegram: TelegramApi,
}

impl Services {
    fn from_env() -> Result<Self> {
        log::init();

        let config = AppConfig::from_env();
        let client = config
            .http_client()
            .context("failed to build http client")?;
        let registry = Arc::new(ChainRegistry::from_config(&config)?);
        let telegram = TelegramApi::new(
            client.clone(),
            config.telegram_api_url.clone(),
            &config.telegram_bot_token,
        );

        Ok(Self {
            config,
            client,
            registry,
            telegram,
        })
    }

    fn command_core(&self) -> Result<CommandCore> {
        let store = store::from_config(&self.config, self.client.clone())?;
        Ok(CommandCore::new(
            self.registry.clone(),
            store,
            self.config.admin_ids.clone(),
        ))
    }
}

/// One pass over every stored wallet: query balances, then alert on the low ones.
pub async fn run_balance_check() -> Result<()> {
    let Services {
        config,
        client,
        registry,
        telegram,
    } = Services::from_env()?;

    let store = store::from_config(&config, client.clone())?;
    let (wallets, _) = store.read().await.context("failed to read wallet list")?;
    info!(wallets = wallets.len(), "checking wallet balances");

    let query = RpcBalanceQuery::from_config(&config, registry.clone(), client.clone());
    let results = check_all(&query, wallets, config.max_concurrent_queries).await;

    for result in &results {
        let symbol = registry
            .lookup(&result.wallet.chain)
            .map_or("", |preset| preset.symbol.as_str());
        let balance = format!("{} {}", format_balance(result.balance), symbol);
        if result.is_low {
            warn!(name = %result.wallet.name, chain = %result.wallet.chain, %balance, threshold = %result.wallet.threshold, "balance below threshold");
        } else {
            info!(name = %result.wallet.name, chain = %result.wallet.chain, %balance, "balance ok");
        }
    }

    let discord = config
        .discord_webhook_url
        .clone()
        .map(|url| DiscordWebhook::new(client, url));
    let summary = notify_all(
        &results,
        &registry,
        &telegram,
        discord.as_ref().map(|discord| discord as &dyn DigestSink),
    )
    .await;
    info!(?summary, "notifications done");

    Ok(())
}

/// Serves chat commands by long polling Telegram.
pub async fn run_bot() -> Result<()> {
    let services = Services::from_env()?;
    let core = services.command_core()?;
    bot::run_bot(core, services.telegram).await
}

/// Serves chat commands pushed by Telegram to `/webhook`.
pub async fn start_webhook_server() -> Result<()> {
    let services = Services::from_env()?;
    let core = services.command_core()?;
    let state = AppState::new(core, Arc::new(services.telegram));
    webhook::start_server(state, services.config.port).await
}

/// Points Telegram at `url` for update delivery.
pub async fn set_webhook(url: &str) -> Result<()> {
    let url = Url::parse(url).with_context(|| format!("invalid webhook url {}", url))?;

    log::init();
    let config = TelegramConfig::from_env();
    let client = config
        .http_client()
        .context("failed to build http client")?;
    let telegram = TelegramApi::new(client, config.telegram_api_url, &config.telegram_bot_token);

    telegram
        .set_webhook(&url)
        .await
        .context("failed to set webhook")?;
    info!(%url, "webhook set");

    Ok(())
}
