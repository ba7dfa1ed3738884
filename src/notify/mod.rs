pub mod discord;
pub mod telegram;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{error, info};

use crate::{chain::ChainRegistry, check::BalanceResult, error::DeliveryError};

pub use discord::DiscordWebhook;
pub use telegram::{TelegramApi, TelegramSafeMessage};

/// Everything an alert or digest entry shows about one low wallet.
#[derive(Clone, Debug, PartialEq)]
pub struct LowBalance {
    pub name: String,
    pub chain: String,
    pub symbol: String,
    pub balance: Decimal,
    pub threshold: Decimal,
    pub display_address: String,
    pub payout_target: String,
    pub explorer_link: Option<String>,
    pub origin_context: String,
}

impl LowBalance {
    pub fn new(result: &BalanceResult, registry: &ChainRegistry) -> Self {
        let preset = registry.lookup(&result.wallet.chain);
        Self {
            name: result.wallet.name.clone(),
            chain: result.wallet.chain.clone(),
            symbol: preset
                .map(|preset| preset.symbol.clone())
                .unwrap_or_else(|| result.wallet.chain.to_uppercase()),
            balance: result.balance,
            threshold: result.wallet.threshold,
            display_address: result.display_address(),
            payout_target: result.payout_target().to_string(),
            explorer_link: preset.map(|preset| preset.explorer_link(&result.wallet.address)),
            origin_context: result.wallet.origin_context.clone(),
        }
    }
}

/// Balances are shown with four decimals, `0.0500`.
pub fn format_balance(balance: Decimal) -> String {
    let mut balance = balance;
    balance.rescale(4);
    balance.to_string()
}

/// Targeted alert to the chat a wallet was registered from.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send_alert(&self, low: &LowBalance) -> Result<(), DeliveryError>;
}

/// One aggregated delivery covering all low wallets.
#[async_trait]
pub trait DigestSink: Send + Sync {
    async fn send_digest(&self, lows: &[LowBalance]) -> Result<(), DeliveryError>;
}

#[derive(Clone, Debug, PartialEq)]
pub enum DigestStatus {
    /// Nothing was low, or no digest channel is configured.
    Skipped,
    Sent,
    Failed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NotifySummary {
    pub alerts_sent: usize,
    pub alerts_failed: usize,
    pub digest: DigestStatus,
}

/// Alerts every low wallet's chat, one by one, then sends a single digest.
///
/// A failed delivery is logged and never stops the others, alerts and digest included.
pub async fn notify_all(
    results: &[BalanceResult],
    registry: &ChainRegistry,
    alerts: &dyn AlertSink,
    digest: Option<&dyn DigestSink>,
) -> NotifySummary {
    let lows: Vec<LowBalance> = results
        .iter()
        .filter(|result| result.is_low)
        .map(|result| LowBalance::new(result, registry))
        .collect();

    let mut summary = NotifySummary {
        alerts_sent: 0,
        alerts_failed: 0,
        digest: DigestStatus::Skipped,
    };

    for low in &lows {
        match alerts.send_alert(low).await {
            Ok(()) => {
                info!(name = %low.name, chat = %low.origin_context, "alert sent");
                summary.alerts_sent += 1;
            }
            Err(err) => {
                error!(name = %low.name, chat = %low.origin_context, %err, "alert failed");
                summary.alerts_failed += 1;
            }
        }
    }

    if let Some(digest) = digest.filter(|_| !lows.is_empty()) {
        summary.digest = match digest.send_digest(&lows).await {
            Ok(()) => {
                info!(wallets = lows.len(), "digest sent");
                DigestStatus::Sent
            }
            Err(err) => {
                error!(wallets = lows.len(), %err, "digest failed");
                DigestStatus::Failed
            }
        };
    }

    summary
}
