use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indoc::formatdoc;
use reqwest::Url;
use serde_json::{json, Value};
use tracing::debug;

use super::{format_balance, DigestSink, LowBalance};
use crate::error::DeliveryError;

const EMBED_COLOR: u32 = 0xff6b6b;
// Discord rejects embeds with more fields than this.
const MAX_EMBED_FIELDS: usize = 25;

fn digest_field(low: &LowBalance) -> Value {
    let mut value = formatdoc! {"
        **Wallet:** `{display}`
        **Balance:** {balance} {symbol}
        **Minimum:** {threshold} {symbol}
        **Send to:** `{target}`",
        display = low.display_address,
        balance = format_balance(low.balance),
        threshold = low.threshold,
        symbol = low.symbol,
        target = low.payout_target,
    };

    if let Some(link) = &low.explorer_link {
        value.push_str(&format!("\n[View Wallet]({})", link));
    }

    json!({
        "name": format!("🔴 {} ({})", low.name, low.chain.to_uppercase()),
        "value": value,
        "inline": false,
    })
}

pub fn digest_embed(lows: &[LowBalance], timestamp: DateTime<Utc>) -> Value {
    let mut fields: Vec<Value> = lows.iter().take(MAX_EMBED_FIELDS).map(digest_field).collect();

    if lows.len() > MAX_EMBED_FIELDS {
        fields.pop();
        fields.push(json!({
            "name": "…",
            "value": format!("and {} more", lows.len() - MAX_EMBED_FIELDS + 1),
            "inline": false,
        }));
    }

    json!({
        "title": "⚠️ Wallets Need Funding",
        "description": format!(
            "**{}** wallet(s) are running low on funds and require immediate attention.",
            lows.len()
        ),
        "color": EMBED_COLOR,
        "fields": fields,
        "footer": { "text": "Top up these wallets to continue operations" },
        "timestamp": timestamp.to_rfc3339(),
    })
}

/// Posts the low balance digest as a Discord webhook embed.
pub struct DiscordWebhook {
    client: reqwest::Client,
    url: Url,
}

impl DiscordWebhook {
    pub fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl DigestSink for DiscordWebhook {
    async fn send_digest(&self, lows: &[LowBalance]) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&json!({ "embeds": [digest_embed(lows, Utc::now())] }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(wallets = lows.len(), "sent discord digest");
            Ok(())
        } else {
            let body = response.text().await?;
            Err(DeliveryError::Rejected { status, body })
        }
    }
}
