use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{format_balance, AlertSink, LowBalance};
use crate::error::DeliveryError;

// Used to escape characters in telegram messages.
// https://core.telegram.org/bots/api#markdownv2-style
pub fn escape_str(input: &str) -> String {
    let mut output = String::new();
    for c in input.chars() {
        match c {
            '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '=' | '|'
            | '{' | '}' | '.' | '!' | '\\' => {
                output.push('\\');
            }
            _ => (),
        };
        output.push(c);
    }
    output
}

// Used to escape characters inside markdown code blocks
pub fn escape_code_block(input: &str) -> String {
    let mut output = String::new();
    for c in input.chars() {
        match c {
            '`' | '\\' => {
                output.push('\\');
            }
            _ => {}
        }
        output.push(c);
    }
    output
}

// Inside the (...) part of an inline link only ) and \ need escaping.
pub fn escape_link_url(input: &str) -> String {
    let mut output = String::new();
    for c in input.chars() {
        match c {
            ')' | '\\' => {
                output.push('\\');
            }
            _ => {}
        }
        output.push(c);
    }
    output
}

/// Formats a message to be compatible with the Telegram bot API.
/// Respect escaping as described in: https://core.telegram.org/bots/api#markdownv2-style
/// Respect character limit of 4096.
#[derive(Clone, Debug, PartialEq)]
pub struct TelegramSafeMessage(String);

const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;
// Leave a little room for the escape characters and unknowns.
pub const TELEGRAM_SAFE_MESSAGE_LENGTH: usize = TELEGRAM_MAX_MESSAGE_LENGTH - 96;

impl TelegramSafeMessage {
    pub fn new(input: &str) -> Self {
        let escaped = escape_str(input);
        Self::from_escaped_string(escaped)
    }

    fn slice_to_limit(self) -> Self {
        let mut sliced: String = self.0.chars().take(TELEGRAM_SAFE_MESSAGE_LENGTH).collect();
        // Don't leave a dangling escape behind.
        let trailing_escapes = sliced.chars().rev().take_while(|c| *c == '\\').count();
        if trailing_escapes % 2 == 1 {
            sliced.pop();
        }
        Self(sliced)
    }

    pub fn from_escaped_string(input: String) -> Self {
        if input.chars().count() > TELEGRAM_SAFE_MESSAGE_LENGTH {
            warn!(
                "telegram message too long, truncating to {} characters",
                TELEGRAM_SAFE_MESSAGE_LENGTH
            );
            Self(input).slice_to_limit()
        } else {
            Self(input)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TelegramSafeMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn format_low_balance_alert(low: &LowBalance) -> TelegramSafeMessage {
    let mut message = format!(
        "⚠️ *Low Balance Alert*\n\n\
         *{name}* is running low on *{chain}*\n\n\
         📍 Wallet: `{display}`\n\
         💰 Current: *{balance} {symbol}*\n\
         📉 Minimum: *{threshold} {symbol}*\n\n\
         👉 *Action Required:* Send funds to `{target}`",
        name = escape_str(&low.name),
        chain = escape_str(&low.chain.to_uppercase()),
        display = escape_code_block(&low.display_address),
        balance = escape_str(&format_balance(low.balance)),
        threshold = escape_str(&low.threshold.to_string()),
        symbol = escape_str(&low.symbol),
        target = escape_code_block(&low.payout_target),
    );

    if let Some(link) = &low.explorer_link {
        message.push_str(&format!("\n\n[View Wallet]({})", escape_link_url(link)));
    }

    TelegramSafeMessage::from_escaped_string(message)
}

#[derive(Debug, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// Thin client for the Telegram bot API.
#[derive(Clone)]
pub struct TelegramApi {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl TelegramApi {
    pub fn new(client: reqwest::Client, base_url: Url, token: &str) -> Self {
        Self {
            client,
            base_url,
            token: token.to_string(),
        }
    }

    fn method_url(&self, method: &str) -> Result<Url, DeliveryError> {
        self.base_url
            // Tokens contain a colon, without ./ the url parser reads `bot<id>` as a scheme.
            .join(&format!("./bot{}/{}", self.token, method))
            .map_err(|err| DeliveryError::Rejected {
                status: StatusCode::BAD_REQUEST,
                body: err.to_string(),
            })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Option<Duration>,
    ) -> Result<T, DeliveryError> {
        let mut request = self.client.post(self.method_url(method)?).json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();

        match status {
            StatusCode::OK => {
                let body = response.json::<ApiResponse<T>>().await?;
                match body {
                    ApiResponse {
                        ok: true,
                        result: Some(result),
                        ..
                    } => Ok(result),
                    ApiResponse { description, .. } => Err(DeliveryError::Rejected {
                        status,
                        body: description.unwrap_or_default(),
                    }),
                }
            }
            _ => {
                let body = response.text().await?;
                Err(DeliveryError::Rejected { status, body })
            }
        }
    }

    /// Make sure the message is escaped, it is sent as MarkdownV2.
    pub async fn send_message(
        &self,
        chat_id: &str,
        message: &TelegramSafeMessage,
    ) -> Result<(), DeliveryError> {
        let body = json!({
            "chat_id": chat_id,
            "text": message.as_str(),
            "parse_mode": "MarkdownV2",
            "disable_web_page_preview": true,
        });

        self.call::<Value>("sendMessage", &body, None).await?;
        debug!(chat_id, %message, "sent telegram message");
        Ok(())
    }

    /// Long polls for updates after `offset`, waiting up to `poll` for new ones.
    pub async fn get_updates(&self, offset: i64, poll: Duration) -> Result<Vec<Update>, DeliveryError> {
        let body = json!({
            "offset": offset,
            "timeout": poll.as_secs(),
            "allowed_updates": ["message"],
        });

        // The request has to outlive the poll window.
        self.call("getUpdates", &body, Some(poll + Duration::from_secs(10)))
            .await
    }

    /// Registers the command menu shown by Telegram clients.
    pub async fn set_my_commands(&self, commands: &[(&str, &str)]) -> Result<(), DeliveryError> {
        let commands: Vec<Value> = commands
            .iter()
            .map(|(command, description)| json!({"command": command, "description": description}))
            .collect();

        self.call::<bool>("setMyCommands", &json!({ "commands": commands }), None)
            .await?;
        Ok(())
    }

    pub async fn set_webhook(&self, url: &Url) -> Result<(), DeliveryError> {
        self.call::<bool>("setWebhook", &json!({ "url": url.as_str() }), None)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AlertSink for TelegramApi {
    async fn send_alert(&self, low: &LowBalance) -> Result<(), DeliveryError> {
        self.send_message(&low.origin_context, &format_low_balance_alert(low))
            .await
    }
}
