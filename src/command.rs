use std::{collections::HashSet, str::FromStr, sync::Arc};

use async_trait::async_trait;
use indoc::indoc;
use itertools::Itertools;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    chain::ChainRegistry,
    error::{DeliveryError, StoreError, ValidationError},
    notify::{
        telegram::{escape_code_block, escape_str, Message, Update},
        TelegramApi, TelegramSafeMessage,
    },
    store::WalletStore,
    wallet::{self, shorten, WalletRecord},
};

const MAX_WRITE_ATTEMPTS: usize = 3;
const DEFAULT_THRESHOLD: Decimal = Decimal::from_parts(1, 0, 0, false, 1);

/// Command menu registered with Telegram.
pub const COMMAND_MENU: &[(&str, &str)] = &[
    ("add", "Add a wallet to track"),
    ("remove", "Remove a tracked wallet"),
    ("list", "List tracked wallets in this group"),
    ("chains", "Show available chains"),
    ("help", "Show help and commands"),
];

const HELP_COMMANDS: &str = indoc! {"
    /add <address> <chain> [threshold] [name]
    /remove <address> [chain]
    /list - Show tracked wallets
    /chains - List available chains"
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UsageOf {
    Add,
    Remove,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Add {
        address: String,
        chain: String,
        threshold: Option<String>,
        name: Option<String>,
    },
    Remove {
        address: String,
        chain: Option<String>,
    },
    List,
    Chains,
    Help,
    /// A known command missing its required arguments.
    Usage(UsageOf),
}

impl Command {
    /// Parses `/command@botname args…`. Returns `None` for anything that is not one of our
    /// commands.
    pub fn parse(text: &str) -> Option<Self> {
        let mut words = text.split_whitespace();
        let head = words.next()?.strip_prefix('/')?;
        let command = head
            .split_once('@')
            .map_or(head, |(command, _bot)| command)
            .to_lowercase();
        let args = words.collect_vec();

        let command = match command.as_str() {
            "add" => match args.as_slice() {
                [address, chain, rest @ ..] => Command::Add {
                    address: address.to_string(),
                    chain: chain.to_string(),
                    threshold: rest.first().map(|threshold| threshold.to_string()),
                    name: rest
                        .get(1..)
                        .filter(|name| !name.is_empty())
                        .map(|name| name.join(" ")),
                },
                _ => Command::Usage(UsageOf::Add),
            },
            "remove" => match args.as_slice() {
                [address, rest @ ..] => Command::Remove {
                    address: address.to_string(),
                    chain: rest.first().map(|chain| chain.to_string()),
                },
                [] => Command::Usage(UsageOf::Remove),
            },
            "list" => Command::List,
            "chains" => Command::Chains,
            "help" | "start" => Command::Help,
            _ => return None,
        };

        Some(command)
    }

    fn requires_admin(&self) -> bool {
        matches!(
            self,
            Command::Add { .. } | Command::Remove { .. } | Command::Usage(_)
        )
    }
}

/// Who sent a command and where it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandContext {
    pub chat_id: String,
    pub user_id: Option<String>,
}

impl From<&Message> for CommandContext {
    fn from(message: &Message) -> Self {
        Self {
            chat_id: message.chat.id.to_string(),
            user_id: message.from.as_ref().map(|user| user.id.to_string()),
        }
    }
}

#[derive(Debug, Error)]
enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Parses, authorises and executes chat commands against the wallet store.
pub struct CommandCore {
    registry: Arc<ChainRegistry>,
    store: Arc<dyn WalletStore>,
    admin_ids: HashSet<String>,
}

impl CommandCore {
    pub fn new(
        registry: Arc<ChainRegistry>,
        store: Arc<dyn WalletStore>,
        admin_ids: HashSet<String>,
    ) -> Self {
        Self {
            registry,
            store,
            admin_ids,
        }
    }

    fn is_admin(&self, context: &CommandContext) -> bool {
        context
            .user_id
            .as_ref()
            .map_or(false, |user_id| self.admin_ids.contains(user_id))
    }

    /// Handles one chat message. `None` means the text was not a command and gets no reply.
    pub async fn handle(&self, text: &str, context: &CommandContext) -> Option<TelegramSafeMessage> {
        let command = Command::parse(text)?;
        debug!(?command, chat_id = %context.chat_id, "handling command");

        let result = if command.requires_admin() && !self.is_admin(context) {
            warn!(user_id = ?context.user_id, chat_id = %context.chat_id, "unauthorized wallet change");
            Err(ValidationError::Unauthorized.into())
        } else {
            self.execute(command, context).await
        };

        let reply = match result {
            Ok(reply) => reply,
            Err(CommandError::Validation(ValidationError::Usage(usage))) => {
                TelegramSafeMessage::new(&usage)
            }
            Err(CommandError::Validation(err)) => TelegramSafeMessage::new(&format!("❌ {}", err)),
            Err(CommandError::Store(StoreError::Conflict)) => {
                warn!(chat_id = %context.chat_id, "wallet list kept changing, giving up");
                TelegramSafeMessage::new(
                    "⚠️ The wallet list was changed concurrently, please try again.",
                )
            }
            Err(CommandError::Store(err)) => {
                error!(%err, chat_id = %context.chat_id, "failed to update wallet list");
                TelegramSafeMessage::new("❌ Failed to update the wallet list, please try again later.")
            }
        };

        Some(reply)
    }

    async fn execute(
        &self,
        command: Command,
        context: &CommandContext,
    ) -> Result<TelegramSafeMessage, CommandError> {
        match command {
            Command::Add {
                address,
                chain,
                threshold,
                name,
            } => self.add(address, &chain, threshold.as_deref(), name, context).await,
            Command::Remove { address, chain } => {
                self.remove(&address, chain.as_deref(), context).await
            }
            Command::List => self.list(context).await,
            Command::Chains => Ok(self.chains()),
            Command::Help => Ok(help()),
            Command::Usage(usage) => Err(ValidationError::Usage(self.usage(usage)).into()),
        }
    }

    fn usage(&self, usage: UsageOf) -> String {
        match usage {
            UsageOf::Add => format!(
                "Usage: /add <address> <chain> [threshold] [name]\n\nChains: {}\n\nExample: /add 0x123... base 0.1 Sponsor",
                self.registry.ids()
            ),
            UsageOf::Remove => "Usage: /remove <address> [chain]".to_string(),
        }
    }

    async fn add(
        &self,
        address: String,
        chain: &str,
        threshold: Option<&str>,
        name: Option<String>,
        context: &CommandContext,
    ) -> Result<TelegramSafeMessage, CommandError> {
        let preset = self
            .registry
            .lookup(chain)
            .ok_or_else(|| ValidationError::UnknownChain {
                chain: chain.to_string(),
                available: self.registry.ids(),
            })?;
        let threshold = parse_threshold(threshold)?;

        let wallet = WalletRecord {
            name: name.unwrap_or_else(|| format!("{} wallet", preset.id)),
            address,
            chain: preset.id.clone(),
            threshold,
            origin_context: context.chat_id.clone(),
        };

        let message = format!("Add wallet: {}", wallet.name);
        self.update_wallets(&message, |wallets| {
            wallet::add_wallet(wallets, wallet.clone())
        })
        .await?;

        info!(name = %wallet.name, chain = %wallet.chain, address = %wallet.address, chat_id = %wallet.origin_context, "added wallet");

        Ok(TelegramSafeMessage::from_escaped_string(format!(
            "✅ *Wallet Added*\n\n\
             📛 Name: {name}\n\
             🔗 Chain: {chain}\n\
             📍 Address: `{address}`\n\
             📉 Threshold: {threshold} {symbol}",
            name = escape_str(&wallet.name),
            chain = escape_str(&wallet.chain),
            address = escape_code_block(&shorten(&wallet.address, 10, 6)),
            threshold = escape_str(&wallet.threshold.to_string()),
            symbol = escape_str(&preset.symbol),
        )))
    }

    async fn remove(
        &self,
        address: &str,
        chain: Option<&str>,
        context: &CommandContext,
    ) -> Result<TelegramSafeMessage, CommandError> {
        let message = format!(
            "Remove wallet: {}...",
            address.chars().take(10).collect::<String>()
        );
        let removed = self
            .update_wallets(&message, |wallets| {
                wallet::remove_wallet(wallets, address, chain, &context.chat_id)
            })
            .await?;

        info!(address, chain = ?chain, removed = removed.len(), chat_id = %context.chat_id, "removed wallet");

        Ok(TelegramSafeMessage::from_escaped_string(format!(
            "✅ Removed `{}`",
            escape_code_block(&shorten(address, 10, 6))
        )))
    }

    async fn list(&self, context: &CommandContext) -> Result<TelegramSafeMessage, CommandError> {
        let (wallets, _) = self.store.read().await?;
        let scoped = wallet::wallets_in_scope(&wallets, &context.chat_id).collect_vec();

        if scoped.is_empty() {
            return Ok(TelegramSafeMessage::new(
                "No wallets tracked in this group.\n\nUse /add to add one.",
            ));
        }

        let list = scoped
            .iter()
            .enumerate()
            .map(|(index, wallet)| {
                let symbol = self
                    .registry
                    .lookup(&wallet.chain)
                    .map_or("?", |preset| preset.symbol.as_str());
                format!(
                    "{}\\. *{}*\n   `{}`\n   Chain: {} \\| Threshold: {} {}",
                    index + 1,
                    escape_str(&wallet.name),
                    escape_code_block(&shorten(&wallet.address, 10, 6)),
                    escape_str(&wallet.chain),
                    escape_str(&wallet.threshold.normalize().to_string()),
                    escape_str(symbol),
                )
            })
            .join("\n\n");

        Ok(TelegramSafeMessage::from_escaped_string(format!(
            "📋 *Tracked Wallets*\n\n{}",
            list
        )))
    }

    fn chains(&self) -> TelegramSafeMessage {
        let chains = self
            .registry
            .iter()
            .map(|preset| {
                format!(
                    "• `{}` \\({}\\)",
                    escape_code_block(&preset.id),
                    escape_str(&preset.symbol)
                )
            })
            .join("\n");

        TelegramSafeMessage::from_escaped_string(format!("🔗 *Available Chains*\n\n{}", chains))
    }

    /// Read, change and write the wallet list, starting over when someone else wrote in between.
    async fn update_wallets<T, F>(&self, message: &str, mut change: F) -> Result<T, CommandError>
    where
        F: FnMut(&mut Vec<WalletRecord>) -> Result<T, ValidationError> + Send,
        T: Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let (mut wallets, version) = self.store.read().await?;
            let outcome = change(&mut wallets)?;

            match self.store.write(&wallets, &version, message).await {
                Ok(()) => return Ok(outcome),
                Err(StoreError::Conflict) => {
                    warn!(attempt, message, "wallet list changed concurrently, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(StoreError::Conflict.into())
    }
}

fn parse_threshold(threshold: Option<&str>) -> Result<Decimal, ValidationError> {
    let Some(threshold) = threshold else {
        return Ok(DEFAULT_THRESHOLD);
    };

    match Decimal::from_str(threshold) {
        Ok(parsed) if !parsed.is_sign_negative() => Ok(parsed.normalize()),
        _ => Err(ValidationError::InvalidThreshold(threshold.to_string())),
    }
}

fn help() -> TelegramSafeMessage {
    TelegramSafeMessage::from_escaped_string(format!(
        "🤖 *Address Monitor Bot*\n\n*Commands:*\n{}\n\n_{}_",
        escape_str(HELP_COMMANDS),
        escape_str("Only admins can add/remove wallets.")
    ))
}

/// Where command replies go.
#[async_trait]
pub trait ReplySink: Send + Sync {
    async fn reply(&self, chat_id: &str, message: &TelegramSafeMessage) -> Result<(), DeliveryError>;
}

#[async_trait]
impl ReplySink for TelegramApi {
    async fn reply(&self, chat_id: &str, message: &TelegramSafeMessage) -> Result<(), DeliveryError> {
        self.send_message(chat_id, message).await
    }
}

/// Runs one Telegram update through the command core and sends the reply, if any.
///
/// Failed replies are logged, never returned, so a bad chat can't stall the update stream.
pub async fn dispatch_update(core: &CommandCore, replies: &dyn ReplySink, update: &Update) {
    let Some(message) = &update.message else {
        return;
    };
    let Some(text) = &message.text else {
        return;
    };

    let context = CommandContext::from(message);
    if let Some(reply) = core.handle(text, &context).await {
        if let Err(err) = replies.reply(&context.chat_id, &reply).await {
            error!(%err, chat_id = %context.chat_id, update_id = update.update_id, "failed to send command reply");
        }
    }
}
