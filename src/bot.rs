use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::{
    command::{dispatch_update, CommandCore, COMMAND_MENU},
    error::DeliveryError,
    notify::TelegramApi,
};

const POLL_WINDOW: Duration = Duration::from_secs(30);
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Fetches one batch of updates after `offset`, dispatches them and returns the next offset.
async fn poll_once(
    core: &CommandCore,
    telegram: &TelegramApi,
    offset: i64,
) -> Result<i64, DeliveryError> {
    let updates = telegram.get_updates(offset, POLL_WINDOW).await?;
    debug!(count = updates.len(), offset, "received updates");

    let mut next_offset = offset;
    for update in &updates {
        next_offset = next_offset.max(update.update_id + 1);
        dispatch_update(core, telegram, update).await;
    }

    Ok(next_offset)
}

/// Long polls Telegram for commands until the process is stopped.
pub async fn run_bot(core: CommandCore, telegram: TelegramApi) -> Result<()> {
    telegram
        .set_my_commands(COMMAND_MENU)
        .await
        .context("failed to register command menu")?;
    info!("starting telegram bot");

    let mut offset = 0;
    loop {
        match poll_once(&core, &telegram, offset).await {
            Ok(next_offset) => offset = next_offset,
            Err(err) => {
                error!(%err, "failed to poll telegram updates");
                sleep(RETRY_DELAY).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, sync::Arc};

    use super::*;
    use crate::{
        command::tests::{test_registry, MemoryStore},
        notify::telegram::tests::api,
        wallet::test_wallet,
    };

    #[tokio::test]
    async fn test_poll_once_dispatches_and_advances_offset() {
        let (telegram, sent) = api().await;
        let store = Arc::new(MemoryStore::with_wallets(vec![test_wallet("0xABC", "base", "-100")]));
        let core = CommandCore::new(test_registry(), store, HashSet::new());

        let offset = poll_once(&core, &telegram, 0).await.unwrap();

        assert_eq!(offset, 9);
        let sent = sent.lock().unwrap();
        let replies = sent
            .iter()
            .filter(|call| call["method"] == "sendMessage")
            .collect::<Vec<_>>();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["body"]["chat_id"], "-100");
        assert!(replies[0]["body"]["text"]
            .as_str()
            .unwrap()
            .contains("*base wallet*"));
    }
}
