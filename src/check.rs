use futures::{stream, StreamExt};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::{
    balance::{BalanceQuery, BalanceReading},
    error::BalanceError,
    wallet::WalletRecord,
};

#[derive(Clone, Debug, PartialEq)]
pub struct BalanceResult {
    pub wallet: WalletRecord,
    pub balance: Decimal,
    pub is_low: bool,
    pub resolved_name: Option<String>,
}

impl BalanceResult {
    pub fn new(wallet: WalletRecord, reading: BalanceReading) -> Self {
        let is_low = reading.balance < wallet.threshold;
        Self {
            wallet,
            balance: reading.balance,
            is_low,
            resolved_name: reading.resolved_name,
        }
    }

    /// Resolved name if we have one, otherwise the shortened address.
    pub fn display_address(&self) -> String {
        self.resolved_name
            .clone()
            .unwrap_or_else(|| self.wallet.short_address())
    }

    /// Where to send funds, a resolved name or the full address.
    pub fn payout_target(&self) -> &str {
        self.resolved_name
            .as_deref()
            .unwrap_or(&self.wallet.address)
    }
}

/// Result of checking a single wallet, failures included.
#[derive(Debug)]
pub struct CheckOutcome {
    pub wallet: WalletRecord,
    pub result: Result<BalanceReading, BalanceError>,
}

/// Queries every wallet concurrently, at most `max_concurrency` in flight. Completion order,
/// not input order.
pub async fn check_all_tagged(
    query: &dyn BalanceQuery,
    wallets: Vec<WalletRecord>,
    max_concurrency: usize,
) -> Vec<CheckOutcome> {
    stream::iter(wallets)
        .map(|wallet| async move {
            let result = query.query_balance(&wallet).await;
            CheckOutcome { wallet, result }
        })
        .buffer_unordered(max_concurrency.max(1))
        .collect()
        .await
}

/// Checks every wallet against its threshold. Wallets whose query fails are left out of the
/// results and logged.
pub async fn check_all(
    query: &dyn BalanceQuery,
    wallets: Vec<WalletRecord>,
    max_concurrency: usize,
) -> Vec<BalanceResult> {
    let total = wallets.len();
    let outcomes = check_all_tagged(query, wallets, max_concurrency).await;

    let results: Vec<BalanceResult> = outcomes
        .into_iter()
        .filter_map(|CheckOutcome { wallet, result }| match result {
            Ok(reading) => Some(BalanceResult::new(wallet, reading)),
            Err(err) => {
                warn!(
                    name = %wallet.name,
                    chain = %wallet.chain,
                    address = %wallet.address,
                    %err,
                    "dropping wallet from check, balance query failed"
                );
                None
            }
        })
        .collect();

    info!(
        checked = results.len(),
        failed = total - results.len(),
        "balance check finished"
    );

    results
}
