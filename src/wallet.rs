use itertools::Itertools;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A tracked (address, chain, scope) tuple with its alert threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRecord {
    pub name: String,
    pub address: String,
    pub chain: String,
    /// Minimum acceptable balance, in the chain's major unit.
    #[serde(with = "rust_decimal::serde::float")]
    pub threshold: Decimal,
    /// Chat that registered the wallet. Alerts go here and `/list` is scoped by it.
    #[serde(alias = "tgChatId")]
    pub origin_context: String,
}

impl WalletRecord {
    pub fn is_hex_address(&self) -> bool {
        is_hex_address(&self.address)
    }

    /// `0x1234abcd...cdef`, enough to recognise an address without flooding a chat.
    pub fn short_address(&self) -> String {
        shorten(&self.address, 6, 4)
    }

    fn matches(&self, address: &str, origin_context: &str) -> bool {
        self.origin_context == origin_context && self.address.eq_ignore_ascii_case(address)
    }
}

pub fn is_hex_address(address: &str) -> bool {
    address
        .get(..2)
        .map_or(false, |prefix| prefix.eq_ignore_ascii_case("0x"))
}

pub fn shorten(address: &str, head: usize, tail: usize) -> String {
    let chars = address.chars().collect_vec();
    if chars.len() <= head + tail {
        return address.to_string();
    }
    format!(
        "{}...{}",
        chars[..head].iter().collect::<String>(),
        chars[chars.len() - tail..].iter().collect::<String>()
    )
}

/// Appends `wallet` unless the same address is already tracked on the same chain in the same
/// scope.
pub fn add_wallet(
    wallets: &mut Vec<WalletRecord>,
    wallet: WalletRecord,
) -> Result<(), ValidationError> {
    let exists = wallets.iter().any(|existing| {
        existing.matches(&wallet.address, &wallet.origin_context)
            && existing.chain.eq_ignore_ascii_case(&wallet.chain)
    });
    if exists {
        return Err(ValidationError::Duplicate {
            chain: wallet.chain,
        });
    }

    wallets.push(wallet);
    Ok(())
}

/// Removes the wallet with `address` in `origin_context`.
///
/// Without a chain, an address tracked on more than one chain is rejected as ambiguous rather
/// than removing all of them. Returns the removed records.
pub fn remove_wallet(
    wallets: &mut Vec<WalletRecord>,
    address: &str,
    chain: Option<&str>,
    origin_context: &str,
) -> Result<Vec<WalletRecord>, ValidationError> {
    let matching = wallets
        .iter()
        .filter(|wallet| wallet.matches(address, origin_context))
        .filter(|wallet| chain.map_or(true, |chain| wallet.chain.eq_ignore_ascii_case(chain)))
        .collect_vec();

    if matching.is_empty() {
        return Err(ValidationError::NotFound);
    }

    if chain.is_none() && matching.len() > 1 {
        let chains = matching
            .iter()
            .map(|wallet| wallet.chain.as_str())
            .unique()
            .join(", ");
        return Err(ValidationError::Ambiguous { chains });
    }

    let (removed, kept): (Vec<_>, Vec<_>) = wallets.drain(..).partition(|wallet| {
        wallet.matches(address, origin_context)
            && chain.map_or(true, |chain| wallet.chain.eq_ignore_ascii_case(chain))
    });
    *wallets = kept;

    Ok(removed)
}

pub fn wallets_in_scope<'a>(
    wallets: &'a [WalletRecord],
    origin_context: &'a str,
) -> impl Iterator<Item = &'a WalletRecord> {
    wallets
        .iter()
        .filter(move |wallet| wallet.origin_context == origin_context)
}

#[cfg(test)]
pub(crate) fn test_wallet(address: &str, chain: &str, scope: &str) -> WalletRecord {
    WalletRecord {
        name: format!("{} wallet", chain),
        address: address.to_string(),
        chain: chain.to_string(),
        threshold: Decimal::new(1, 1),
        origin_context: scope.to_string(),
    }
}
