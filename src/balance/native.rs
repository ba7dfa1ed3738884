use reqwest::Url;
use rust_decimal::Decimal;
use serde_json::json;

use super::{from_smallest_unit, rpc_call};
use crate::error::BalanceError;

/// `<namespace>.WalletBalance` answers with the smallest unit as a base 10 string.
pub async fn get_balance(
    client: &reqwest::Client,
    endpoint: &Url,
    namespace: &str,
    address: &str,
) -> Result<Decimal, BalanceError> {
    let method = format!("{}.WalletBalance", namespace);
    let amount: String = rpc_call(client, endpoint, &method, json!([address])).await?;

    let amount = amount
        .trim()
        .parse::<u128>()
        .map_err(|err| BalanceError::Query(format!("bad balance {}: {}", amount, err)))?;

    from_smallest_unit(amount)
}
