use reqwest::Url;
use rust_decimal::Decimal;
use serde_json::json;

use super::{from_smallest_unit, rpc_call};
use crate::error::BalanceError;

fn parse_hex_quantity(quantity: &str) -> Result<u128, BalanceError> {
    let digits = quantity
        .strip_prefix("0x")
        .or_else(|| quantity.strip_prefix("0X"))
        .ok_or_else(|| BalanceError::Query(format!("balance {} is not a hex quantity", quantity)))?;

    // Some nodes answer "0x" for an empty account.
    if digits.is_empty() {
        return Ok(0);
    }

    u128::from_str_radix(digits, 16)
        .map_err(|err| BalanceError::Query(format!("bad balance {}: {}", quantity, err)))
}

pub async fn get_balance(
    client: &reqwest::Client,
    endpoint: &Url,
    address: &str,
) -> Result<Decimal, BalanceError> {
    let wei: String = rpc_call(
        client,
        endpoint,
        "eth_getBalance",
        json!([address, "latest"]),
    )
    .await?;

    from_smallest_unit(parse_hex_quantity(&wei)?)
}
