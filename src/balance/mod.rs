mod evm;
mod names;
mod native;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::{
    chain::{ChainPreset, ChainRegistry, ProtocolFamily},
    config::AppConfig,
    error::BalanceError,
    wallet::{is_hex_address, WalletRecord},
};

pub use names::NameResolver;

/// Both protocol families report amounts in an 18 decimal smallest unit (wei, attoFIL).
const UNIT_DECIMALS: u32 = 18;

#[derive(Clone, Debug, PartialEq)]
pub struct BalanceReading {
    pub balance: Decimal,
    pub resolved_name: Option<String>,
}

#[async_trait]
pub trait BalanceQuery: Send + Sync {
    async fn query_balance(&self, wallet: &WalletRecord) -> Result<BalanceReading, BalanceError>;
}

/// Picks the protocol to query `address` with.
///
/// Hex addresses always go over EVM RPC, even on chains whose own protocol is native (a
/// Filecoin f4 account is reachable through its 0x form). Every other address shape uses the
/// chain's protocol.
pub fn protocol_for(preset: &ChainPreset, address: &str) -> ProtocolFamily {
    if is_hex_address(address) {
        ProtocolFamily::EvmRpc
    } else {
        preset.protocol_family.clone()
    }
}

pub fn from_smallest_unit(amount: u128) -> Result<Decimal, BalanceError> {
    i128::try_from(amount)
        .ok()
        .and_then(|amount| Decimal::try_from_i128_with_scale(amount, UNIT_DECIMALS).ok())
        .map(|balance| balance.normalize())
        .ok_or_else(|| BalanceError::Query(format!("balance {} out of range", amount)))
}

#[derive(Deserialize)]
struct RpcError {
    code: Option<i64>,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

async fn rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    endpoint: &Url,
    method: &str,
    params: Value,
) -> Result<T, BalanceError> {
    let payload = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });

    let response: RpcResponse<T> = client
        .post(endpoint.clone())
        .json(&payload)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    match response {
        RpcResponse {
            error: Some(RpcError { code, message }),
            ..
        } => Err(BalanceError::Query(format!(
            "{} returned error {}: {}",
            method,
            code.unwrap_or_default(),
            message
        ))),
        RpcResponse {
            result: Some(result),
            ..
        } => Ok(result),
        _ => Err(BalanceError::Query(format!("{} returned no result", method))),
    }
}

/// Queries balances over each chain's RPC endpoint.
pub struct RpcBalanceQuery {
    registry: Arc<ChainRegistry>,
    client: reqwest::Client,
    names: Option<NameResolver>,
}

impl RpcBalanceQuery {
    pub fn new(registry: Arc<ChainRegistry>, client: reqwest::Client) -> Self {
        Self {
            registry,
            client,
            names: None,
        }
    }

    pub fn with_name_resolver(mut self, names: NameResolver) -> Self {
        self.names = Some(names);
        self
    }

    pub fn from_config(
        config: &AppConfig,
        registry: Arc<ChainRegistry>,
        client: reqwest::Client,
    ) -> Self {
        let query = Self::new(registry, client.clone());
        if config.name_resolution {
            query.with_name_resolver(NameResolver::new(client, config.name_resolver_url.clone()))
        } else {
            query
        }
    }
}

#[async_trait]
impl BalanceQuery for RpcBalanceQuery {
    async fn query_balance(&self, wallet: &WalletRecord) -> Result<BalanceReading, BalanceError> {
        let preset = self
            .registry
            .lookup(&wallet.chain)
            .ok_or_else(|| BalanceError::ChainLookup(wallet.chain.clone()))?;

        let protocol = protocol_for(preset, &wallet.address);
        debug!(
            name = %wallet.name,
            chain = %preset.id,
            %protocol,
            "querying balance"
        );

        let balance = match &protocol {
            ProtocolFamily::EvmRpc => {
                evm::get_balance(&self.client, &preset.query_endpoint, &wallet.address).await?
            }
            ProtocolFamily::NativeRpc { namespace } => {
                native::get_balance(
                    &self.client,
                    &preset.query_endpoint,
                    namespace,
                    &wallet.address,
                )
                .await?
            }
        };

        let resolved_name = match &self.names {
            Some(names) if wallet.is_hex_address() => names.resolve(&wallet.address).await,
            _ => None,
        };

        Ok(BalanceReading {
            balance,
            resolved_name,
        })
    }
}
