use std::fmt;

use anyhow::{ensure, Result};
use itertools::Itertools;
use reqwest::Url;

use crate::config::AppConfig;

/// Wire protocol used to ask a chain for an address balance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProtocolFamily {
    /// `eth_getBalance` over EVM JSON-RPC.
    EvmRpc,
    /// `<namespace>.WalletBalance` over the chain's own JSON-RPC.
    NativeRpc { namespace: String },
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolFamily::EvmRpc => write!(f, "evm"),
            ProtocolFamily::NativeRpc { namespace } => write!(f, "{}", namespace.to_lowercase()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ChainPreset {
    pub id: String,
    pub query_endpoint: Url,
    pub symbol: String,
    pub explorer_url: String,
    pub protocol_family: ProtocolFamily,
}

impl ChainPreset {
    pub fn explorer_link(&self, address: &str) -> String {
        format!("{}{}", self.explorer_url, address)
    }
}

/// Immutable table of the chains we know how to query.
#[derive(Debug)]
pub struct ChainRegistry {
    presets: Vec<ChainPreset>,
}

impl ChainRegistry {
    pub fn new(presets: Vec<ChainPreset>) -> Result<Self> {
        let duplicates = presets
            .iter()
            .map(|preset| preset.id.to_lowercase())
            .duplicates()
            .collect_vec();
        ensure!(
            duplicates.is_empty(),
            "duplicate chain ids in registry: {}",
            duplicates.join(", ")
        );

        Ok(Self { presets })
    }

    /// The default chain table, API keys interpolated from config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let alchemy = |subdomain: &str| {
            Url::parse(&format!(
                "https://{}.g.alchemy.com/v2/{}",
                subdomain, config.alchemy_api_key
            ))
        };

        let evm = |id: &str, subdomain: &str, symbol: &str, explorer_url: &str| {
            Ok::<_, anyhow::Error>(ChainPreset {
                id: id.to_string(),
                query_endpoint: alchemy(subdomain)?,
                symbol: symbol.to_string(),
                explorer_url: explorer_url.to_string(),
                protocol_family: ProtocolFamily::EvmRpc,
            })
        };

        Self::new(vec![
            evm("ethereum", "eth-mainnet", "ETH", "https://etherscan.io/address/")?,
            evm("base", "base-mainnet", "ETH", "https://basescan.org/address/")?,
            evm("arbitrum", "arb-mainnet", "ETH", "https://arbiscan.io/address/")?,
            evm("polygon", "polygon-mainnet", "POL", "https://polygonscan.com/address/")?,
            evm(
                "optimism",
                "opt-mainnet",
                "ETH",
                "https://optimistic.etherscan.io/address/",
            )?,
            ChainPreset {
                id: "filecoin".to_string(),
                query_endpoint: config.filecoin_rpc_url.clone(),
                symbol: "FIL".to_string(),
                explorer_url: "https://filfox.info/en/address/".to_string(),
                protocol_family: ProtocolFamily::NativeRpc {
                    namespace: "Filecoin".to_string(),
                },
            },
        ])
    }

    pub fn lookup(&self, chain_id: &str) -> Option<&ChainPreset> {
        self.presets
            .iter()
            .find(|preset| preset.id.eq_ignore_ascii_case(chain_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChainPreset> {
        self.presets.iter()
    }

    /// Comma separated chain ids, for usage and error messages.
    pub fn ids(&self) -> String {
        self.presets.iter().map(|preset| preset.id.as_str()).join(", ")
    }
}

#[cfg(test)]
pub(crate) fn test_preset(id: &str, endpoint: &str, family: ProtocolFamily) -> ChainPreset {
    ChainPreset {
        id: id.to_string(),
        query_endpoint: Url::parse(endpoint).unwrap(),
        symbol: match family {
            ProtocolFamily::EvmRpc => "ETH".to_string(),
            ProtocolFamily::NativeRpc { .. } => "FIL".to_string(),
        },
        explorer_url: format!("https://explorer.example/{}/", id),
        protocol_family: family,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    #[test]
    fn test_default_table() {
        let registry = ChainRegistry::from_config(&test_config()).unwrap();

        assert_eq!(
            registry.ids(),
            "ethereum, base, arbitrum, polygon, optimism, filecoin"
        );

        let base = registry.lookup("base").unwrap();
        assert_eq!(
            base.query_endpoint.as_str(),
            "https://base-mainnet.g.alchemy.com/v2/alchemy-key"
        );
        assert_eq!(base.protocol_family, ProtocolFamily::EvmRpc);

        let filecoin = registry.lookup("filecoin").unwrap();
        assert_eq!(filecoin.symbol, "FIL");
        assert_eq!(
            filecoin.query_endpoint.as_str(),
            "https://api.node.glif.io/rpc/v1"
        );
        assert_eq!(
            filecoin.protocol_family,
            ProtocolFamily::NativeRpc {
                namespace: "Filecoin".to_string()
            }
        );
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = ChainRegistry::from_config(&test_config()).unwrap();
        assert_eq!(registry.lookup("Polygon").unwrap().symbol, "POL");
        assert!(registry.lookup("solana").is_none());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let result = ChainRegistry::new(vec![
            test_preset("base", "http://localhost:1", ProtocolFamily::EvmRpc),
            test_preset("Base", "http://localhost:2", ProtocolFamily::EvmRpc),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_explorer_link() {
        let registry = ChainRegistry::from_config(&test_config()).unwrap();
        assert_eq!(
            registry.lookup("ethereum").unwrap().explorer_link("0xabc"),
            "https://etherscan.io/address/0xabc"
        );
    }
}
