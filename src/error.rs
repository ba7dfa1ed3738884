use thiserror::Error;

/// Problems with the caller's own input. The message is sent back verbatim.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("You're not authorized to manage wallets.")]
    Unauthorized,
    #[error("{0}")]
    Usage(String),
    #[error("Unknown chain: {chain}\n\nAvailable: {available}")]
    UnknownChain { chain: String, available: String },
    #[error("Invalid threshold: {0}. Use a non-negative number like 0.1")]
    InvalidThreshold(String),
    #[error("This address is already being tracked on {chain} in this group.")]
    Duplicate { chain: String },
    #[error("Multiple chains found for this address. Please specify one of: {chains}")]
    Ambiguous { chains: String },
    #[error("Address not found in this group.")]
    NotFound,
}

#[derive(Debug, Error)]
pub enum BalanceError {
    #[error("unknown chain {0}")]
    ChainLookup(String),
    #[error("balance query failed: {0}")]
    Query(String),
}

// Request urls carry api keys and bot tokens in their path, keep them out of messages and logs.
impl From<reqwest::Error> for BalanceError {
    fn from(err: reqwest::Error) -> Self {
        BalanceError::Query(err.without_url().to_string())
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Transport(reqwest::Error),
    #[error("delivery rejected, status: {status}, body: {body}")]
    Rejected {
        status: reqwest::StatusCode,
        body: String,
    },
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Transport(err.without_url())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The list changed since it was read. Read again and reapply the change.
    #[error("wallet list was modified concurrently")]
    Conflict,
    #[error("wallet file io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("wallet store request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("wallet store returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode wallet list: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode(err.to_string())
    }
}

impl From<base64::DecodeError> for StoreError {
    fn from(err: base64::DecodeError) -> Self {
        StoreError::Decode(err.to_string())
    }
}
