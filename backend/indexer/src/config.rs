//! Application configuration loaded from environment variables.

use std::str::FromStr;

use crate::errors::{IndexerError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Soroban RPC endpoint (e.g. https://soroban-testnet.stellar.org)
    pub rpc_url: String,
    /// The ChainCred contract address (Strkey format)
    pub contract_id: String,
    /// Network name shown to clients (`testnet`, `mainnet`, ...)
    pub network: String,
    /// Block explorer base URL, used to build transaction links
    pub explorer_url: String,
    /// Metadata gateway base URL; documents live at `{gateway_url}/ipfs/{cid}`
    pub gateway_url: String,
    /// Pinata pinning endpoint for JSON documents
    pub pinata_api_url: String,
    /// Pinata JWT. Without it metadata is kept in process memory only.
    pub pinata_jwt: Option<String>,
    /// Public front-end URL used for share links
    pub app_url: String,
    /// Path to the SQLite database file
    pub database_url: String,
    /// Port for the REST API server
    pub api_port: u16,
    /// How often (in seconds) to poll the RPC for new events
    pub poll_interval_secs: u64,
    /// Maximum number of events to fetch per RPC request
    pub events_per_page: u32,
    /// Ledger to start from if no cursor is saved
    pub start_ledger: u32,
    /// How often (in seconds) to poll `getTransaction` while awaiting finalization
    pub tx_poll_interval_secs: u64,
    /// How long (in seconds) to wait for finalization before reporting "still pending"
    pub tx_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup. `from_env` passes the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            rpc_url: var("RPC_URL", "https://soroban-testnet.stellar.org"),
            contract_id: lookup("CONTRACT_ID").ok_or_else(|| {
                IndexerError::Config("CONTRACT_ID environment variable is required".to_string())
            })?,
            network: var("NETWORK", "testnet"),
            explorer_url: var("EXPLORER_URL", "https://stellar.expert/explorer/testnet"),
            gateway_url: var("GATEWAY_URL", "https://gateway.pinata.cloud"),
            pinata_api_url: var(
                "PINATA_API_URL",
                "https://api.pinata.cloud/pinning/pinJSONToIPFS",
            ),
            pinata_jwt: lookup("PINATA_JWT").filter(|jwt| !jwt.is_empty()),
            app_url: var("APP_URL", "http://localhost:5173"),
            database_url: var("DATABASE_URL", "sqlite:./chaincred_events.db"),
            api_port: parse(&lookup, "API_PORT", 3001)?,
            poll_interval_secs: parse(&lookup, "POLL_INTERVAL_SECS", 5)?,
            events_per_page: parse(&lookup, "EVENTS_PER_PAGE", 100)?,
            start_ledger: parse(&lookup, "START_LEDGER", 0)?,
            tx_poll_interval_secs: parse(&lookup, "TX_POLL_INTERVAL_SECS", 2)?,
            tx_timeout_secs: parse(&lookup, "TX_TIMEOUT_SECS", 60)?,
        })
    }
}

fn parse<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| IndexerError::Config(format!("Invalid {key}: {raw:?}"))),
    }
}
