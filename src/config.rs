use alloy::primitives::Address;
use serde::Deserialize;
use std::str::FromStr;

use crate::indexer::timestamps::TimestampPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub chain: ChainConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_http: String,
    pub staking_contract: String,
    /// Transport-level retries per RPC call. Zero keeps a failed call
    /// terminal for its cycle.
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_retry_backoff_ms() -> u64 {
    500
}

impl ChainConfig {
    pub fn staking_contract_address(&self) -> eyre::Result<Address> {
        Address::from_str(&self.staking_contract).map_err(|e| {
            eyre::eyre!(
                "Invalid staking contract address '{}' on chain '{}': {}",
                self.staking_contract,
                self.name,
                e
            )
        })
    }
}

// ============================================================
// History Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// Account to watch at startup.
    pub account: Option<String>,
    #[serde(default = "default_lookback_blocks")]
    pub lookback_blocks: u64,
    /// Never scan below this block (typically the contract deployment).
    pub deployment_block: Option<u64>,
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u8,
    #[serde(default = "default_display_precision")]
    pub display_precision: u8,
    #[serde(default)]
    pub timestamp_policy: TimestampPolicy,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    pub refresh_interval_secs: Option<u64>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            account: None,
            lookback_blocks: default_lookback_blocks(),
            deployment_block: None,
            token_decimals: default_token_decimals(),
            display_precision: default_display_precision(),
            timestamp_policy: TimestampPolicy::default(),
            max_concurrent_requests: default_max_concurrent_requests(),
            refresh_interval_secs: None,
        }
    }
}

fn default_lookback_blocks() -> u64 {
    10_000
}

fn default_token_decimals() -> u8 {
    18
}

fn default_display_precision() -> u8 {
    4
}

fn default_max_concurrent_requests() -> usize {
    64
}

// ============================================================
// API Config
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
    #[serde(default = "default_api_host")]
    pub host: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_api_port() -> u16 {
    3000
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

impl Config {
    pub fn load(path: &str) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("Failed to read config file '{}': {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| eyre::eyre!("Failed to parse config file '{}': {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> eyre::Result<()> {
        if !is_hex_address(&self.chain.staking_contract) {
            return Err(eyre::eyre!(
                "Invalid staking contract address '{}' on chain '{}'",
                self.chain.staking_contract,
                self.chain.name
            ));
        }
        if let Some(account) = &self.history.account {
            if !is_hex_address(account) {
                return Err(eyre::eyre!("Invalid account address '{}'", account));
            }
        }
        if self.history.lookback_blocks == 0 {
            return Err(eyre::eyre!("history.lookback_blocks must be at least 1"));
        }
        if self.history.max_concurrent_requests == 0 {
            return Err(eyre::eyre!("history.max_concurrent_requests must be at least 1"));
        }
        // 10^77 is the largest power of ten a U256 holds
        if self.history.token_decimals > 77 || self.history.display_precision > 77 {
            return Err(eyre::eyre!(
                "history.token_decimals and history.display_precision must not exceed 77"
            ));
        }
        if self.history.refresh_interval_secs == Some(0) {
            return Err(eyre::eyre!("history.refresh_interval_secs must be at least 1"));
        }
        Ok(())
    }

    /// Initial subject from config, if any.
    pub fn initial_account(&self) -> eyre::Result<Option<Address>> {
        self.history
            .account
            .as_deref()
            .map(|a| Address::from_str(a).map_err(|e| eyre::eyre!("Invalid account '{}': {}", a, e)))
            .transpose()
    }
}

fn is_hex_address(s: &str) -> bool {
    s.starts_with("0x") && s.len() == 42 && s[2..].chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[chain]
name = "crossfi-testnet"
chain_id = 4157
rpc_http = "https://rpc.testnet.ms"
staking_contract = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
"#;

    #[test]
    fn test_parse_config() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.chain.name, "crossfi-testnet");
        assert_eq!(config.chain.chain_id, 4157);
        assert_eq!(config.chain.max_retries, 0); // default
        assert_eq!(config.chain.retry_backoff_ms, 500); // default
        assert_eq!(config.history.lookback_blocks, 10_000); // default
        assert_eq!(config.history.token_decimals, 18);
        assert_eq!(config.history.display_precision, 4);
        assert_eq!(config.history.timestamp_policy, TimestampPolicy::AllOrNothing);
        assert!(config.history.account.is_none());
        assert!(config.api.enabled);
        assert_eq!(config.api.port, 3000);
        assert!(config.validate().is_ok());
        assert!(config.initial_account().unwrap().is_none());
    }

    #[test]
    fn test_parse_full_history_section() {
        let toml_str = format!(
            r#"{MINIMAL}
[history]
account = "0x00000000000000000000000000000000000000aa"
lookback_blocks = 50000
deployment_block = 1200
timestamp_policy = "partial"
max_concurrent_requests = 8
refresh_interval_secs = 30

[api]
enabled = false
port = 8080
"#
        );
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.history.lookback_blocks, 50_000);
        assert_eq!(config.history.deployment_block, Some(1_200));
        assert_eq!(config.history.timestamp_policy, TimestampPolicy::Partial);
        assert_eq!(config.history.max_concurrent_requests, 8);
        assert_eq!(config.history.refresh_interval_secs, Some(30));
        assert!(!config.api.enabled);
        assert_eq!(config.api.port, 8080);
        assert!(config.validate().is_ok());
        assert!(config.initial_account().unwrap().is_some());
    }

    #[test]
    fn test_validate_bad_contract() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.chain.staking_contract = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_account() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.history.account = Some("0xzz00000000000000000000000000000000000000".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_window() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.history.lookback_blocks = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let toml_str = format!("{MINIMAL}\n[history]\ntimestamp_policy = \"best_effort\"\n");
        assert!(toml::from_str::<Config>(&toml_str).is_err());
    }
}
