//! Configuration management for the instant-mine node
//!
//! Loads configuration from TOML files with environment variable substitution.

use anyhow::{Context, Result};
use ethers::signers::LocalWallet;
use ethers::types::Address;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::NodeError;
use crate::tx::gas::TX_BASE_GAS;

/// Largest chain id whose EIP-155 `v` still fits in a u64
pub const MAX_CHAIN_ID: u64 = (u64::MAX - 36) / 2;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub node: NodeConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub miner: MinerConfig,
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub chain_id: u64,
    #[serde(default = "default_true")]
    pub instant_mine: bool,
    pub block_gas_limit: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    pub coinbase: String,
    #[serde(default)]
    pub include_uncles: bool,
    #[serde(default = "default_trigger_queue")]
    pub trigger_queue: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub private_keys: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_trigger_queue() -> usize {
    64
}

impl Settings {
    /// Load settings from the configured file
    pub fn load() -> Result<Self> {
        let config_path = env::var("INSTAMINE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    /// Parse settings from TOML text
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.node.chain_id == 0 || self.node.chain_id > MAX_CHAIN_ID {
            return Err(NodeError::Config(format!(
                "node.chain_id must be between 1 and {}, got {}",
                MAX_CHAIN_ID, self.node.chain_id
            ))
            .into());
        }

        if self.node.block_gas_limit < TX_BASE_GAS {
            anyhow::bail!(
                "node.block_gas_limit must be at least {}, got {}",
                TX_BASE_GAS,
                self.node.block_gas_limit
            );
        }

        if self.miner.trigger_queue == 0 {
            return Err(NodeError::Config("miner.trigger_queue must be non-zero".to_string()).into());
        }

        self.coinbase()?;

        if self.wallets()?.is_empty() {
            tracing::warn!("No wallet keys configured - eth_sendTransaction will reject every sender");
        }

        Ok(())
    }

    /// Miner fee recipient
    pub fn coinbase(&self) -> Result<Address> {
        self.miner
            .coinbase
            .parse()
            .with_context(|| format!("Invalid miner.coinbase: {}", self.miner.coinbase))
    }

    /// Signing keys held by the node; blank entries (unset variables) are skipped
    pub fn wallets(&self) -> Result<Vec<LocalWallet>> {
        self.wallet
            .private_keys
            .iter()
            .enumerate()
            .filter(|(_, key)| !key.trim().is_empty())
            .map(|(i, key)| {
                key.trim_start_matches("0x")
                    .parse::<LocalWallet>()
                    .with_context(|| format!("Invalid wallet.private_keys[{}]", i))
            })
            .collect()
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex");

    for cap in re.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
