//! Client configuration loaded from TOML

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use solana_pubkey::Pubkey;

use crate::constants::{PROGRAM_ID, REWARD_MINT};
use crate::error::{StakeError, StakeResult};

pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cluster {
    #[default]
    Devnet,
    Testnet,
    MainnetBeta,
    Localnet,
}

impl Cluster {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cluster::Devnet => "devnet",
            Cluster::Testnet => "testnet",
            Cluster::MainnetBeta => "mainnet-beta",
            Cluster::Localnet => "custom",
        }
    }

    pub fn explorer_url(&self, signature: &str) -> String {
        match self {
            Cluster::MainnetBeta => format!("https://explorer.solana.com/tx/{signature}"),
            Cluster::Localnet => format!(
                "https://explorer.solana.com/tx/{signature}?cluster=custom&customUrl=http%3A%2F%2Flocalhost%3A8899"
            ),
            other => format!(
                "https://explorer.solana.com/tx/{signature}?cluster={}",
                other.as_str()
            ),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base58 id of the vault program
    pub program_id: String,
    /// Base58 address of the stake/reward mint
    pub reward_mint: String,
    /// Local wall-clock period of the reconciliation timer
    pub tick_interval_ms: u64,
    pub cluster: Cluster,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            program_id: PROGRAM_ID.to_string(),
            reward_mint: REWARD_MINT.to_string(),
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            cluster: Cluster::default(),
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> StakeResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|err| StakeError::Config(format!("{}: {err}", path.display())))?;
        Self::from_toml_str(&content)
            .map_err(|err| StakeError::Config(format!("{}: {err}", path.display())))
    }

    pub fn from_toml_str(content: &str) -> StakeResult<Self> {
        let config: ClientConfig =
            toml::from_str(content).map_err(|err| StakeError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> StakeResult<()> {
        self.program_id()?;
        self.reward_mint()?;
        if self.tick_interval_ms == 0 {
            return Err(StakeError::Config(
                "tick_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn program_id(&self) -> StakeResult<Pubkey> {
        parse_key("program_id", &self.program_id)
    }

    pub fn reward_mint(&self) -> StakeResult<Pubkey> {
        parse_key("reward_mint", &self.reward_mint)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

fn parse_key(field: &str, raw: &str) -> StakeResult<Pubkey> {
    Pubkey::from_str(raw).map_err(|err| StakeError::Config(format!("{field}: {err}")))
}
