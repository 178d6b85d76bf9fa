//! client configuration and known deployments

use std::path::Path;
use std::time::Duration;

use santa_core::{Address, SeedCombiner};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// chain + contract the client talks to
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// chain name
    pub name: String,
    /// evm chain id, also the key for cached games
    pub chain_id: u64,
    /// rpc endpoint
    pub rpc_endpoint: String,
    /// deployed secret santa contract
    pub contract_address: Address,
    /// block explorer base url (if any)
    pub block_explorer: Option<String>,
}

impl ChainConfig {
    /// arbitrum sepolia, the only network with a deployed contract
    pub fn arbitrum_sepolia() -> Self {
        Self {
            name: "arbitrum-sepolia".into(),
            chain_id: 421614,
            rpc_endpoint: "https://sepolia-rollup.arbitrum.io/rpc".into(),
            contract_address: Address::from_raw([
                0xef, 0x02, 0x1e, 0x90, 0xf4, 0x40, 0x9f, 0x6f, 0x37, 0xd5, 0xfd, 0x09, 0x47,
                0xdc, 0xbd, 0x10, 0xa5, 0xa7, 0x63, 0x93,
            ]),
            block_explorer: Some("https://sepolia.arbiscan.io".into()),
        }
    }

    /// local hardhat node / simulator
    pub fn local() -> Self {
        Self {
            name: "hardhat".into(),
            chain_id: 31337,
            rpc_endpoint: "http://127.0.0.1:8545".into(),
            contract_address: Address::ZERO,
            block_explorer: None,
        }
    }

    /// explorer link for a transaction hash
    pub fn tx_url(&self, tx_hash: &str) -> Option<String> {
        self.block_explorer
            .as_ref()
            .map(|base| format!("{}/tx/{}", base.trim_end_matches('/'), tx_hash))
    }

    /// explorer link for an address
    pub fn address_url(&self, address: &Address) -> Option<String> {
        self.block_explorer
            .as_ref()
            .map(|base| format!("{}/address/{}", base.trim_end_matches('/'), address))
    }
}

/// client configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// chain to talk to
    pub chain: ChainConfig,
    /// delay between join status polls in milliseconds
    pub poll_interval_ms: u64,
    /// give up waiting on decryption after this many seconds
    pub max_poll_secs: u64,
    /// lifetime of newly created permits in days
    pub permit_validity_days: u32,
    /// name attached to newly created permits
    pub permit_name: String,
    /// how the simulator folds entropy into the seed
    pub seed_combiner: SeedCombiner,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            chain: ChainConfig::arbitrum_sepolia(),
            poll_interval_ms: 3_000,
            max_poll_secs: 600,
            permit_validity_days: 30,
            permit_name: "Secret Santa".into(),
            seed_combiner: SeedCombiner::Add,
        }
    }
}

impl ClientConfig {
    pub fn arbitrum_sepolia() -> Self {
        Self::default()
    }

    /// local chain with fast polling
    pub fn local() -> Self {
        Self {
            chain: ChainConfig::local(),
            poll_interval_ms: 100,
            max_poll_secs: 30,
            ..Default::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn max_poll_duration(&self) -> Duration {
        Duration::from_secs(self.max_poll_secs)
    }

    pub fn permit_validity(&self) -> Duration {
        Duration::from_secs(u64::from(self.permit_validity_days) * 24 * 60 * 60)
    }

    /// parse from toml, missing keys fall back to defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// load from a toml file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ClientError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.chain.chain_id, 421614);
        assert_eq!(config.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.permit_validity(), Duration::from_secs(30 * 86_400));
        assert_eq!(
            config.chain.contract_address.to_string(),
            "0xef021e90f4409f6f37d5fd0947dcbd10a5a76393"
        );
    }

    #[test]
    fn test_partial_toml() {
        let config = ClientConfig::from_toml_str(
            r#"
            poll_interval_ms = 500
            seed_combiner = "xor"
            "#,
        )
        .unwrap();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.seed_combiner, SeedCombiner::Xor);
        assert_eq!(config.max_poll_secs, 600);
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ClientConfig::local();
        let s = config.to_toml_string().unwrap();
        assert_eq!(ClientConfig::from_toml_str(&s).unwrap(), config);
    }

    #[test]
    fn test_bad_toml() {
        assert!(matches!(
            ClientConfig::from_toml_str("poll_interval_ms = \"soon\""),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn test_explorer_urls() {
        let chain = ChainConfig::arbitrum_sepolia();
        assert_eq!(
            chain.tx_url("0xabc").as_deref(),
            Some("https://sepolia.arbiscan.io/tx/0xabc")
        );
        assert!(ChainConfig::local().tx_url("0xabc").is_none());
    }
}
