//! Node configuration: the client section plus the chain API endpoint.
//!
//! ```toml
//! [client]
//! peer_address = "127.0.0.1:9876"
//! chain_id = "aca376f206b8fc25a6ed44dbdc66547c36c6c33e3a119ffbeaef943642f0e906"
//!
//! [chain_api]
//! url = "http://127.0.0.1:8888"
//! timeout_secs = 5
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use p2p_client::ClientConfig;

/// Chain API endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainApiConfig {
    /// Base URL of the node's HTTP API.
    pub url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ChainApiConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8888".to_string(),
            timeout_secs: 5,
        }
    }
}

impl ChainApiConfig {
    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Full node configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Peer connection settings.
    pub client: ClientConfig,
    /// Where the local chain position comes from.
    pub chain_api: ChainApiConfig,
}

impl NodeConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Parse from a TOML string. Missing keys take defaults.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.client.identity()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = NodeConfig::parse("").unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.chain_api.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_parse_sections() {
        let config = NodeConfig::parse(
            r#"
            [client]
            peer_address = "10.0.0.5:9876"
            chain_id = "aca376f206b8fc25a6ed44dbdc66547c36c6c33e3a119ffbeaef943642f0e906"
            handler_budget_ms = 250

            [chain_api]
            url = "http://10.0.0.5:8888"
            "#,
        )
        .unwrap();

        assert_eq!(config.client.peer_address, "10.0.0.5:9876");
        assert_eq!(config.client.handler_budget_ms, 250);
        assert_eq!(config.chain_api.url, "http://10.0.0.5:8888");
        assert_eq!(config.chain_api.timeout_secs, 5);
    }

    #[test]
    fn test_bad_chain_id_rejected() {
        let result = NodeConfig::parse(
            r#"
            [client]
            chain_id = "xyz"
            "#,
        );
        assert!(result.is_err());
    }
}
