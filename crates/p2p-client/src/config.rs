//! # Client Configuration
//!
//! File-backed settings for one peer connection.
//!
//! ```toml
//! peer_address = "127.0.0.1:9876"
//! chain_id = "aca376f206b8fc25a6ed44dbdc66547c36c6c33e3a119ffbeaef943642f0e906"
//! network_version = 1206
//! write_timeout_secs = 10
//! handler_budget_ms = 30000
//! request_sync_on_handshake = false
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_FRAME_SIZE};
use crate::domain::{checksum_from_hex, ClientIdentity, ConfigError, DEFAULT_AGENT, DEFAULT_OS};
use crate::service::{ClientOptions, DEFAULT_HANDLER_BUDGET, DEFAULT_WRITE_TIMEOUT};

/// Network version spoken by current nodes.
pub const DEFAULT_NETWORK_VERSION: u16 = 1206;

/// Client configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Peer to connect to (`host:port`).
    pub peer_address: String,

    /// Address announced in handshakes. Defaults to `peer_address`.
    pub advertised_address: Option<String>,

    /// Chain id as 64 hex characters.
    pub chain_id: String,

    /// Protocol version announced in handshakes.
    pub network_version: u16,

    /// OS string announced in handshakes.
    pub os: String,

    /// Agent string announced in handshakes.
    pub agent: String,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Per-frame write timeout in seconds.
    pub write_timeout_secs: u64,

    /// Per-handler time limit in milliseconds. `0` disables the limit.
    pub handler_budget_ms: u64,

    /// Send a sync request after answering a peer handshake.
    pub request_sync_on_handshake: bool,

    /// Largest frame accepted from the peer, in bytes.
    pub max_frame_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            peer_address: "127.0.0.1:9876".to_string(),
            advertised_address: None,
            chain_id: "00".repeat(32),
            network_version: DEFAULT_NETWORK_VERSION,
            os: DEFAULT_OS.to_string(),
            agent: DEFAULT_AGENT.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT.as_secs(),
            handler_budget_ms: DEFAULT_HANDLER_BUDGET.as_millis() as u64,
            request_sync_on_handshake: false,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl ClientConfig {
    /// Create a config for testing (short timeouts).
    pub fn for_testing() -> Self {
        Self {
            peer_address: "127.0.0.1:0".to_string(),
            chain_id: "ac".repeat(32),
            connect_timeout_secs: 1,
            write_timeout_secs: 1,
            handler_budget_ms: 500,
            max_frame_size: 64 * 1024,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string. Missing keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.identity()?;
        Ok(config)
    }

    /// Connection identity described by this config.
    pub fn identity(&self) -> Result<ClientIdentity, ConfigError> {
        let chain_id =
            checksum_from_hex(&self.chain_id).ok_or_else(|| ConfigError::InvalidChainId(self.chain_id.clone()))?;

        let identity = ClientIdentity::new(self.peer_address.clone(), chain_id, self.network_version);
        Ok(match &self.advertised_address {
            Some(address) => identity.with_advertised_address(address.clone()),
            None => identity,
        })
    }

    /// Runtime options described by this config.
    pub fn options(&self) -> ClientOptions {
        ClientOptions {
            write_timeout: Duration::from_secs(self.write_timeout_secs),
            handler_budget: match self.handler_budget_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
            request_sync_on_handshake: self.request_sync_on_handshake,
            os: self.os.clone(),
            agent: self.agent.clone(),
        }
    }

    /// TCP connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}
