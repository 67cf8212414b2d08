//! Outbound handshake construction.

use super::types::{ClientIdentity, HandshakeInfo};
use crate::domain::errors::KeyError;
use crate::domain::keys::{PublicKey, Signature, NULL_PUBLIC_KEY, NULL_SIGNATURE};
use crate::domain::messages::HandshakeMessage;

/// Generation announced in every handshake. There is no increment protocol.
pub const HANDSHAKE_GENERATION: i16 = 1;

/// Default OS string.
pub const DEFAULT_OS: &str = "linux";

/// Default agent string.
pub const DEFAULT_AGENT: &str = "p2p-client agent";

/// Builds handshake messages for one client identity.
#[derive(Debug, Clone)]
pub struct HandshakeBuilder {
    identity: ClientIdentity,
    os: String,
    agent: String,
    public_key: String,
    signature: String,
}

impl HandshakeBuilder {
    /// Builder announcing the null key and signature.
    pub fn new(identity: ClientIdentity) -> Self {
        Self {
            identity,
            os: DEFAULT_OS.to_string(),
            agent: DEFAULT_AGENT.to_string(),
            public_key: NULL_PUBLIC_KEY.to_string(),
            signature: NULL_SIGNATURE.to_string(),
        }
    }

    /// Override the OS/agent pair.
    pub fn with_agent(mut self, os: impl Into<String>, agent: impl Into<String>) -> Self {
        self.os = os.into();
        self.agent = agent.into();
        self
    }

    /// Override the announced key material (textual forms).
    pub fn with_key_material(mut self, public_key: impl Into<String>, signature: impl Into<String>) -> Self {
        self.public_key = public_key.into();
        self.signature = signature.into();
        self
    }

    /// Build the handshake announcing `info`.
    pub fn build(&self, info: &HandshakeInfo) -> Result<HandshakeMessage, KeyError> {
        let key: PublicKey = self.public_key.parse()?;
        let sig: Signature = self.signature.parse()?;

        Ok(HandshakeMessage {
            network_version: self.identity.network_version,
            chain_id: self.identity.chain_id,
            node_id: self.identity.node_id,
            key,
            time: info.head_block_time,
            token: [0u8; 32],
            sig,
            p2p_address: self.identity.advertised_address.clone(),
            last_irreversible_block_num: info.last_irreversible_block_num,
            last_irreversible_block_id: info.last_irreversible_block_id,
            head_num: info.head_block_num,
            head_id: info.head_block_id,
            os: self.os.clone(),
            agent: self.agent.clone(),
            generation: HANDSHAKE_GENERATION,
        })
    }
}
