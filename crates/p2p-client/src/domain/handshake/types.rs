//! Handshake data types.

use chrono::{DateTime, Utc};

use crate::domain::errors::Checksum256;
use crate::domain::messages::HandshakeMessage;

/// Static identity of one peer connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    /// Address of the remote peer (`host:port`).
    pub peer_address: String,
    /// Address announced in our handshakes.
    pub advertised_address: String,
    /// Chain identifier - MUST match the peer's
    pub chain_id: Checksum256,
    /// Node identifier, derived from the chain id
    pub node_id: Checksum256,
    /// Protocol/network version
    pub network_version: u16,
}

impl ClientIdentity {
    /// Identity for a connection to `peer_address`.
    ///
    /// The node id is the chain id and the advertised address is the peer
    /// address until [`with_advertised_address`](Self::with_advertised_address)
    /// says otherwise.
    pub fn new(peer_address: impl Into<String>, chain_id: Checksum256, network_version: u16) -> Self {
        let peer_address = peer_address.into();
        Self {
            advertised_address: peer_address.clone(),
            peer_address,
            chain_id,
            node_id: chain_id,
            network_version,
        }
    }

    /// Announce a different reachable address.
    pub fn with_advertised_address(mut self, address: impl Into<String>) -> Self {
        self.advertised_address = address.into();
        self
    }
}

/// Head of the chain as reported by the chain info provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHead {
    /// Head block number
    pub head_block_num: u32,
    /// Head block id
    pub head_block_id: Checksum256,
    /// Head block time
    pub head_block_time: DateTime<Utc>,
    /// Last irreversible block number
    pub last_irreversible_block_num: u32,
}

/// A block reference returned by a block lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    /// Block number
    pub block_num: u32,
    /// Block id
    pub id: Checksum256,
}

/// Snapshot of a chain position, as announced in a handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeInfo {
    /// Head block number
    pub head_block_num: u32,
    /// Head block id
    pub head_block_id: Checksum256,
    /// Head block time
    pub head_block_time: DateTime<Utc>,
    /// Last irreversible block number
    pub last_irreversible_block_num: u32,
    /// Last irreversible block id
    pub last_irreversible_block_id: Checksum256,
}

impl HandshakeInfo {
    /// Local chain position: head from `head`, irreversible block from `lib`.
    pub fn from_chain(head: &ChainHead, lib: &BlockRef) -> Self {
        Self {
            head_block_num: head.head_block_num,
            head_block_id: head.head_block_id,
            head_block_time: head.head_block_time,
            last_irreversible_block_num: lib.block_num,
            last_irreversible_block_id: lib.id,
        }
    }

    /// Chain position reported by a peer handshake.
    pub fn from_peer(msg: &HandshakeMessage) -> Self {
        Self {
            head_block_num: msg.head_num,
            head_block_id: msg.head_id,
            head_block_time: msg.time,
            last_irreversible_block_num: msg.last_irreversible_block_num,
            last_irreversible_block_id: msg.last_irreversible_block_id,
        }
    }
}
