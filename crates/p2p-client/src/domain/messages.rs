//! # Protocol Messages
//!
//! Envelope and message variants of the node network protocol. Only the
//! messages the client reasons about are typed; the remaining variants are
//! carried as opaque payload bytes tagged with their type.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::Checksum256;
use super::keys::{PublicKey, Signature};

/// Message type discriminator, as written in the type byte of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    /// Handshake announcing identity and sync position.
    Handshake = 0,
    /// Chain size report.
    ChainSize = 1,
    /// Peer is closing the connection.
    GoAway = 2,
    /// Clock synchronization.
    Time = 3,
    /// Inventory notice.
    Notice = 4,
    /// Inventory request.
    Request = 5,
    /// Range-based block sync request.
    SyncRequest = 6,
    /// Signed block.
    SignedBlock = 7,
    /// Packed transaction.
    PackedTransaction = 8,
}

impl MessageType {
    /// Look up a type byte.
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::Handshake,
            1 => Self::ChainSize,
            2 => Self::GoAway,
            3 => Self::Time,
            4 => Self::Notice,
            5 => Self::Request,
            6 => Self::SyncRequest,
            7 => Self::SignedBlock,
            8 => Self::PackedTransaction,
            _ => return None,
        })
    }

    /// Wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Protocol name of the message.
    pub fn name(self) -> &'static str {
        match self {
            Self::Handshake => "Handshake",
            Self::ChainSize => "ChainSize",
            Self::GoAway => "GoAway",
            Self::Time => "Time",
            Self::Notice => "Notice",
            Self::Request => "Request",
            Self::SyncRequest => "SyncRequest",
            Self::SignedBlock => "SignedBlock",
            Self::PackedTransaction => "PackedTransaction",
        }
    }

}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Handshake message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeMessage {
    /// Protocol/network version.
    pub network_version: u16,
    /// Chain identifier.
    pub chain_id: Checksum256,
    /// Node identifier.
    pub node_id: Checksum256,
    /// Announced public key.
    pub key: PublicKey,
    /// Head block time.
    pub time: DateTime<Utc>,
    /// Token (all zero for anonymous peers).
    pub token: Checksum256,
    /// Signature over the token.
    pub sig: Signature,
    /// Address the sender is reachable at.
    pub p2p_address: String,
    /// Last irreversible block number.
    pub last_irreversible_block_num: u32,
    /// Last irreversible block id.
    pub last_irreversible_block_id: Checksum256,
    /// Head block number.
    pub head_num: u32,
    /// Head block id.
    pub head_id: Checksum256,
    /// Operating system string.
    pub os: String,
    /// Agent string.
    pub agent: String,
    /// Handshake generation counter.
    pub generation: i16,
}

/// Sent by a peer before it closes the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoAwayMessage {
    /// Protocol reason code.
    pub reason: u8,
    /// Node id of the sender.
    pub node_id: Checksum256,
}

/// Clock synchronization sample (nanosecond timestamps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeMessage {
    /// Origin timestamp.
    pub org: i64,
    /// Receive timestamp.
    pub rec: i64,
    /// Transmit timestamp.
    pub xmt: i64,
    /// Destination timestamp.
    pub dst: i64,
}

/// Request for the blocks in `[start_block, end_block]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRequestMessage {
    /// First block requested.
    pub start_block: u32,
    /// Last block requested.
    pub end_block: u32,
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum P2PMessage {
    /// See [`HandshakeMessage`].
    Handshake(HandshakeMessage),
    /// See [`GoAwayMessage`].
    GoAway(GoAwayMessage),
    /// See [`TimeMessage`].
    Time(TimeMessage),
    /// See [`SyncRequestMessage`].
    SyncRequest(SyncRequestMessage),
    /// Any other message, payload kept as received.
    Opaque {
        /// Message type.
        kind: MessageType,
        /// Raw payload bytes.
        payload: Vec<u8>,
    },
}

impl P2PMessage {
    /// Declared type of this message.
    pub fn kind(&self) -> MessageType {
        match self {
            Self::Handshake(_) => MessageType::Handshake,
            Self::GoAway(_) => MessageType::GoAway,
            Self::Time(_) => MessageType::Time,
            Self::SyncRequest(_) => MessageType::SyncRequest,
            Self::Opaque { kind, .. } => *kind,
        }
    }

    /// The handshake payload, if this is one.
    pub fn as_handshake(&self) -> Option<&HandshakeMessage> {
        match self {
            Self::Handshake(msg) => Some(msg),
            _ => None,
        }
    }
}

/// A framed unit of the wire protocol: type tag plus typed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Type tag.
    pub kind: MessageType,
    /// Payload.
    pub message: P2PMessage,
}

impl Envelope {
    /// Wrap a message, tagging it with its declared type.
    pub fn new(message: P2PMessage) -> Self {
        Self {
            kind: message.kind(),
            message,
        }
    }
}

impl From<P2PMessage> for Envelope {
    fn from(message: P2PMessage) -> Self {
        Self::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_byte_lookup() {
        for value in 0..=8u8 {
            let kind = MessageType::from_u8(value).unwrap();
            assert_eq!(kind.as_u8(), value);
        }
        assert_eq!(MessageType::from_u8(9), None);
        assert_eq!(MessageType::from_u8(255), None);
    }

    #[test]
    fn test_envelope_tags_with_message_kind() {
        let env = Envelope::new(P2PMessage::SyncRequest(SyncRequestMessage {
            start_block: 1,
            end_block: 2,
        }));
        assert_eq!(env.kind, MessageType::SyncRequest);

        let env = Envelope::new(P2PMessage::Opaque {
            kind: MessageType::SignedBlock,
            payload: vec![1, 2, 3],
        });
        assert_eq!(env.kind, MessageType::SignedBlock);
        assert!(env.message.as_handshake().is_none());
    }
}
