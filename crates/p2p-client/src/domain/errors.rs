//! # Domain Errors
//!
//! Error types for the peer client, grouped by where they surface:
//! bootstrap (`connect`), sends, and the read loop.

use std::time::Duration;

use thiserror::Error;

/// 32-byte chain hash (chain id, block id, node id).
pub type Checksum256 = [u8; 32];

/// Parse a 64-character hex string into a [`Checksum256`].
pub fn checksum_from_hex(s: &str) -> Option<Checksum256> {
    let mut out = [0u8; 32];
    hex::decode_to_slice(s.trim(), &mut out).ok()?;
    Some(out)
}

/// Top-level error returned by [`Client`](crate::Client) operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Querying the chain info provider failed during bootstrap.
    #[error("chain info query failed: {0}")]
    ChainInfo(#[from] ChainInfoError),

    /// The transport could not be opened.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Building or writing an outbound message failed.
    #[error("send failed: {0}")]
    Send(#[from] SendError),

    /// `connect` was called on a client that already owns a connection.
    #[error("client is already connected")]
    AlreadyConnected,

    /// A send was attempted before `connect` succeeded.
    #[error("client is not connected")]
    NotConnected,

    /// The read loop ended before signalling that it was draining the socket.
    #[error("read loop exited before it became ready")]
    ReadLoopAborted,
}

/// Errors from the chain info provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainInfoError {
    /// The request could not be performed.
    #[error("request failed: {0}")]
    Request(String),

    /// The provider answered with something we cannot use.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors opening the transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The peer could not be reached.
    #[error("connection to {address} failed: {reason}")]
    Unreachable {
        /// Peer address.
        address: String,
        /// Error description.
        reason: String,
    },

    /// The connect attempt did not finish in time.
    #[error("connection to {address} timed out")]
    Timeout {
        /// Peer address.
        address: String,
    },
}

/// Errors constructing the placeholder key material of a handshake.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyError {
    /// Public key literal is malformed.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    /// Signature literal is malformed.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}

/// Errors on the outbound path.
#[derive(Debug, Error)]
pub enum SendError {
    /// Handshake key material could not be built.
    #[error(transparent)]
    Key(#[from] KeyError),

    /// The envelope could not be encoded.
    #[error("encode failed: {0}")]
    Codec(#[from] CodecError),

    /// Writing to the socket failed.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),

    /// Writing a frame took longer than the write timeout.
    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    /// The write side is closed or a previous frame was left incomplete.
    #[error("connection closed")]
    Closed,
}

/// Wire codec errors.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The stream ended on a frame boundary.
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// Underlying I/O failure (includes EOF in the middle of a frame).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Declared frame length exceeds the configured maximum.
    #[error("frame of {len} bytes exceeds maximum of {max}")]
    FrameTooLarge {
        /// Declared length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Frame declared zero length (no room for the type byte).
    #[error("empty frame")]
    EmptyFrame,

    /// Type byte does not name a known message.
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),

    /// Payload could not be (de)serialized.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

impl CodecError {
    /// Whether this error means the peer went away rather than misbehaved.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Configuration loading errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read {path}: {error}")]
    Io {
        /// File path.
        path: String,
        /// Error description.
        error: String,
    },

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// `chain_id` is not 64 hex characters.
    #[error("invalid chain id: {0}")]
    InvalidChainId(String),
}
