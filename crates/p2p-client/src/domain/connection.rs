//! Connection lifecycle states.

use std::fmt;

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `disconnect` was called.
    Shutdown,
    /// The peer closed the stream or the socket failed.
    ConnectionClosed,
    /// The peer sent something the codec could not decode.
    ProtocolError(String),
    /// A frame could not be written; the outbound stream is unusable.
    WriteFailed,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => write!(f, "shutdown"),
            Self::ConnectionClosed => write!(f, "connection closed"),
            Self::ProtocolError(e) => write!(f, "protocol error: {}", e),
            Self::WriteFailed => write!(f, "write failed"),
        }
    }
}

/// Lifecycle of a client connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// `connect` has not succeeded yet.
    #[default]
    Idle,
    /// The read loop is running.
    Connected,
    /// The read loop has ended.
    Disconnected(DisconnectReason),
}

impl ConnectionState {
    /// Whether the connection has ended.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}
