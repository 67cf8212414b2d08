//! # Driven Ports (Outbound)
//!
//! These are the interfaces the client **requires** from its host: the chain
//! info provider, the transport, the wire codec and an optional supervisor.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream};

use crate::domain::{
    BlockRef, ChainHead, ChainInfoError, CodecError, DisconnectReason, Envelope, Route,
    TransportError,
};

/// Read half of a connection.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Answers chain position queries used to bootstrap the first handshake.
#[async_trait]
pub trait ChainInfoProvider: Send + Sync {
    /// Current head and last irreversible block number.
    async fn chain_head(&self) -> Result<ChainHead, ChainInfoError>;

    /// Look up a block by number.
    async fn block_by_number(&self, block_num: u32) -> Result<BlockRef, ChainInfoError>;
}

/// Opens the stream connection to a peer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to `address` and return the two halves of the stream.
    async fn connect(&self, address: &str) -> Result<(BoxedReader, BoxedWriter), TransportError>;
}

/// Frames envelopes on the byte stream.
#[async_trait]
pub trait WireCodec: Send + Sync {
    /// Read exactly one envelope from `reader`.
    ///
    /// Returns [`CodecError::ConnectionClosed`] when the stream ends cleanly
    /// before the first byte of a frame.
    async fn decode(&self, reader: &mut (dyn AsyncRead + Send + Unpin)) -> Result<Envelope, CodecError>;

    /// Encode `envelope` into one complete frame.
    fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>, CodecError>;
}

/// Notified once when a connection's read loop ends.
pub trait ConnectionSupervisor: Send + Sync {
    /// Called from the read-loop task after handlers have been cleared.
    fn on_disconnect(&self, route: &Route, reason: &DisconnectReason);
}

/// Supervisor that ignores disconnects.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSupervisor;

impl ConnectionSupervisor for NoOpSupervisor {
    fn on_disconnect(&self, _route: &Route, _reason: &DisconnectReason) {}
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Chain info provider answering from fixed values.
#[derive(Debug, Clone)]
pub struct MockChainInfo {
    /// Reported head.
    pub head: ChainHead,
    /// Block returned for the last irreversible block number.
    pub lib: BlockRef,
    /// Fail `chain_head`?
    pub fail_head: bool,
    /// Fail `block_by_number`?
    pub fail_block: bool,
}

impl MockChainInfo {
    /// Provider reporting `head` with `lib` as the irreversible block.
    pub fn new(head: ChainHead, lib: BlockRef) -> Self {
        Self {
            head,
            lib,
            fail_head: false,
            fail_block: false,
        }
    }
}

#[async_trait]
impl ChainInfoProvider for MockChainInfo {
    async fn chain_head(&self) -> Result<ChainHead, ChainInfoError> {
        if self.fail_head {
            return Err(ChainInfoError::Request("Mock head failure".to_string()));
        }
        Ok(self.head.clone())
    }

    async fn block_by_number(&self, block_num: u32) -> Result<BlockRef, ChainInfoError> {
        if self.fail_block {
            return Err(ChainInfoError::Request("Mock block failure".to_string()));
        }
        if block_num != self.lib.block_num {
            return Err(ChainInfoError::InvalidResponse(format!(
                "unknown block {}",
                block_num
            )));
        }
        Ok(self.lib)
    }
}

/// In-memory transport over a tokio duplex pipe.
///
/// Each `connect` hands the client one end and keeps the other for the test,
/// which plays the remote peer through [`take_peer`](Self::take_peer).
pub struct MemoryTransport {
    attempts: AtomicUsize,
    peer: Mutex<Option<DuplexStream>>,
    buffer: usize,
    greeting: Vec<u8>,
    refuse: bool,
}

impl MemoryTransport {
    /// Transport accepting every connect.
    pub fn new() -> Self {
        Self {
            attempts: AtomicUsize::new(0),
            peer: Mutex::new(None),
            buffer: 64 * 1024,
            greeting: Vec::new(),
            refuse: false,
        }
    }

    /// Pipe capacity in bytes per direction.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    /// Bytes the peer sends as soon as the connection opens.
    pub fn with_greeting(mut self, greeting: Vec<u8>) -> Self {
        self.greeting = greeting;
        self
    }

    /// Transport refusing every connect.
    pub fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::new()
        }
    }

    /// Number of connect attempts so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Remote end of the last connection.
    pub fn take_peer(&self) -> Option<DuplexStream> {
        self.peer.lock().take()
    }
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self, address: &str) -> Result<(BoxedReader, BoxedWriter), TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(TransportError::Unreachable {
                address: address.to_string(),
                reason: "refused by mock transport".to_string(),
            });
        }

        let (local, mut remote) = tokio::io::duplex(self.buffer);
        if !self.greeting.is_empty() {
            remote
                .write_all(&self.greeting)
                .await
                .map_err(|e| TransportError::Unreachable {
                    address: address.to_string(),
                    reason: e.to_string(),
                })?;
        }
        *self.peer.lock() = Some(remote);
        let (reader, writer) = tokio::io::split(local);
        let reader: BoxedReader = Box::new(reader);
        let writer: BoxedWriter = Box::new(writer);
        Ok((reader, writer))
    }
}

/// Supervisor remembering every disconnect it was told about.
#[derive(Debug, Default)]
pub struct RecordingSupervisor {
    events: Mutex<Vec<(Route, DisconnectReason)>>,
}

impl RecordingSupervisor {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Disconnects seen so far.
    pub fn events(&self) -> Vec<(Route, DisconnectReason)> {
        self.events.lock().clone()
    }
}

impl ConnectionSupervisor for RecordingSupervisor {
    fn on_disconnect(&self, route: &Route, reason: &DisconnectReason) {
        self.events.lock().push((route.clone(), reason.clone()));
    }
}
