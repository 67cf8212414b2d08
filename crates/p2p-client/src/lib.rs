//! # P2P Client
//!
//! Client for a single peer of an EOSIO-style node network.
//!
//! **Architecture:** Hexagonal (Ports/Adapters)
//!
//! ## Purpose
//!
//! Open one connection to a peer, introduce ourselves with a handshake built
//! from the local chain position, then read framed messages forever and hand
//! each one to the registered handlers. A built-in responder answers every
//! peer handshake.
//!
//! ## Module Structure
//!
//! ```text
//! p2p-client/
//! ├── domain/          # Messages, envelopes, handshakes, checksummed keys, errors
//! ├── ports/           # Handler trait (inbound) + provider/transport/codec traits (outbound)
//! ├── service/         # Client, read loop, handler registry, responder
//! ├── adapters/        # Envelope codec, TCP transport, chain API, logging handlers
//! └── config.rs        # ClientConfig
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use p2p_client::{Client, ClientConfig, HttpChainInfoProvider, StringLoggerHandler};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::load("p2p-client.toml")?;
//! let provider = Arc::new(HttpChainInfoProvider::new("http://127.0.0.1:8888")?);
//!
//! let client = Client::from_config(&config, provider)?;
//! client.register_handler(Arc::new(StringLoggerHandler));
//! client.connect().await?;
//!
//! let reason = client.wait_disconnected().await;
//! println!("connection ended: {}", reason);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{
    EnvelopeCodec, LoggerHandler, StringLoggerHandler, TcpTransport, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_MAX_FRAME_SIZE,
};
#[cfg(feature = "http")]
pub use adapters::HttpChainInfoProvider;
pub use config::{ClientConfig, DEFAULT_NETWORK_VERSION};
pub use domain::{
    BlockRef, ChainHead, ChainInfoError, Checksum256, ClientError, ClientIdentity, CodecError,
    ConfigError, ConnectionState, DisconnectReason, Envelope, HandshakeBuilder, HandshakeInfo,
    HandshakeMessage, KeyError, MessageType, P2PMessage, PostProcessable, Route, SendError,
    TransportError,
};
pub use ports::{
    same_handler, BoxedReader, BoxedWriter, ChainInfoProvider, ConnectionSupervisor, FnHandler,
    Handler, HandlerRef, MemoryTransport, MockChainInfo, NoOpSupervisor, RecordingSupervisor,
    Transport, WireCodec,
};
pub use service::{
    Client, ClientOptions, DispatchReport, HandlerRegistry, HandshakeResponder, ResponderState,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
