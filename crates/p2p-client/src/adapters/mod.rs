//! # Adapters
//!
//! Concrete implementations of the outbound ports plus logging handlers.
//!
//! - `EnvelopeCodec` - length-prefixed wire codec over the binary payload layout
//! - `TcpTransport` - tokio TCP transport
//! - `HttpChainInfoProvider` - EOSIO chain API (requires "http" feature)
//! - `LoggerHandler`, `StringLoggerHandler` - traffic logging

pub mod codec;
pub mod logging;
pub mod tcp;
mod wire;

#[cfg(feature = "http")]
pub mod chain_api;

pub use codec::{EnvelopeCodec, DEFAULT_MAX_FRAME_SIZE};
pub use logging::{LoggerHandler, StringLoggerHandler};
pub use tcp::{TcpTransport, DEFAULT_CONNECT_TIMEOUT};

#[cfg(feature = "http")]
pub use chain_api::HttpChainInfoProvider;
