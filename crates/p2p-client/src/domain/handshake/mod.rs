//! # Handshakes
//!
//! Chain position snapshots and the outbound handshake builder.

mod builder;
mod types;

pub use builder::{HandshakeBuilder, DEFAULT_AGENT, DEFAULT_OS, HANDSHAKE_GENERATION};
pub use types::{BlockRef, ChainHead, ClientIdentity, HandshakeInfo};
