//! Domain Layer - protocol types with no I/O
//!
//! - Envelopes and message variants
//! - Checksummed key material
//! - Handshake snapshots and builder
//! - Routes and dispatch envelopes
//! - Connection lifecycle
//! - Errors

pub mod connection;
pub mod errors;
pub mod handshake;
pub mod keys;
pub mod messages;
pub mod route;

pub use connection::*;
pub use errors::*;
pub use handshake::*;
pub use keys::*;
pub use messages::*;
pub use route::*;
