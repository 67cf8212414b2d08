//! # Ports
//!
//! - `inbound` - handlers the host plugs into the client
//! - `outbound` - services the client depends on

pub mod inbound;
pub mod outbound;

pub use inbound::{same_handler, FnHandler, Handler, HandlerRef};
pub use outbound::{
    BoxedReader, BoxedWriter, ChainInfoProvider, ConnectionSupervisor, MemoryTransport,
    MockChainInfo, NoOpSupervisor, RecordingSupervisor, Transport, WireCodec,
};
