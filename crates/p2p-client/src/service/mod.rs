//! # Client Service
//!
//! Wires the domain to the ports: connection management, the read loop,
//! handler dispatch and the built-in handshake responder.
//!
//! ## Tasks and locks
//!
//! - The read-loop task owns the read half and runs handlers one at a time.
//! - The session owns the write half behind its own lock, so a handler may
//!   send while it is being dispatched.
//! - The handler list is copy-on-write; handlers may change it mid-dispatch.

// Semantic submodules
mod client;
mod read_loop;
mod registry;
mod responder;
mod session;

// Re-export public API
pub use client::{Client, ClientOptions, DEFAULT_HANDLER_BUDGET};
pub use read_loop::{read_frame, ReadLoop, ReadOutcome};
pub use registry::{DispatchReport, HandlerRegistry};
pub use responder::{HandshakeResponder, ResponderState};
pub use session::{PeerSession, DEFAULT_WRITE_TIMEOUT};
