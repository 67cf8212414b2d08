//! # Read Loop
//!
//! One task per connection: decode a frame, dispatch it to every registered
//! handler, repeat. The loop ends when the peer closes the stream, when a
//! frame cannot be decoded, when a write to the peer fails, or when shutdown
//! is signalled. On the way out it
//! clears the handlers, closes the write side, tells the supervisor and
//! finally publishes [`ConnectionState::Disconnected`].

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, BufReader};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{CodecError, ConnectionState, DisconnectReason, Envelope, PostProcessable, Route};
use crate::ports::{BoxedReader, ConnectionSupervisor, WireCodec};
use crate::service::registry::HandlerRegistry;
use crate::service::session::PeerSession;

/// Result of one decode attempt.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A complete envelope.
    Frame(Envelope),
    /// The stream ended or the socket failed.
    ConnectionClosed,
    /// The bytes on the wire are not a valid frame.
    ProtocolError(CodecError),
}

/// Decode the next frame from `reader`.
pub async fn read_frame(codec: &dyn WireCodec, reader: &mut (dyn AsyncRead + Send + Unpin)) -> ReadOutcome {
    match codec.decode(reader).await {
        Ok(envelope) => ReadOutcome::Frame(envelope),
        Err(e) if e.is_disconnect() => ReadOutcome::ConnectionClosed,
        Err(e) => ReadOutcome::ProtocolError(e),
    }
}

fn write_failed(route: &Route) -> DisconnectReason {
    warn!(peer = %route.from, "Dropping connection after failed write");
    DisconnectReason::WriteFailed
}

/// Everything the read-loop task owns.
pub struct ReadLoop {
    /// Peer the frames come from.
    pub route: Arc<Route>,
    /// Read half of the connection.
    pub reader: BoxedReader,
    /// Frame decoder.
    pub codec: Arc<dyn WireCodec>,
    /// Handlers to dispatch to.
    pub registry: Arc<HandlerRegistry>,
    /// Per-handler time limit.
    pub handler_budget: Option<Duration>,
    /// Write side, closed when the loop ends.
    pub session: Arc<PeerSession>,
    /// Disconnect observer.
    pub supervisor: Arc<dyn ConnectionSupervisor>,
    /// Published connection state.
    pub state: Arc<watch::Sender<ConnectionState>>,
    /// Set to `true` to stop the loop.
    pub shutdown: watch::Receiver<bool>,
}

impl ReadLoop {
    /// Spawn the loop. The returned receiver fires once the loop is reading.
    pub fn spawn(self) -> (JoinHandle<DisconnectReason>, oneshot::Receiver<()>) {
        let (ready_tx, ready_rx) = oneshot::channel();
        let handle = tokio::spawn(self.run(ready_tx));
        (handle, ready_rx)
    }

    /// Run until the connection ends; returns why it ended.
    async fn run(self, ready: oneshot::Sender<()>) -> DisconnectReason {
        let ReadLoop {
            route,
            reader,
            codec,
            registry,
            handler_budget,
            session,
            supervisor,
            state,
            mut shutdown,
        } = self;

        let mut reader = BufReader::new(reader);
        state.send_replace(ConnectionState::Connected);
        let _ = ready.send(());
        debug!(peer = %route.from, "Read loop started");

        let reason = loop {
            if *shutdown.borrow() {
                break DisconnectReason::Shutdown;
            }

            let outcome = tokio::select! {
                biased;
                _ = shutdown.changed() => break DisconnectReason::Shutdown,
                _ = session.write_failed() => break write_failed(&route),
                outcome = read_frame(codec.as_ref(), &mut reader) => outcome,
            };

            match outcome {
                ReadOutcome::Frame(envelope) => {
                    let msg = PostProcessable::new(route.clone(), envelope);
                    tokio::select! {
                        biased;
                        _ = shutdown.changed() => break DisconnectReason::Shutdown,
                        _ = session.write_failed() => break write_failed(&route),
                        _ = registry.dispatch(&msg, handler_budget) => {}
                    }
                }
                ReadOutcome::ConnectionClosed => {
                    info!(peer = %route.from, "Connection closed by peer");
                    break DisconnectReason::ConnectionClosed;
                }
                ReadOutcome::ProtocolError(e) => {
                    warn!(peer = %route.from, error = %e, "Dropping connection on undecodable frame");
                    break DisconnectReason::ProtocolError(e.to_string());
                }
            }
        };

        registry.clear();
        session.close().await;
        supervisor.on_disconnect(&route, &reason);
        state.send_replace(ConnectionState::Disconnected(reason.clone()));

        info!(peer = %route.from, reason = %reason, "Read loop stopped");
        reason
    }
}
