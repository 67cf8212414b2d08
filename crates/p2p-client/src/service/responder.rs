//! # Handshake Responder
//!
//! Built-in handler answering every peer handshake with a handshake that
//! announces the peer's own chain position back to it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::domain::{HandshakeInfo, PostProcessable};
use crate::ports::Handler;
use crate::service::session::PeerSession;

/// Responder progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponderState {
    /// No handshake answered yet.
    #[default]
    Idle,
    /// At least one handshake answered.
    Synced,
}

/// Answers peer handshakes on one session.
pub struct HandshakeResponder {
    session: Arc<PeerSession>,
    request_sync: bool,
    state: RwLock<ResponderState>,
    handshakes_seen: AtomicU64,
}

impl HandshakeResponder {
    /// Responder writing to `session`.
    ///
    /// With `request_sync`, every answered handshake is followed by a sync
    /// request for the peer's irreversible..head range.
    pub fn new(session: Arc<PeerSession>, request_sync: bool) -> Self {
        Self {
            session,
            request_sync,
            state: RwLock::new(ResponderState::Idle),
            handshakes_seen: AtomicU64::new(0),
        }
    }

    /// Current state.
    pub fn state(&self) -> ResponderState {
        *self.state.read()
    }

    /// Peer handshakes received so far.
    pub fn handshakes_seen(&self) -> u64 {
        self.handshakes_seen.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Handler for HandshakeResponder {
    async fn handle(&self, msg: &PostProcessable) {
        let Some(peer) = msg.envelope.message.as_handshake() else {
            return;
        };
        self.handshakes_seen.fetch_add(1, Ordering::Relaxed);

        debug!(
            from = %msg.route.from,
            head = peer.head_num,
            lib = peer.last_irreversible_block_num,
            agent = %peer.agent,
            "Peer handshake received"
        );

        let info = HandshakeInfo::from_peer(peer);
        if let Err(e) = self.session.send_handshake(&info).await {
            warn!(from = %msg.route.from, error = %e, "Failed to answer peer handshake");
            return;
        }
        *self.state.write() = ResponderState::Synced;

        if self.request_sync {
            if let Err(e) = self
                .session
                .send_sync_request(peer.last_irreversible_block_num, peer.head_num)
                .await
            {
                warn!(from = %msg.route.from, error = %e, "Failed to send sync request");
            }
        }
    }
}

impl std::fmt::Debug for HandshakeResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandshakeResponder")
            .field("state", &self.state())
            .field("request_sync", &self.request_sync)
            .field("handshakes_seen", &self.handshakes_seen())
            .finish()
    }
}
