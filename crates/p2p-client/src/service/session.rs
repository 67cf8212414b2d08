//! # Peer Session
//!
//! Write side of one connection. Every outbound message goes through
//! [`PeerSession::send_message`], which frames it and writes it under the
//! session's write lock.
//!
//! A frame write that does not complete (I/O error, timeout, or the sending
//! future being dropped) leaves the stream mid-frame. The session is then
//! marked broken, every later send fails with [`SendError::Closed`], and
//! [`PeerSession::write_failed`] resolves so the read loop can end the
//! connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::domain::{
    Envelope, HandshakeBuilder, HandshakeInfo, P2PMessage, Route, SendError, SyncRequestMessage,
};
use crate::ports::{BoxedWriter, WireCodec};

/// Default bound on writing a single frame.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound half of a connection.
pub struct PeerSession {
    route: Arc<Route>,
    builder: HandshakeBuilder,
    codec: Arc<dyn WireCodec>,
    writer: tokio::sync::Mutex<BoxedWriter>,
    write_timeout: Duration,
    broken: AtomicBool,
    failed: Notify,
    last_handshake: RwLock<Option<HandshakeInfo>>,
}

/// Signals a write failure when dropped before the frame is complete.
struct FrameGuard<'a> {
    failed: &'a Notify,
    complete: bool,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        if !self.complete {
            self.failed.notify_one();
        }
    }
}

impl PeerSession {
    /// Session writing to `writer`.
    pub fn new(
        route: Arc<Route>,
        builder: HandshakeBuilder,
        codec: Arc<dyn WireCodec>,
        writer: BoxedWriter,
        write_timeout: Duration,
    ) -> Self {
        Self {
            route,
            builder,
            codec,
            writer: tokio::sync::Mutex::new(writer),
            write_timeout,
            broken: AtomicBool::new(false),
            failed: Notify::new(),
            last_handshake: RwLock::new(None),
        }
    }

    /// Peer this session writes to.
    pub fn route(&self) -> &Arc<Route> {
        &self.route
    }

    /// Chain position announced by the latest handshake.
    pub fn last_handshake(&self) -> Option<HandshakeInfo> {
        self.last_handshake.read().clone()
    }

    /// Whether the write side can no longer be used.
    pub fn is_closed(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    /// Resolves once a frame write has failed. A failure that happens with
    /// nobody waiting is remembered for the next call.
    pub async fn write_failed(&self) {
        self.failed.notified().await
    }

    /// Build and send a handshake announcing `info`, then record it as the
    /// latest announced position.
    pub async fn send_handshake(&self, info: &HandshakeInfo) -> Result<(), SendError> {
        self.write_handshake(info).await?;
        self.record_handshake(info);
        Ok(())
    }

    /// Record `info` as announced without sending anything.
    pub(crate) fn record_handshake(&self, info: &HandshakeInfo) {
        *self.last_handshake.write() = Some(info.clone());
    }

    /// Build and send a handshake announcing `info`. The recorded position is
    /// left alone.
    pub(crate) async fn write_handshake(&self, info: &HandshakeInfo) -> Result<(), SendError> {
        let handshake = self.builder.build(info)?;

        info!(
            peer = %self.route.from,
            head = info.head_block_num,
            lib = info.last_irreversible_block_num,
            "Sending handshake"
        );

        self.send_message(P2PMessage::Handshake(handshake)).await
    }

    /// Ask the peer for blocks `start..=end`.
    pub async fn send_sync_request(&self, start_block: u32, end_block: u32) -> Result<(), SendError> {
        info!(
            peer = %self.route.from,
            start = start_block,
            end = end_block,
            "Sending sync request"
        );

        self.send_message(P2PMessage::SyncRequest(SyncRequestMessage {
            start_block,
            end_block,
        }))
        .await
    }

    /// Wrap `message` in an envelope and write it as one frame.
    pub(crate) async fn send_message(&self, message: P2PMessage) -> Result<(), SendError> {
        let envelope = Envelope::new(message);
        let frame = self.codec.encode(&envelope)?;

        let mut writer = self.writer.lock().await;
        if self.broken.load(Ordering::SeqCst) {
            return Err(SendError::Closed);
        }

        // Cleared only once the whole frame is out.
        self.broken.store(true, Ordering::SeqCst);
        let mut guard = FrameGuard {
            failed: &self.failed,
            complete: false,
        };

        let write = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        };

        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(Ok(())) => {
                self.broken.store(false, Ordering::SeqCst);
                guard.complete = true;
                debug!(
                    peer = %self.route.from,
                    kind = %envelope.kind,
                    bytes = frame.len(),
                    "Sent message"
                );
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(peer = %self.route.from, kind = %envelope.kind, error = %e, "Write failed");
                Err(SendError::Io(e))
            }
            Err(_) => {
                warn!(
                    peer = %self.route.from,
                    kind = %envelope.kind,
                    timeout = ?self.write_timeout,
                    "Write timed out"
                );
                Err(SendError::Timeout(self.write_timeout))
            }
        }
    }

    /// Shut down the write side. Later sends fail with [`SendError::Closed`].
    pub async fn close(&self) {
        let mut writer = self.writer.lock().await;
        self.broken.store(true, Ordering::SeqCst);
        if let Err(e) = writer.shutdown().await {
            debug!(peer = %self.route.from, error = %e, "Write shutdown failed");
        }
    }
}

impl std::fmt::Debug for PeerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerSession")
            .field("route", &self.route)
            .field("write_timeout", &self.write_timeout)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::EnvelopeCodec;
    use crate::domain::{ClientIdentity, MessageType};
    use chrono::Utc;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncWrite, DuplexStream};

    fn make_info() -> HandshakeInfo {
        HandshakeInfo {
            head_block_num: 100,
            head_block_id: [1u8; 32],
            head_block_time: Utc::now(),
            last_irreversible_block_num: 90,
            last_irreversible_block_id: [2u8; 32],
        }
    }

    fn make_session(writer: BoxedWriter, write_timeout: Duration) -> PeerSession {
        let identity = ClientIdentity::new("peer:1", [7u8; 32], 1206);
        PeerSession::new(
            Arc::new(Route::new("peer:1")),
            HandshakeBuilder::new(identity),
            Arc::new(EnvelopeCodec::new()),
            writer,
            write_timeout,
        )
    }

    fn duplex_session() -> (PeerSession, DuplexStream) {
        let (local, remote) = tokio::io::duplex(64 * 1024);
        (make_session(Box::new(local), DEFAULT_WRITE_TIMEOUT), remote)
    }

    /// Writer that never makes progress.
    struct StalledWriter;

    impl AsyncWrite for StalledWriter {
        fn poll_write(self: Pin<&mut Self>, _: &mut Context<'_>, _: &[u8]) -> Poll<std::io::Result<usize>> {
            Poll::Pending
        }
        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Pending
        }
        fn poll_shutdown(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_send_handshake_writes_one_frame() {
        let (session, mut remote) = duplex_session();
        let info = make_info();

        session.send_handshake(&info).await.unwrap();

        let envelope = EnvelopeCodec::new().decode(&mut remote).await.unwrap();
        let handshake = envelope.message.as_handshake().unwrap();
        assert_eq!(handshake.head_num, 100);
        assert_eq!(handshake.last_irreversible_block_num, 90);
        assert_eq!(handshake.chain_id, [7u8; 32]);
        assert_eq!(session.last_handshake(), Some(info));
    }

    #[tokio::test]
    async fn test_late_initial_write_keeps_newer_position() {
        let (session, mut remote) = duplex_session();
        let initial = make_info();
        let echoed = HandshakeInfo {
            head_block_num: 300,
            ..make_info()
        };

        session.record_handshake(&initial);
        session.send_handshake(&echoed).await.unwrap();
        session.write_handshake(&initial).await.unwrap();

        assert_eq!(session.last_handshake().unwrap().head_block_num, 300);
        let codec = EnvelopeCodec::new();
        for head in [300, 100] {
            let envelope = codec.decode(&mut remote).await.unwrap();
            assert_eq!(envelope.message.as_handshake().unwrap().head_num, head);
        }
    }

    #[tokio::test]
    async fn test_send_sync_request() {
        let (session, mut remote) = duplex_session();

        session.send_sync_request(90, 100).await.unwrap();

        let envelope = EnvelopeCodec::new().decode(&mut remote).await.unwrap();
        assert_eq!(envelope.kind, MessageType::SyncRequest);
        assert_eq!(
            envelope.message,
            P2PMessage::SyncRequest(SyncRequestMessage {
                start_block: 90,
                end_block: 100
            })
        );
        assert!(session.last_handshake().is_none());
    }

    #[tokio::test]
    async fn test_invalid_key_material_fails_before_write() {
        let (local, mut remote) = tokio::io::duplex(1024);
        let identity = ClientIdentity::new("peer:1", [7u8; 32], 1206);
        let session = PeerSession::new(
            Arc::new(Route::new("peer:1")),
            HandshakeBuilder::new(identity).with_key_material("not-a-key", "not-a-sig"),
            Arc::new(EnvelopeCodec::new()),
            Box::new(local),
            DEFAULT_WRITE_TIMEOUT,
        );

        let err = session.send_handshake(&make_info()).await.unwrap_err();
        assert!(matches!(err, SendError::Key(_)));
        assert!(!session.is_closed());

        drop(session);
        let mut buf = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut remote, &mut buf).await.unwrap();
        assert!(buf.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_timeout_poisons_session() {
        let session = make_session(Box::new(StalledWriter), Duration::from_millis(100));

        let err = session.send_sync_request(1, 2).await.unwrap_err();
        assert!(matches!(err, SendError::Timeout(_)));
        assert!(session.is_closed());

        let err = session.send_sync_request(1, 2).await.unwrap_err();
        assert!(matches!(err, SendError::Closed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_write_is_signalled() {
        let session = make_session(Box::new(StalledWriter), Duration::from_millis(100));

        session.send_sync_request(1, 2).await.unwrap_err();
        tokio::time::timeout(Duration::from_secs(1), session.write_failed())
            .await
            .expect("write failure was not signalled");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_write_is_signalled() {
        let session = make_session(Box::new(StalledWriter), DEFAULT_WRITE_TIMEOUT);

        let cut = tokio::time::timeout(Duration::from_millis(10), session.send_sync_request(1, 2)).await;
        assert!(cut.is_err());
        assert!(session.is_closed());

        tokio::time::timeout(Duration::from_secs(1), session.write_failed())
            .await
            .expect("dropped send was not signalled");
    }

    #[tokio::test]
    async fn test_clean_send_and_close_do_not_signal() {
        let (session, _remote) = duplex_session();
        session.send_sync_request(1, 2).await.unwrap();
        session.close().await;

        let waited = tokio::time::timeout(Duration::from_millis(50), session.write_failed()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_send_after_peer_gone_fails() {
        let (session, remote) = duplex_session();
        drop(remote);

        let err = session.send_sync_request(1, 2).await.unwrap_err();
        assert!(matches!(err, SendError::Io(_)));
        assert!(matches!(
            session.send_sync_request(1, 2).await,
            Err(SendError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_close_rejects_later_sends() {
        let (session, _remote) = duplex_session();
        session.close().await;

        assert!(session.is_closed());
        assert!(matches!(
            session.send_sync_request(1, 2).await,
            Err(SendError::Closed)
        ));
    }
}
