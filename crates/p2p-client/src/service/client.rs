//! # Client
//!
//! Connection manager for a single peer.
//!
//! ## Connect sequence
//!
//! 1. Query the chain info provider for the local head and irreversible block.
//! 2. Open the transport.
//! 3. Register the handshake responder.
//! 4. Spawn the read loop and wait until it is reading.
//! 5. Send the initial handshake.
//!
//! The initial chain position is recorded on the session before step 4. A
//! peer handshake answered while step 5 is still in flight therefore leaves
//! its own position as [`Client::current_handshake`].
//!
//! A failure in step 1 or 2 leaves the client untouched. A failure in step 5
//! stops the read loop again; earlier side effects on the peer (the open
//! connection) are not rolled back beyond closing it.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::adapters::{EnvelopeCodec, TcpTransport};
use crate::config::ClientConfig;
use crate::domain::{
    ClientError, ClientIdentity, ConfigError, ConnectionState, DisconnectReason, HandshakeBuilder,
    HandshakeInfo, Route, DEFAULT_AGENT, DEFAULT_OS,
};
use crate::ports::{
    ChainInfoProvider, ConnectionSupervisor, HandlerRef, NoOpSupervisor, Transport, WireCodec,
};
use crate::service::read_loop::ReadLoop;
use crate::service::registry::HandlerRegistry;
use crate::service::responder::HandshakeResponder;
use crate::service::session::{PeerSession, DEFAULT_WRITE_TIMEOUT};

/// Default per-handler time limit.
pub const DEFAULT_HANDLER_BUDGET: Duration = Duration::from_secs(30);

/// Runtime options of a [`Client`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Bound on writing one frame.
    pub write_timeout: Duration,
    /// Per-handler time limit during dispatch (`None` = unbounded).
    pub handler_budget: Option<Duration>,
    /// Follow every answered peer handshake with a sync request.
    pub request_sync_on_handshake: bool,
    /// OS string announced in handshakes.
    pub os: String,
    /// Agent string announced in handshakes.
    pub agent: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            handler_budget: Some(DEFAULT_HANDLER_BUDGET),
            request_sync_on_handshake: false,
            os: DEFAULT_OS.to_string(),
            agent: DEFAULT_AGENT.to_string(),
        }
    }
}

/// A live connection.
struct Connection {
    session: Arc<PeerSession>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<DisconnectReason>,
}

/// Client for one peer.
///
/// Handlers may be registered before or after `connect`. When the
/// connection ends, every handler (the responder included) is removed.
pub struct Client {
    identity: ClientIdentity,
    options: ClientOptions,
    chain_info: Arc<dyn ChainInfoProvider>,
    transport: Arc<dyn Transport>,
    codec: Arc<dyn WireCodec>,
    supervisor: Arc<dyn ConnectionSupervisor>,
    registry: Arc<HandlerRegistry>,
    connection: tokio::sync::Mutex<Option<Connection>>,
    session: RwLock<Option<Arc<PeerSession>>>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl Client {
    /// Client using TCP, the envelope codec and no supervisor.
    pub fn new(
        identity: ClientIdentity,
        options: ClientOptions,
        chain_info: Arc<dyn ChainInfoProvider>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            identity,
            options,
            chain_info,
            transport: Arc::new(TcpTransport::new()),
            codec: Arc::new(EnvelopeCodec::new()),
            supervisor: Arc::new(NoOpSupervisor),
            registry: Arc::new(HandlerRegistry::new()),
            connection: tokio::sync::Mutex::new(None),
            session: RwLock::new(None),
            state: Arc::new(state),
        }
    }

    /// Client described by `config`, over TCP.
    pub fn from_config(config: &ClientConfig, chain_info: Arc<dyn ChainInfoProvider>) -> Result<Self, ConfigError> {
        let client = Self::new(config.identity()?, config.options(), chain_info)
            .with_transport(Arc::new(TcpTransport::with_connect_timeout(config.connect_timeout())))
            .with_codec(Arc::new(EnvelopeCodec::with_max_frame_size(config.max_frame_size)));
        Ok(client)
    }

    /// Replace the transport.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    /// Replace the wire codec.
    pub fn with_codec(mut self, codec: Arc<dyn WireCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Install a disconnect supervisor.
    pub fn with_supervisor(mut self, supervisor: Arc<dyn ConnectionSupervisor>) -> Self {
        self.supervisor = supervisor;
        self
    }

    /// Identity announced to the peer.
    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// Options in effect.
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Connect to the peer and send the initial handshake.
    pub async fn connect(&self) -> Result<(), ClientError> {
        let mut slot = self.connection.lock().await;
        if slot.is_some() && !self.state.borrow().is_disconnected() {
            return Err(ClientError::AlreadyConnected);
        }

        *self.session.write() = None;
        let info = self.initial_handshake_info().await?;

        let address = &self.identity.peer_address;
        info!(peer = %address, "Connecting");
        let (reader, writer) = self.transport.connect(address).await?;

        let route = Arc::new(Route::new(address.clone()));
        let builder = HandshakeBuilder::new(self.identity.clone())
            .with_agent(self.options.os.clone(), self.options.agent.clone());
        let session = Arc::new(PeerSession::new(
            route.clone(),
            builder,
            self.codec.clone(),
            writer,
            self.options.write_timeout,
        ));
        session.record_handshake(&info);

        let responder: HandlerRef = Arc::new(HandshakeResponder::new(
            session.clone(),
            self.options.request_sync_on_handshake,
        ));
        self.registry.register(responder.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (task, ready) = ReadLoop {
            route,
            reader,
            codec: self.codec.clone(),
            registry: self.registry.clone(),
            handler_budget: self.options.handler_budget,
            session: session.clone(),
            supervisor: self.supervisor.clone(),
            state: self.state.clone(),
            shutdown: shutdown_rx,
        }
        .spawn();

        if ready.await.is_err() {
            self.registry.unregister(&responder);
            return Err(ClientError::ReadLoopAborted);
        }

        *self.session.write() = Some(session.clone());
        *slot = Some(Connection {
            session: session.clone(),
            shutdown: shutdown_tx,
            task,
        });

        if let Err(e) = session.write_handshake(&info).await {
            warn!(peer = %address, error = %e, "Initial handshake failed, closing connection");
            if let Some(connection) = slot.take() {
                self.teardown(connection).await;
            }
            return Err(e.into());
        }

        info!(
            peer = %address,
            head = info.head_block_num,
            lib = info.last_irreversible_block_num,
            "Connected"
        );
        Ok(())
    }

    /// Local chain position: head from the provider, then the irreversible
    /// block looked up by number.
    async fn initial_handshake_info(&self) -> Result<HandshakeInfo, ClientError> {
        let head = self.chain_info.chain_head().await?;
        let lib = self
            .chain_info
            .block_by_number(head.last_irreversible_block_num)
            .await?;

        debug!(
            head = head.head_block_num,
            lib = lib.block_num,
            "Chain position for initial handshake"
        );
        Ok(HandshakeInfo::from_chain(&head, &lib))
    }

    /// Stop the read loop and close the connection. No-op when not connected.
    pub async fn disconnect(&self) {
        let connection = self.connection.lock().await.take();
        if let Some(connection) = connection {
            self.teardown(connection).await;
            info!(peer = %self.identity.peer_address, "Disconnected");
        }
    }

    async fn teardown(&self, connection: Connection) {
        let Connection {
            session,
            shutdown,
            task,
        } = connection;

        let _ = shutdown.send(true);
        if let Err(e) = task.await {
            warn!(error = %e, "Read loop task failed");
        }
        session.close().await;

        let mut current = self.session.write();
        if current.as_ref().is_some_and(|s| Arc::ptr_eq(s, &session)) {
            *current = None;
        }
    }

    /// Add a handler. Takes effect from the next dispatch.
    pub fn register_handler(&self, handler: HandlerRef) {
        self.registry.register(handler);
    }

    /// Remove a handler by identity. Returns `false` if it was not registered.
    pub fn unregister_handler(&self, handler: &HandlerRef) -> bool {
        self.registry.unregister(handler)
    }

    /// Number of registered handlers, the responder included.
    pub fn handler_count(&self) -> usize {
        self.registry.len()
    }

    /// Announce `info` to the peer.
    pub async fn send_handshake(&self, info: &HandshakeInfo) -> Result<(), ClientError> {
        self.current_session()?.send_handshake(info).await?;
        Ok(())
    }

    /// Ask the peer for blocks `start_block..=end_block`.
    pub async fn send_sync_request(&self, start_block: u32, end_block: u32) -> Result<(), ClientError> {
        self.current_session()?
            .send_sync_request(start_block, end_block)
            .await?;
        Ok(())
    }

    fn current_session(&self) -> Result<Arc<PeerSession>, ClientError> {
        self.live_session().ok_or(ClientError::NotConnected)
    }

    /// Session of the running connection. Drops the session of a connection
    /// whose read loop has ended.
    fn live_session(&self) -> Option<Arc<PeerSession>> {
        let mut slot = self.session.write();
        if slot.is_some() && self.state.borrow().is_disconnected() {
            *slot = None;
        }
        slot.clone()
    }

    /// Chain position announced by the latest handshake of the running
    /// connection.
    pub fn current_handshake(&self) -> Option<HandshakeInfo> {
        self.live_session().and_then(|s| s.last_handshake())
    }

    /// Whether the read loop is running.
    pub fn is_connected(&self) -> bool {
        matches!(*self.state.borrow(), ConnectionState::Connected)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Watch connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Wait until the connection ends and return why.
    ///
    /// Waits indefinitely on a client that never connects.
    pub async fn wait_disconnected(&self) -> DisconnectReason {
        let mut rx = self.state.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let ConnectionState::Disconnected(reason) = current {
                return reason;
            }
            if rx.changed().await.is_err() {
                return DisconnectReason::Shutdown;
            }
        }
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.get_mut().take() {
            let _ = connection.shutdown.send(true);
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("identity", &self.identity)
            .field("options", &self.options)
            .field("state", &self.state())
            .field("handlers", &self.registry.len())
            .finish()
    }
}
