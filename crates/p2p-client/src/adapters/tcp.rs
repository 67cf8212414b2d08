//! TCP transport.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::domain::TransportError;
use crate::ports::{BoxedReader, BoxedWriter, Transport};

/// Default bound on a TCP connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Outbound TCP transport.
#[derive(Debug, Clone, Copy)]
pub struct TcpTransport {
    connect_timeout: Duration,
}

impl TcpTransport {
    /// Transport with the default connect timeout.
    pub fn new() -> Self {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    /// Transport giving up on a connect after `connect_timeout`.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, address: &str) -> Result<(BoxedReader, BoxedWriter), TransportError> {
        debug!(address, timeout = ?self.connect_timeout, "Dialing peer");

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| TransportError::Timeout {
                address: address.to_string(),
            })?
            .map_err(|e| TransportError::Unreachable {
                address: address.to_string(),
                reason: e.to_string(),
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!(address, error = %e, "Failed to set TCP_NODELAY");
        }

        info!(address, "Connected to peer");

        let (reader, writer) = stream.into_split();
        let reader: BoxedReader = Box::new(reader);
        let writer: BoxedWriter = Box::new(writer);
        Ok((reader, writer))
    }
}
