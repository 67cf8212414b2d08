//! Handlers that log traffic.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::PostProcessable;
use crate::ports::Handler;

/// Logs every message as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggerHandler;

impl LoggerHandler {
    /// Render `msg` the way this handler logs it.
    pub fn render(msg: &PostProcessable) -> Result<String, serde_json::Error> {
        serde_json::to_string(msg)
    }
}

#[async_trait]
impl Handler for LoggerHandler {
    async fn handle(&self, msg: &PostProcessable) {
        match Self::render(msg) {
            Ok(data) => info!(from = %msg.route.from, message = %data, "Received message"),
            Err(e) => warn!(error = %e, "Logger handler failed to serialize message"),
        }
    }
}

/// Logs only the type of every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringLoggerHandler;

#[async_trait]
impl Handler for StringLoggerHandler {
    async fn handle(&self, msg: &PostProcessable) {
        info!(from = %msg.route.from, kind = %msg.envelope.kind, "Received message");
    }
}
