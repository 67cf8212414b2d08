//! Dispatch envelope handed to handlers.

use std::sync::Arc;

use serde::Serialize;

use super::messages::Envelope;

/// Provenance of an inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    /// Address the message came from.
    pub from: String,
}

impl Route {
    /// Route for messages read from `from`.
    pub fn new(from: impl Into<String>) -> Self {
        Self { from: from.into() }
    }
}

/// A received envelope paired with its route.
///
/// Created once per decoded frame and shared by every handler of a dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct PostProcessable {
    /// Where the message came from.
    pub route: Arc<Route>,
    /// The decoded envelope.
    #[serde(rename = "p2p_message_envelope")]
    pub envelope: Envelope,
}

impl PostProcessable {
    /// Pair an envelope with its route.
    pub fn new(route: Arc<Route>, envelope: Envelope) -> Self {
        Self { route, envelope }
    }
}
