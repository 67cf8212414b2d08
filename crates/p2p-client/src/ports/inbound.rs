//! # Driving Ports (Inbound)
//!
//! Observers the host registers with a [`Client`](crate::Client) to receive
//! every decoded envelope.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::PostProcessable;

/// Observer invoked with every envelope received on a connection.
///
/// Handlers run on the read-loop task, one after another in registration
/// order. A handler that blocks stalls the connection until the handler
/// budget expires, so long work belongs on a spawned task.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Process one received envelope.
    async fn handle(&self, msg: &PostProcessable);
}

/// Shared handler reference. Registry identity is the pointer, not the value.
pub type HandlerRef = Arc<dyn Handler>;

/// Adapts a synchronous closure into a [`Handler`].
///
/// ```rust
/// use p2p_client::{FnHandler, HandlerRef};
/// use std::sync::Arc;
///
/// let handler: HandlerRef = Arc::new(FnHandler::new(|msg| {
///     println!("received {}", msg.envelope.kind);
/// }));
/// # let _ = handler;
/// ```
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&PostProcessable) + Send + Sync,
{
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: Fn(&PostProcessable) + Send + Sync,
{
    async fn handle(&self, msg: &PostProcessable) {
        (self.f)(msg)
    }
}

/// Whether two handler references name the same handler instance.
pub fn same_handler(a: &HandlerRef, b: &HandlerRef) -> bool {
    // Compare data pointers only; vtable pointers are not unique per type.
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Envelope, MessageType, P2PMessage, Route};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_msg() -> PostProcessable {
        PostProcessable::new(
            Arc::new(Route::new("peer:1")),
            Envelope::new(P2PMessage::Opaque {
                kind: MessageType::Notice,
                payload: vec![],
            }),
        )
    }

    #[tokio::test]
    async fn test_fn_handler_invokes_closure() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let handler = FnHandler::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handler.handle(&make_msg()).await;
        handler.handle(&make_msg()).await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_same_handler_is_identity_not_value() {
        let a: HandlerRef = Arc::new(FnHandler::new(|_| {}));
        let b: HandlerRef = Arc::new(FnHandler::new(|_| {}));
        let a2 = a.clone();

        assert!(same_handler(&a, &a2));
        assert!(!same_handler(&a, &b));
    }
}
