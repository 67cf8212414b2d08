//! # Handler Registry
//!
//! Ordered, copy-on-write list of handlers.
//!
//! ## Concurrency
//!
//! - Mutations build a new list and swap it in under a short write lock.
//! - Dispatch clones the current `Arc` snapshot and iterates it without
//!   holding the list lock, so a handler may register or unregister
//!   handlers (itself included) without deadlocking. Changes apply from
//!   the next dispatch on.
//! - A dispatch gate serializes dispatches: handlers never run concurrently
//!   with each other.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::warn;

use crate::domain::PostProcessable;
use crate::ports::{same_handler, HandlerRef};

/// Outcome of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchReport {
    /// Handlers in the snapshot that was dispatched to.
    pub invoked: usize,
    /// Handlers cut off by the handler budget.
    pub timed_out: usize,
}

/// Thread-safe ordered handler collection.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<Arc<Vec<HandlerRef>>>,
    dispatch_gate: tokio::sync::Mutex<()>,
}

impl HandlerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler`.
    pub fn register(&self, handler: HandlerRef) {
        let mut handlers = self.handlers.write();
        let mut next = Vec::with_capacity(handlers.len() + 1);
        next.extend(handlers.iter().cloned());
        next.push(handler);
        *handlers = Arc::new(next);
    }

    /// Remove every registration of this handler instance.
    ///
    /// Returns `false` (and leaves the registry untouched) if it was not registered.
    pub fn unregister(&self, handler: &HandlerRef) -> bool {
        let mut handlers = self.handlers.write();
        if !handlers.iter().any(|h| same_handler(h, handler)) {
            return false;
        }
        let next: Vec<HandlerRef> = handlers
            .iter()
            .filter(|h| !same_handler(h, handler))
            .cloned()
            .collect();
        *handlers = Arc::new(next);
        true
    }

    /// Drop all handlers.
    pub fn clear(&self) {
        *self.handlers.write() = Arc::new(Vec::new());
    }

    /// Current immutable handler list.
    pub fn snapshot(&self) -> Arc<Vec<HandlerRef>> {
        self.handlers.read().clone()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke every handler registered when the dispatch starts, in order.
    ///
    /// With a `budget`, each handler gets at most that long; an overrunning
    /// handler is cancelled and the next one runs.
    pub async fn dispatch(&self, msg: &PostProcessable, budget: Option<Duration>) -> DispatchReport {
        let _gate = self.dispatch_gate.lock().await;
        let snapshot = self.snapshot();

        let mut report = DispatchReport {
            invoked: snapshot.len(),
            timed_out: 0,
        };

        for handler in snapshot.iter() {
            match budget {
                Some(limit) => {
                    if tokio::time::timeout(limit, handler.handle(msg)).await.is_err() {
                        warn!(
                            kind = %msg.envelope.kind,
                            budget = ?limit,
                            "Handler exceeded its budget and was cancelled"
                        );
                        report.timed_out += 1;
                    }
                }
                None => handler.handle(msg).await,
            }
        }

        report
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}
