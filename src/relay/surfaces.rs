//! Registered display surfaces and their subscription handles.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::protocol::SurfaceMessage;

/// Surface identifier.
pub type SurfaceId = Uuid;

/// Surfaces currently listening for pushes.
#[derive(Debug, Default)]
pub struct SurfaceTable {
    senders: Mutex<HashMap<SurfaceId, mpsc::UnboundedSender<SurfaceMessage>>>,
}

impl SurfaceTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a new surface.
    ///
    /// The surface stays registered until the returned handle is cancelled
    /// or dropped.
    pub fn register(self: &Arc<Self>) -> (Subscription, mpsc::UnboundedReceiver<SurfaceMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().insert(id, tx);

        tracing::debug!(surface = %id, "Surface registered");
        let subscription = Subscription {
            id,
            table: Arc::downgrade(self),
        };
        (subscription, rx)
    }

    /// Push `message` to every registered surface.
    ///
    /// A surface without a live listener is dropped from the table; that is
    /// the common case, not an error. Returns the number of surfaces reached.
    pub fn push(&self, message: &SurfaceMessage) -> usize {
        let mut senders = self.senders.lock();
        let mut reached = 0;
        senders.retain(|id, tx| {
            if tx.send(message.clone()).is_ok() {
                reached += 1;
                true
            } else {
                tracing::trace!(surface = %id, "Surface has no listener");
                false
            }
        });
        reached
    }

    /// Number of registered surfaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.senders.lock().len()
    }

    /// Check if no surface is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.senders.lock().is_empty()
    }

    fn unregister(&self, id: SurfaceId) {
        if self.senders.lock().remove(&id).is_some() {
            tracing::debug!(surface = %id, "Surface unregistered");
        }
    }
}

/// Cancellation handle for a surface registration.
#[derive(Debug)]
pub struct Subscription {
    id: SurfaceId,
    table: Weak<SurfaceTable>,
}

impl Subscription {
    /// The registered surface.
    #[must_use]
    pub const fn id(&self) -> SurfaceId {
        self.id
    }

    /// Unregister the surface.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            table.unregister(self.id);
        }
    }
}
