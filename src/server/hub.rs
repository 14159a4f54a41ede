//! Broadcast hub: the connection table and the latest snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::metrics;
use crate::protocol::ServerMessage;
use crate::registry::Registry;

/// Connection identifier.
pub type ConnectionId = Uuid;

/// Encoded text frame shared by every connection.
pub type Frame = Arc<str>;

#[derive(Default)]
struct HubState {
    latest: Option<Arc<Registry>>,
    latest_frame: Option<Frame>,
    connections: HashMap<ConnectionId, mpsc::UnboundedSender<Frame>>,
}

/// Distributes registry snapshots to every open connection.
///
/// Registration and broadcast take the same lock, so a connection either
/// sees a snapshot as its baseline or receives it as a broadcast, never
/// neither. Sends never wait on a consumer; each connection drains its
/// own queue.
#[derive(Default)]
pub struct BroadcastHub {
    state: Mutex<HubState>,
    shutdown: CancellationToken,
}

impl BroadcastHub {
    /// Create an empty hub with no baseline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection.
    ///
    /// If a baseline exists it is queued as the connection's first frame.
    pub fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<Frame>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock();
        if let Some(frame) = &state.latest_frame {
            let _ = tx.send(Arc::clone(frame));
        }
        state.connections.insert(id, tx);
        set_connection_gauge(state.connections.len());

        (id, rx)
    }

    /// Unregister a connection.
    pub fn disconnect(&self, id: ConnectionId) {
        let mut state = self.state.lock();
        state.connections.remove(&id);
        set_connection_gauge(state.connections.len());
    }

    /// Record the baseline without sending it anywhere.
    ///
    /// Connections opened from now on receive it on connect.
    pub fn publish_baseline(&self, registry: Arc<Registry>) {
        let Some(frame) = encode(&registry) else {
            return;
        };

        let mut state = self.state.lock();
        state.latest = Some(registry);
        state.latest_frame = Some(frame);
    }

    /// Send a full snapshot to every open connection.
    ///
    /// Closed connections are pruned and skipped. Returns the number of
    /// connections the frame was queued for.
    pub fn broadcast(&self, registry: Arc<Registry>) -> usize {
        let Some(frame) = encode(&registry) else {
            return 0;
        };

        let mut state = self.state.lock();
        state.latest = Some(Arc::clone(&registry));
        state.latest_frame = Some(Arc::clone(&frame));

        let mut delivered = 0;
        state.connections.retain(|id, tx| {
            if tx.send(Arc::clone(&frame)).is_ok() {
                delivered += 1;
                true
            } else {
                tracing::debug!(connection = %id, "Skipping closed connection");
                false
            }
        });
        set_connection_gauge(state.connections.len());
        metrics::BROADCASTS_TOTAL.inc();

        tracing::info!(
            classes = registry.classes.len(),
            files = registry.files.len(),
            consumers = delivered,
            "Broadcast registry"
        );
        delivered
    }

    /// The most recent snapshot, baseline or broadcast.
    #[must_use]
    pub fn latest(&self) -> Option<Arc<Registry>> {
        self.state.lock().latest.clone()
    }

    /// Number of open connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Token cancelled when the hub closes.
    #[must_use]
    pub fn closed(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Ask every connection task to finish.
    pub fn close(&self) {
        self.shutdown.cancel();
    }
}

#[allow(clippy::cast_possible_wrap)]
fn set_connection_gauge(open: usize) {
    metrics::CONNECTIONS.set(open as i64);
}

fn encode(registry: &Arc<Registry>) -> Option<Frame> {
    match ServerMessage::update(Arc::clone(registry)).encode() {
        Ok(text) => Some(Frame::from(text)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode registry");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn registry(classes: &[&str]) -> Arc<Registry> {
        Arc::new(Registry {
            last_updated: Some(Utc::now()),
            classes: classes.iter().map(|c| (*c).to_string()).collect(),
            files: Vec::new(),
        })
    }

    fn decode(frame: &Frame) -> Arc<Registry> {
        ServerMessage::decode(frame).unwrap().into_registry()
    }

    #[test]
    fn test_connect_before_baseline_gets_nothing() {
        let hub = BroadcastHub::new();
        let (_id, mut rx) = hub.connect();
        assert!(rx.try_recv().is_err());
        assert!(hub.latest().is_none());
    }

    #[test]
    fn test_connect_after_baseline_gets_baseline_first() {
        let hub = BroadcastHub::new();
        let baseline = registry(&["a", "b"]);
        hub.publish_baseline(Arc::clone(&baseline));

        let (_id, mut rx) = hub.connect();
        let first = decode(&rx.try_recv().unwrap());
        assert_eq!(*first, *baseline);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_publish_baseline_does_not_broadcast() {
        let hub = BroadcastHub::new();
        let (_id, mut rx) = hub.connect();
        hub.publish_baseline(registry(&["a"]));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_reaches_every_connection_once() {
        let hub = BroadcastHub::new();
        hub.publish_baseline(registry(&["a"]));
        let (_a, mut rx_a) = hub.connect();
        let (_b, mut rx_b) = hub.connect();
        let _ = rx_a.try_recv();
        let _ = rx_b.try_recv();

        let next = registry(&["a", "c"]);
        assert_eq!(hub.broadcast(Arc::clone(&next)), 2);

        for rx in [&mut rx_a, &mut rx_b] {
            assert_eq!(*decode(&rx.try_recv().unwrap()), *next);
            assert!(rx.try_recv().is_err());
        }
        assert_eq!(*hub.latest().unwrap(), *next);
    }

    #[test]
    fn test_broadcast_skips_closed_connections() {
        let hub = BroadcastHub::new();
        let (_gone, rx_gone) = hub.connect();
        let (_live, mut rx_live) = hub.connect();
        drop(rx_gone);

        assert_eq!(hub.broadcast(registry(&["x"])), 1);
        assert_eq!(hub.connection_count(), 1);
        assert!(rx_live.try_recv().is_ok());
    }

    #[test]
    fn test_disconnect() {
        let hub = BroadcastHub::new();
        let (id, _rx) = hub.connect();
        assert_eq!(hub.connection_count(), 1);
        hub.disconnect(id);
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn test_close_cancels_token() {
        let hub = BroadcastHub::new();
        let token = hub.closed();
        assert!(!token.is_cancelled());
        hub.close();
        assert!(token.is_cancelled());
    }
}
