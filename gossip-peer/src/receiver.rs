//! Passive relay (rumor mongering) for one peer.
//!
//! While active, gossip validated elsewhere in the node is queued for this
//! peer and sent by a drain task in queue order. Toggling relay also tells
//! the remote, via `gossip_timestamp_filter`, whether we want its gossip.
//!
//! Deactivation only affects messages offered after the call. Anything
//! already queued is still delivered.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use lngossip_core::RelayState;
use lngossip_types::{ChainHash, GossipTimestampFilter, WireMessage};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::connection::{ConnectionError, Peer};

struct ReceiverInner {
    peer: Arc<dyn Peer>,
    state: Mutex<RelayState>,
    queue: mpsc::Sender<WireMessage>,
}

/// Relay state for one peer. Clones share state.
#[derive(Clone)]
pub struct GossipQueriesReceiver {
    inner: Arc<ReceiverInner>,
}

impl GossipQueriesReceiver {
    /// Create an inactive receiver and spawn its drain task.
    ///
    /// The drain task ends once every clone of the receiver is dropped.
    pub fn spawn(
        chain_hash: ChainHash,
        peer: Arc<dyn Peer>,
        queue_size: usize,
    ) -> (Self, JoinHandle<()>) {
        let (queue, rx) = mpsc::channel(queue_size.max(1));
        let drain = tokio::spawn(drain(Arc::clone(&peer), rx).in_current_span());
        let receiver = Self {
            inner: Arc::new(ReceiverInner {
                peer,
                state: Mutex::new(RelayState::new(chain_hash)),
                queue,
            }),
        };
        (receiver, drain)
    }

    fn state(&self) -> MutexGuard<'_, RelayState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start relaying, and ask the remote to relay to us.
    ///
    /// No-op if already active.
    pub async fn activate(&self) -> Result<(), ConnectionError> {
        let filter = {
            let mut state = self.state();
            if !state.activate() {
                return Ok(());
            }
            state.activation_filter(unix_now())
        };
        tracing::info!("Gossip relay activated");
        self.send_filter(filter).await
    }

    /// Stop relaying, and ask the remote to stop relaying to us.
    ///
    /// No-op if already inactive.
    pub async fn deactivate(&self) -> Result<(), ConnectionError> {
        let filter = {
            let mut state = self.state();
            if !state.deactivate() {
                return Ok(());
            }
            state.deactivation_filter()
        };
        tracing::info!("Gossip relay deactivated");
        self.send_filter(filter).await
    }

    async fn send_filter(&self, filter: GossipTimestampFilter) -> Result<(), ConnectionError> {
        self.inner
            .peer
            .send_message(&WireMessage::GossipTimestampFilter(filter))
            .await
    }

    /// Whether relay is active.
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Record the remote's `gossip_timestamp_filter`.
    pub fn set_remote_filter(&self, filter: &GossipTimestampFilter) -> bool {
        let applied = self.state().apply_remote_filter(filter);
        if applied {
            tracing::debug!(
                "Remote timestamp filter: first={}, range={}",
                filter.first_timestamp,
                filter.timestamp_range
            );
        }
        applied
    }

    /// The remote's last `gossip_timestamp_filter`.
    pub fn remote_filter(&self) -> Option<GossipTimestampFilter> {
        self.state().remote_filter().cloned()
    }

    /// Offer validated gossip for relay. Returns whether it was queued.
    pub fn relay(&self, msg: WireMessage) -> bool {
        if !self.state().admits(&msg) {
            return false;
        }
        match self.inner.queue.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(msg)) => {
                tracing::warn!("Relay queue full, dropping message type {}", msg.type_id());
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

impl std::fmt::Debug for GossipQueriesReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GossipQueriesReceiver")
            .field("active", &self.is_active())
            .finish()
    }
}

async fn drain(peer: Arc<dyn Peer>, mut rx: mpsc::Receiver<WireMessage>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = peer.send_message(&msg).await {
            tracing::warn!("Relay send failed, stopping relay: {}", e);
            break;
        }
    }
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MockConnection;
    use crate::test_support::{node, node_announcement};

    fn receiver(connection: &MockConnection, queue_size: usize) -> GossipQueriesReceiver {
        let (receiver, _drain) = GossipQueriesReceiver::spawn(
            ChainHash::REGTEST,
            Arc::new(connection.clone()),
            queue_size,
        );
        receiver
    }

    fn timestamp_filter(first: u32, range: u32) -> GossipTimestampFilter {
        GossipTimestampFilter {
            chain_hash: ChainHash::REGTEST,
            first_timestamp: first,
            timestamp_range: range,
        }
    }

    // ===========================================
    // Activation
    // ===========================================

    #[tokio::test]
    async fn activate_sends_open_filter_once() {
        let connection = MockConnection::new();
        let receiver = receiver(&connection, 8);

        receiver.activate().await.unwrap();
        receiver.activate().await.unwrap();

        let sent = connection.sent_messages();
        assert_eq!(sent.len(), 1);
        let WireMessage::GossipTimestampFilter(filter) = &sent[0] else {
            panic!("expected GossipTimestampFilter");
        };
        assert_eq!(filter.timestamp_range, u32::MAX);
        assert!(receiver.is_active());
    }

    #[tokio::test]
    async fn deactivate_sends_closed_filter_once() {
        let connection = MockConnection::new();
        let receiver = receiver(&connection, 8);

        receiver.deactivate().await.unwrap();
        assert!(connection.sent_messages().is_empty());

        receiver.activate().await.unwrap();
        receiver.deactivate().await.unwrap();
        receiver.deactivate().await.unwrap();

        let sent = connection.sent_messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(
            sent[1],
            WireMessage::GossipTimestampFilter(timestamp_filter(u32::MAX, 0))
        );
    }

    // ===========================================
    // Relay
    // ===========================================

    #[tokio::test]
    async fn inactive_receiver_relays_nothing() {
        let connection = MockConnection::new();
        let receiver = receiver(&connection, 8);

        assert!(!receiver.relay(node_announcement(node(1), 10)));
    }

    #[tokio::test]
    async fn active_receiver_relays_in_order() {
        let connection = MockConnection::new();
        let receiver = receiver(&connection, 8);
        receiver.activate().await.unwrap();

        assert!(receiver.relay(node_announcement(node(1), 10)));
        assert!(receiver.relay(node_announcement(node(2), 11)));

        let sent = connection.wait_for_sent(3).await;
        assert_eq!(sent[1], node_announcement(node(1), 10));
        assert_eq!(sent[2], node_announcement(node(2), 11));
    }

    #[tokio::test]
    async fn remote_filter_is_honored() {
        let connection = MockConnection::new();
        let receiver = receiver(&connection, 8);
        receiver.activate().await.unwrap();

        assert!(receiver.set_remote_filter(&timestamp_filter(100, 100)));

        assert!(!receiver.relay(node_announcement(node(1), 50)));
        assert!(receiver.relay(node_announcement(node(1), 150)));
        assert_eq!(receiver.remote_filter(), Some(timestamp_filter(100, 100)));
    }

    #[tokio::test]
    async fn deactivation_keeps_already_queued_messages() {
        let connection = MockConnection::new();
        let receiver = receiver(&connection, 8);
        receiver.activate().await.unwrap();

        assert!(receiver.relay(node_announcement(node(1), 10)));
        receiver.deactivate().await.unwrap();
        assert!(!receiver.relay(node_announcement(node(2), 11)));

        // activate filter, deactivate filter, and the queued announcement
        let sent = connection.wait_for_sent(3).await;
        assert!(sent.contains(&node_announcement(node(1), 10)));
        assert!(!sent.contains(&node_announcement(node(2), 11)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn full_queue_drops_gossip() {
        let connection = MockConnection::new();
        let receiver = receiver(&connection, 1);
        receiver.activate().await.unwrap();

        // The drain task has not run yet on this single-threaded runtime
        assert!(receiver.relay(node_announcement(node(1), 10)));
        assert!(!receiver.relay(node_announcement(node(2), 11)));
    }
}
