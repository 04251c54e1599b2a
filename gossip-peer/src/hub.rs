//! Node-wide fan-out of validated gossip.
//!
//! Every peer publishes what its filter accepted; every peer with relay
//! active forwards what others published. A peer never gets its own gossip
//! back.

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use lngossip_types::WireMessage;

use crate::receiver::GossipQueriesReceiver;

/// Gossip accepted from one peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayedGossip {
    /// Id of the peer the gossip came from.
    pub origin: String,
    /// The validated message.
    pub message: WireMessage,
}

/// Shared broadcast of validated gossip. Clones share the channel.
#[derive(Debug, Clone)]
pub struct GossipHub {
    tx: broadcast::Sender<RelayedGossip>,
}

impl GossipHub {
    /// Create a hub buffering up to `capacity` messages per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish gossip accepted from `origin`. Returns the number of subscribers.
    pub fn publish(&self, origin: &str, message: WireMessage) -> usize {
        self.tx
            .send(RelayedGossip {
                origin: origin.to_string(),
                message,
            })
            .unwrap_or(0)
    }

    /// Subscribe to everything published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayedGossip> {
        self.tx.subscribe()
    }

    /// Forward gossip from other peers into `receiver` until the hub closes
    /// or `closed` turns true.
    pub(crate) fn forward_to(
        &self,
        peer_id: String,
        receiver: GossipQueriesReceiver,
        mut closed: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        let forward = async move {
            loop {
                tokio::select! {
                    biased;
                    _ = async { closed.wait_for(|c| *c).await.is_ok() } => break,
                    received = rx.recv() => match received {
                        Ok(gossip) => {
                            if gossip.origin != peer_id {
                                receiver.relay(gossip.message);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!("Gossip hub forwarder lagged by {} messages", n);
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!("Gossip hub forwarder stopped");
        };
        tokio::spawn(forward.in_current_span())
    }
}
