//! Gossip peer: the per-connection gossip layer.
//!
//! A [`GossipPeer`] wraps a Ready [`PeerConnection`] and takes over its
//! inbound message stream. A routing task handles one message at a time,
//! in arrival order:
//!
//! 1. The active range sync (if any) sees every message.
//! 2. A remote `gossip_timestamp_filter` is recorded for relay.
//! 3. Routing gossip goes through the [`GossipFilter`]; every message it
//!    returns is emitted in order and published to the hub. A filter error
//!    is emitted once and ends the stream.
//! 4. Anything else is emitted unchanged.
//!
//! When the routing task ends, any running sync is cancelled, later syncs
//! are refused, relay from the hub stops and the close signal fires.

use std::sync::Arc;

use async_trait::async_trait;
use lngossip_core::RangeReplies;
use lngossip_types::{ChainHash, InitFeature, WireMessage};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::GossipConfig;
use crate::connection::{ConnectionError, Peer, PeerConnection, PeerState};
use crate::error::GossipError;
use crate::filter::GossipFilter;
use crate::hub::GossipHub;
use crate::receiver::GossipQueriesReceiver;
use crate::sync::GossipQueriesSync;

/// Output of a gossip peer: messages in order, ending with at most one error.
pub type GossipMessages = mpsc::Receiver<Result<WireMessage, GossipError>>;

/// Gossip layer over one peer connection.
///
/// Dropping the peer stops its background tasks.
pub struct GossipPeer<C: PeerConnection + 'static> {
    connection: Arc<C>,
    id: String,
    chain_hash: ChainHash,
    gossip_queries: bool,
    sync: GossipQueriesSync,
    receiver: Option<GossipQueriesReceiver>,
    closed: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl<C: PeerConnection + 'static> GossipPeer<C> {
    /// Wrap a Ready connection.
    ///
    /// Must be called inside a tokio runtime. Fails without touching the
    /// connection if it is not Ready.
    pub fn new(
        connection: Arc<C>,
        filter: Arc<dyn GossipFilter>,
        config: &GossipConfig,
    ) -> Result<(Self, GossipMessages), GossipError> {
        Self::build(connection, filter, None, config)
    }

    /// Wrap a Ready connection and join a node-wide [`GossipHub`].
    ///
    /// Accepted gossip is published to the hub; gossip published by other
    /// peers is relayed to this one while relay is enabled.
    pub fn with_hub(
        connection: Arc<C>,
        filter: Arc<dyn GossipFilter>,
        hub: GossipHub,
        config: &GossipConfig,
    ) -> Result<(Self, GossipMessages), GossipError> {
        Self::build(connection, filter, Some(hub), config)
    }

    fn build(
        connection: Arc<C>,
        filter: Arc<dyn GossipFilter>,
        hub: Option<GossipHub>,
        config: &GossipConfig,
    ) -> Result<(Self, GossipMessages), GossipError> {
        let state = connection.state();
        if state != PeerState::Ready {
            return Err(GossipError::PeerNotReady { state });
        }
        let chain_hash = connection
            .local_chains()
            .first()
            .copied()
            .ok_or(GossipError::NoLocalChain)?;
        let inbound = connection.subscribe()?;

        let id = connection.id();
        let gossip_queries = connection
            .remote_features()
            .supports(InitFeature::GossipQueries);
        let span = tracing::info_span!("gspeer", peer = %id);
        let handle: Arc<dyn Peer> = connection.clone();

        let sync = GossipQueriesSync::new(chain_hash, Arc::clone(&handle), config.sync.clone());
        let mut tasks = Vec::new();

        let receiver = if gossip_queries {
            let _entered = span.enter();
            let (receiver, drain) =
                GossipQueriesReceiver::spawn(chain_hash, handle, config.relay.queue_size);
            tasks.push(drain);
            Some(receiver)
        } else {
            None
        };

        let (closed_tx, closed) = watch::channel(false);

        if let (Some(hub), Some(receiver)) = (&hub, &receiver) {
            let _entered = span.enter();
            tasks.push(hub.forward_to(id.clone(), receiver.clone(), closed.clone()));
        }

        let (output, messages) = mpsc::channel(config.peer.output_buffer.max(1));

        let routing = RoutingLoop {
            inbound,
            output,
            filter,
            sync: sync.clone(),
            receiver: receiver.clone(),
            hub,
            peer_id: id.clone(),
            closed: closed_tx,
        };
        tasks.push(tokio::spawn(routing.run().instrument(span.clone())));

        span.in_scope(|| {
            tracing::info!(
                "Gossip peer ready (chain: {}, gossip_queries: {})",
                chain_hash,
                gossip_queries
            )
        });

        Ok((
            Self {
                connection,
                id,
                chain_hash,
                gossip_queries,
                sync,
                receiver,
                closed,
                tasks,
            },
            messages,
        ))
    }

    /// Whether the remote negotiated `gossip_queries`.
    pub fn gossip_queries(&self) -> bool {
        self.gossip_queries
    }

    /// Peer id used in logs and hub origins.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Chain this peer gossips about.
    pub fn chain_hash(&self) -> ChainHash {
        self.chain_hash
    }

    /// The wrapped connection.
    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    /// Relay state, present only with `gossip_queries`.
    pub fn receiver(&self) -> Option<&GossipQueriesReceiver> {
        self.receiver.as_ref()
    }

    /// Sync a block range with the peer.
    ///
    /// Returns `Ok(false)` without sending anything if the peer lacks
    /// `gossip_queries`, and `Ok(true)` once the complete answer arrived.
    pub async fn sync_range(
        &self,
        first_block: Option<u32>,
        num_blocks: Option<u32>,
    ) -> Result<bool, GossipError> {
        Ok(self.fetch_range(first_block, num_blocks).await?.is_some())
    }

    /// Like [`sync_range`](Self::sync_range), returning what the peer reported.
    ///
    /// Fails with `SyncCancelled` without sending anything once routing has
    /// stopped.
    pub async fn fetch_range(
        &self,
        first_block: Option<u32>,
        num_blocks: Option<u32>,
    ) -> Result<Option<RangeReplies>, GossipError> {
        if !self.gossip_queries {
            tracing::debug!("Range sync skipped: peer lacks gossip_queries");
            return Ok(None);
        }
        let replies = self
            .sync
            .query_range(first_block, num_blocks)
            .instrument(tracing::info_span!("gspeer", peer = %self.id))
            .await?;
        Ok(Some(replies))
    }

    /// Whether a range sync is running.
    pub fn sync_in_progress(&self) -> bool {
        self.sync.is_active()
    }

    /// Cancel the running range sync. Returns whether one was running.
    pub fn cancel_sync(&self) -> bool {
        self.sync.cancel("cancelled")
    }

    /// Start relaying gossip to the peer. No-op without `gossip_queries`.
    pub async fn enable_gossip(&self) -> Result<(), GossipError> {
        if let Some(receiver) = &self.receiver {
            receiver.activate().await?;
        }
        Ok(())
    }

    /// Stop relaying gossip to the peer. No-op without `gossip_queries`.
    pub async fn disable_gossip(&self) -> Result<(), GossipError> {
        if let Some(receiver) = &self.receiver {
            receiver.deactivate().await?;
        }
        Ok(())
    }

    /// Offer validated gossip for relay to this peer.
    pub fn relay(&self, msg: WireMessage) -> bool {
        self.receiver
            .as_ref()
            .map(|receiver| receiver.relay(msg))
            .unwrap_or(false)
    }

    /// Close notification; becomes `true` when routing stops.
    pub fn closed(&self) -> watch::Receiver<bool> {
        self.closed.clone()
    }

    /// Whether routing has stopped.
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

#[async_trait]
impl<C: PeerConnection + 'static> Peer for GossipPeer<C> {
    async fn send(&self, bytes: &[u8]) -> Result<(), ConnectionError> {
        self.connection.send(bytes).await
    }

    async fn send_message(&self, msg: &WireMessage) -> Result<(), ConnectionError> {
        self.connection.send_message(msg).await
    }

    async fn disconnect(&self) -> Result<(), ConnectionError> {
        self.sync.cancel("disconnected");
        self.connection.disconnect().await
    }
}

impl<C: PeerConnection + 'static> Drop for GossipPeer<C> {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl<C: PeerConnection + 'static> std::fmt::Debug for GossipPeer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GossipPeer")
            .field("id", &self.id)
            .field("chain_hash", &self.chain_hash)
            .field("gossip_queries", &self.gossip_queries)
            .finish_non_exhaustive()
    }
}

struct RoutingLoop {
    inbound: mpsc::Receiver<WireMessage>,
    output: mpsc::Sender<Result<WireMessage, GossipError>>,
    filter: Arc<dyn GossipFilter>,
    sync: GossipQueriesSync,
    receiver: Option<GossipQueriesReceiver>,
    hub: Option<GossipHub>,
    peer_id: String,
    closed: watch::Sender<bool>,
}

impl RoutingLoop {
    async fn run(mut self) {
        while let Some(msg) = self.inbound.recv().await {
            if !self.route(msg).await {
                break;
            }
        }
        if self.sync.close("connection closed") {
            tracing::debug!("Cancelled range sync on close");
        }
        self.closed.send_replace(true);
        tracing::info!("Gossip peer closed");
    }

    /// Handle one message. Returns false when routing must stop.
    async fn route(&self, msg: WireMessage) -> bool {
        self.sync.handle_wire_message(&msg);

        if let (WireMessage::GossipTimestampFilter(filter), Some(receiver)) =
            (&msg, &self.receiver)
        {
            receiver.set_remote_filter(filter);
        }

        if !msg.is_routing_gossip() {
            self.emit(Ok(msg)).await;
            return true;
        }

        match self.filter.validate_from(&self.peer_id, msg).await {
            Ok(validated) => {
                for gossip in validated {
                    if let Some(hub) = &self.hub {
                        hub.publish(&gossip.origin, gossip.message.clone());
                    }
                    self.emit(Ok(gossip.message)).await;
                }
                true
            }
            Err(e) => {
                tracing::warn!("Gossip rejected, stopping: {}", e);
                self.emit(Err(e.into())).await;
                false
            }
        }
    }

    async fn emit(&self, item: Result<WireMessage, GossipError>) {
        // Routing continues without a consumer so sync replies still land
        if self.output.send(item).await.is_err() {
            tracing::debug!("Gossip output dropped by consumer");
        }
    }
}
