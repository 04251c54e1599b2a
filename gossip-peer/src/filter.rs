//! Gossip validation.
//!
//! [`GossipFilter`] is the contract the routing loop uses for routing
//! gossip. [`GraphFilter`] implements it over an in-memory [`GraphState`]
//! shared by every peer of the node.

use async_trait::async_trait;
use lngossip_core::{
    ApplyOutcome, Disposition, FilterError, GraphState, SignatureVerifier, StructuralVerifier,
};
use lngossip_types::{ChainHash, ShortChannelId, WireMessage};
use tokio::sync::Mutex;

use crate::config::GraphConfig;
use crate::hub::RelayedGossip;

/// Validates routing gossip and decides what to forward.
#[async_trait]
pub trait GossipFilter: Send + Sync {
    /// Validate one message.
    ///
    /// Returns the messages to forward, in order. Duplicates yield an empty
    /// list. A message may release earlier ones that were waiting on it.
    async fn validate_message(&self, msg: WireMessage) -> Result<Vec<WireMessage>, FilterError>;

    /// Validate one message received from peer `origin`.
    ///
    /// Like [`validate_message`](Self::validate_message), but each message
    /// to forward carries the peer it came from. The default attributes
    /// everything to `origin`.
    async fn validate_from(
        &self,
        origin: &str,
        msg: WireMessage,
    ) -> Result<Vec<RelayedGossip>, FilterError> {
        let messages = self.validate_message(msg).await?;
        Ok(messages
            .into_iter()
            .map(|message| RelayedGossip {
                origin: origin.to_string(),
                message,
            })
            .collect())
    }
}

/// Filter backed by a shared in-memory routing graph.
///
/// Access from all peers is serialized through one lock.
pub struct GraphFilter {
    graph: Mutex<GraphState>,
    verifier: Box<dyn SignatureVerifier>,
}

impl GraphFilter {
    /// Create a filter for `chain_hash` using [`StructuralVerifier`].
    pub fn new(chain_hash: ChainHash, config: &GraphConfig) -> Self {
        Self::with_verifier(chain_hash, config, StructuralVerifier)
    }

    /// Create a filter with a custom signature verifier.
    pub fn with_verifier(
        chain_hash: ChainHash,
        config: &GraphConfig,
        verifier: impl SignatureVerifier + 'static,
    ) -> Self {
        Self {
            graph: Mutex::new(GraphState::new(chain_hash, config.max_pending)),
            verifier: Box::new(verifier),
        }
    }

    /// Number of known channels.
    pub async fn channel_count(&self) -> usize {
        self.graph.lock().await.channel_count()
    }

    /// Number of nodes with at least one known channel.
    pub async fn node_count(&self) -> usize {
        self.graph.lock().await.node_count()
    }

    /// Number of messages waiting for a channel announcement.
    pub async fn pending_count(&self) -> usize {
        self.graph.lock().await.pending_count()
    }

    /// Known channels funded in the given block range, ascending.
    pub async fn short_channel_ids_in_range(
        &self,
        first_blocknum: u32,
        number_of_blocks: u32,
    ) -> Vec<ShortChannelId> {
        self.graph
            .lock()
            .await
            .short_channel_ids_in_range(first_blocknum, number_of_blocks)
    }
}

impl std::fmt::Debug for GraphFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphFilter").finish_non_exhaustive()
    }
}

impl GraphFilter {
    async fn apply(
        &self,
        msg: &WireMessage,
        origin: Option<&str>,
    ) -> Result<ApplyOutcome, FilterError> {
        let mut graph = self.graph.lock().await;
        let outcome = graph.apply_from(msg, origin, self.verifier.as_ref())?;

        match outcome.disposition {
            Disposition::Accepted => tracing::debug!(
                "Accepted message type {}, forwarding {}",
                msg.type_id(),
                outcome.messages.len()
            ),
            Disposition::Buffered => tracing::debug!(
                "Buffered message type {} until its channel is announced (pending: {})",
                msg.type_id(),
                graph.pending_count()
            ),
            Disposition::BufferedWithEviction => tracing::warn!(
                "Pending buffer full, evicted oldest to buffer message type {}",
                msg.type_id()
            ),
            Disposition::Duplicate | Disposition::OtherChain => {}
        }

        Ok(outcome)
    }
}

#[async_trait]
impl GossipFilter for GraphFilter {
    async fn validate_message(&self, msg: WireMessage) -> Result<Vec<WireMessage>, FilterError> {
        Ok(self.apply(&msg, None).await?.messages)
    }

    async fn validate_from(
        &self,
        origin: &str,
        msg: WireMessage,
    ) -> Result<Vec<RelayedGossip>, FilterError> {
        let outcome = self.apply(&msg, Some(origin)).await?;
        Ok(outcome
            .origins
            .into_iter()
            .zip(outcome.messages)
            .map(|(from, message)| RelayedGossip {
                origin: from.unwrap_or_else(|| origin.to_string()),
                message,
            })
            .collect())
    }
}
