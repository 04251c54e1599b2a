//! Routing graph state.
//!
//! Validates routing gossip against what is already known and decides what
//! is new. A channel update or node announcement can arrive before the
//! channel announcement it depends on; such messages wait in a bounded
//! pending buffer and are released, in arrival order, right after the
//! announcement that makes them valid. When the buffer is full the oldest
//! waiting message makes room for the new one.

use std::collections::{BTreeMap, HashMap, VecDeque};

use lngossip_types::{
    ChainHash, ChannelAnnouncement, ChannelUpdate, MessageType, NodeAnnouncement, NodeId,
    ShortChannelId, WireMessage,
};

use crate::error::FilterError;
use crate::verify::SignatureVerifier;

/// Default bound on messages waiting for their channel announcement.
pub const DEFAULT_MAX_PENDING: usize = 1_000;

/// What the graph did with a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// New information, emitted.
    Accepted,
    /// Already known or not newer than what is known.
    Duplicate,
    /// Waiting for a channel announcement.
    Buffered,
    /// Waiting for a channel announcement; the oldest pending message was
    /// evicted to make room.
    BufferedWithEviction,
    /// Belongs to another chain.
    OtherChain,
}

/// Result of applying one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// What happened to the message itself.
    pub disposition: Disposition,
    /// Messages that became valid, in the order they should be forwarded.
    pub messages: Vec<WireMessage>,
    /// Peer each entry of `messages` was received from, if one was given.
    pub origins: Vec<Option<String>>,
}

impl ApplyOutcome {
    fn nothing(disposition: Disposition) -> Self {
        Self {
            disposition,
            messages: Vec::new(),
            origins: Vec::new(),
        }
    }

    fn accepted(message: WireMessage, origin: Option<&str>) -> Self {
        Self {
            disposition: Disposition::Accepted,
            messages: vec![message],
            origins: vec![origin.map(str::to_string)],
        }
    }

    /// Forwardable messages paired with the peer they came from.
    pub fn tagged(&self) -> impl Iterator<Item = (Option<&str>, &WireMessage)> {
        self.origins
            .iter()
            .map(Option::as_deref)
            .zip(self.messages.iter())
    }
}

#[derive(Debug, Clone)]
struct ChannelEntry {
    node_id_1: NodeId,
    node_id_2: NodeId,
    updates: [Option<ChannelUpdate>; 2],
}

#[derive(Debug, Clone, Default)]
struct NodeEntry {
    channels: usize,
    announcement: Option<NodeAnnouncement>,
}

#[derive(Debug, Clone, PartialEq)]
enum Waiting {
    Update(ChannelUpdate),
    Node(NodeAnnouncement),
}

#[derive(Debug, Clone)]
struct Pending {
    message: Waiting,
    origin: Option<String>,
}

/// Known channels and nodes for one chain.
#[derive(Debug)]
pub struct GraphState {
    chain_hash: ChainHash,
    channels: BTreeMap<ShortChannelId, ChannelEntry>,
    nodes: HashMap<NodeId, NodeEntry>,
    /// Arrival order is preserved across updates and node announcements.
    pending: VecDeque<Pending>,
    max_pending: usize,
}

impl GraphState {
    /// Create an empty graph for `chain_hash`.
    ///
    /// The pending buffer always holds at least one message.
    pub fn new(chain_hash: ChainHash, max_pending: usize) -> Self {
        Self {
            chain_hash,
            channels: BTreeMap::new(),
            nodes: HashMap::new(),
            pending: VecDeque::new(),
            max_pending: max_pending.max(1),
        }
    }

    /// Chain this graph tracks.
    pub fn chain_hash(&self) -> ChainHash {
        self.chain_hash
    }

    /// Apply a routing gossip message.
    ///
    /// Returns [`FilterError::UnexpectedMessage`] for anything that is not
    /// routing gossip.
    pub fn apply(
        &mut self,
        msg: &WireMessage,
        verifier: &dyn SignatureVerifier,
    ) -> Result<ApplyOutcome, FilterError> {
        self.apply_from(msg, None, verifier)
    }

    /// Apply a message received from peer `origin`.
    ///
    /// The origin is kept with buffered messages so that, once released,
    /// they are still attributed to the peer that sent them.
    pub fn apply_from(
        &mut self,
        msg: &WireMessage,
        origin: Option<&str>,
        verifier: &dyn SignatureVerifier,
    ) -> Result<ApplyOutcome, FilterError> {
        match msg {
            WireMessage::ChannelAnnouncement(ann) => {
                self.apply_channel_announcement(ann, origin, verifier)
            }
            WireMessage::ChannelUpdate(upd) => self.apply_channel_update(upd, origin, verifier),
            WireMessage::NodeAnnouncement(ann) => {
                self.apply_node_announcement(ann, origin, verifier)
            }
            other => Err(FilterError::UnexpectedMessage {
                type_id: other.type_id(),
            }),
        }
    }

    fn apply_channel_announcement(
        &mut self,
        ann: &ChannelAnnouncement,
        origin: Option<&str>,
        verifier: &dyn SignatureVerifier,
    ) -> Result<ApplyOutcome, FilterError> {
        if ann.chain_hash != self.chain_hash {
            return Ok(ApplyOutcome::nothing(Disposition::OtherChain));
        }
        if ann.node_id_1 >= ann.node_id_2 {
            return Err(FilterError::Malformed {
                message: MessageType::ChannelAnnouncement,
                reason: "node ids not in ascending order".into(),
            });
        }
        if !verifier.verify_channel_announcement(ann) {
            return Err(FilterError::InvalidSignature {
                message: MessageType::ChannelAnnouncement,
            });
        }
        if self.channels.contains_key(&ann.short_channel_id) {
            return Ok(ApplyOutcome::nothing(Disposition::Duplicate));
        }

        self.channels.insert(
            ann.short_channel_id,
            ChannelEntry {
                node_id_1: ann.node_id_1,
                node_id_2: ann.node_id_2,
                updates: [None, None],
            },
        );
        self.nodes.entry(ann.node_id_1).or_default().channels += 1;
        self.nodes.entry(ann.node_id_2).or_default().channels += 1;

        let mut outcome =
            ApplyOutcome::accepted(WireMessage::ChannelAnnouncement(ann.clone()), origin);
        for (message, from) in self.release_pending(ann, verifier) {
            outcome.messages.push(message);
            outcome.origins.push(from);
        }
        Ok(outcome)
    }

    /// Replay pending messages unlocked by a new channel.
    ///
    /// Pending messages that fail validation now are dropped; they were never
    /// forwarded and the announcement itself is still good.
    fn release_pending(
        &mut self,
        ann: &ChannelAnnouncement,
        verifier: &dyn SignatureVerifier,
    ) -> Vec<(WireMessage, Option<String>)> {
        let (ready, waiting): (VecDeque<Pending>, VecDeque<Pending>) =
            self.pending.drain(..).partition(|p| match &p.message {
                Waiting::Update(upd) => upd.short_channel_id == ann.short_channel_id,
                Waiting::Node(node) => {
                    node.node_id == ann.node_id_1 || node.node_id == ann.node_id_2
                }
            });
        self.pending = waiting;

        let mut released = Vec::new();
        for Pending { message, origin } in ready {
            match message {
                Waiting::Update(upd) => {
                    if let Ok(Some(upd)) = self.accept_update(&upd, verifier) {
                        released.push((WireMessage::ChannelUpdate(upd), origin));
                    }
                }
                Waiting::Node(node) => {
                    if let Some(node) = self.accept_node(&node) {
                        released.push((WireMessage::NodeAnnouncement(node), origin));
                    }
                }
            }
        }
        released
    }

    fn apply_channel_update(
        &mut self,
        upd: &ChannelUpdate,
        origin: Option<&str>,
        verifier: &dyn SignatureVerifier,
    ) -> Result<ApplyOutcome, FilterError> {
        if upd.chain_hash != self.chain_hash {
            return Ok(ApplyOutcome::nothing(Disposition::OtherChain));
        }
        if !self.channels.contains_key(&upd.short_channel_id) {
            return Ok(self.buffer(Waiting::Update(upd.clone()), origin));
        }
        match self.accept_update(upd, verifier)? {
            Some(upd) => Ok(ApplyOutcome::accepted(WireMessage::ChannelUpdate(upd), origin)),
            None => Ok(ApplyOutcome::nothing(Disposition::Duplicate)),
        }
    }

    /// Check and store an update for a known channel. `None` if not newer.
    fn accept_update(
        &mut self,
        upd: &ChannelUpdate,
        verifier: &dyn SignatureVerifier,
    ) -> Result<Option<ChannelUpdate>, FilterError> {
        let Some(entry) = self.channels.get_mut(&upd.short_channel_id) else {
            return Ok(None);
        };
        let direction = usize::from(upd.direction());
        let signer = if direction == 0 {
            entry.node_id_1
        } else {
            entry.node_id_2
        };
        if !verifier.verify_channel_update(upd, &signer) {
            return Err(FilterError::InvalidSignature {
                message: MessageType::ChannelUpdate,
            });
        }

        let slot = &mut entry.updates[direction];
        if let Some(existing) = slot {
            if existing.timestamp >= upd.timestamp {
                return Ok(None);
            }
        }
        *slot = Some(upd.clone());
        Ok(Some(upd.clone()))
    }

    fn apply_node_announcement(
        &mut self,
        ann: &NodeAnnouncement,
        origin: Option<&str>,
        verifier: &dyn SignatureVerifier,
    ) -> Result<ApplyOutcome, FilterError> {
        if !verifier.verify_node_announcement(ann) {
            return Err(FilterError::InvalidSignature {
                message: MessageType::NodeAnnouncement,
            });
        }
        let has_channels = self
            .nodes
            .get(&ann.node_id)
            .is_some_and(|node| node.channels > 0);
        if !has_channels {
            return Ok(self.buffer(Waiting::Node(ann.clone()), origin));
        }
        match self.accept_node(ann) {
            Some(ann) => Ok(ApplyOutcome::accepted(WireMessage::NodeAnnouncement(ann), origin)),
            None => Ok(ApplyOutcome::nothing(Disposition::Duplicate)),
        }
    }

    /// Store an already verified announcement for a node with channels.
    /// `None` if not newer.
    fn accept_node(&mut self, ann: &NodeAnnouncement) -> Option<NodeAnnouncement> {
        let entry = self.nodes.get_mut(&ann.node_id)?;
        if let Some(existing) = &entry.announcement {
            if existing.timestamp >= ann.timestamp {
                return None;
            }
        }
        entry.announcement = Some(ann.clone());
        Some(ann.clone())
    }

    /// Queue a message until its channel is announced, evicting the oldest
    /// pending message when full.
    fn buffer(&mut self, message: Waiting, origin: Option<&str>) -> ApplyOutcome {
        if self.pending.iter().any(|p| p.message == message) {
            return ApplyOutcome::nothing(Disposition::Duplicate);
        }
        let mut disposition = Disposition::Buffered;
        while self.pending.len() >= self.max_pending {
            self.pending.pop_front();
            disposition = Disposition::BufferedWithEviction;
        }
        self.pending.push_back(Pending {
            message,
            origin: origin.map(str::to_string),
        });
        ApplyOutcome::nothing(disposition)
    }

    /// Number of known channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of nodes with at least one known channel.
    pub fn node_count(&self) -> usize {
        self.nodes.values().filter(|n| n.channels > 0).count()
    }

    /// Number of messages waiting for a channel announcement.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Whether a channel is known.
    pub fn has_channel(&self, scid: &ShortChannelId) -> bool {
        self.channels.contains_key(scid)
    }

    /// Latest update for one direction of a channel.
    pub fn channel_update(&self, scid: &ShortChannelId, direction: u8) -> Option<&ChannelUpdate> {
        self.channels
            .get(scid)
            .and_then(|entry| entry.updates.get(usize::from(direction & 1)))
            .and_then(Option::as_ref)
    }

    /// Latest announcement of a node.
    pub fn node_announcement(&self, node_id: &NodeId) -> Option<&NodeAnnouncement> {
        self.nodes.get(node_id).and_then(|n| n.announcement.as_ref())
    }

    /// Known channels funded in `[first_blocknum, first_blocknum + number_of_blocks)`,
    /// in ascending order.
    pub fn short_channel_ids_in_range(
        &self,
        first_blocknum: u32,
        number_of_blocks: u32,
    ) -> Vec<ShortChannelId> {
        let end = u64::from(first_blocknum) + u64::from(number_of_blocks);
        self.channels
            .keys()
            .filter(|scid| {
                let block = u64::from(scid.block());
                block >= u64::from(first_blocknum) && block < end
            })
            .copied()
            .collect()
    }
}
