//! Gossip protocol messages.
//!
//! Field layouts follow BOLT 7. Only the fields the gossip layer reads are
//! interpreted; the rest are carried so validated messages can be relayed
//! unchanged.

use serde::{Deserialize, Serialize};

use crate::{ChainHash, NodeId, ShortChannelId, Signature, WireError};

/// Message type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageType {
    /// Announces a new public channel
    ChannelAnnouncement = 256,
    /// Announces node metadata
    NodeAnnouncement = 257,
    /// Per-direction channel policy
    ChannelUpdate = 258,
    /// Request announcements/updates for specific channels
    QueryShortChannelIds = 261,
    /// End of a short-channel-id query response
    ReplyShortChannelIdsEnd = 262,
    /// Request the channels in a block range
    QueryChannelRange = 263,
    /// (Partial) answer to a channel range query
    ReplyChannelRange = 264,
    /// Limit relayed gossip to a timestamp window
    GossipTimestampFilter = 265,
}

impl TryFrom<u16> for MessageType {
    type Error = WireError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            256 => Ok(MessageType::ChannelAnnouncement),
            257 => Ok(MessageType::NodeAnnouncement),
            258 => Ok(MessageType::ChannelUpdate),
            261 => Ok(MessageType::QueryShortChannelIds),
            262 => Ok(MessageType::ReplyShortChannelIdsEnd),
            263 => Ok(MessageType::QueryChannelRange),
            264 => Ok(MessageType::ReplyChannelRange),
            265 => Ok(MessageType::GossipTimestampFilter),
            _ => Err(WireError::InvalidMessageType(value)),
        }
    }
}

/// All messages a gossip peer can see on its inbound stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WireMessage {
    /// Public channel announcement
    ChannelAnnouncement(ChannelAnnouncement),
    /// Channel policy update
    ChannelUpdate(ChannelUpdate),
    /// Node metadata announcement
    NodeAnnouncement(NodeAnnouncement),
    /// Range query
    QueryChannelRange(QueryChannelRange),
    /// Range reply
    ReplyChannelRange(ReplyChannelRange),
    /// Channel id query
    QueryShortChannelIds(QueryShortChannelIds),
    /// End of channel id reply
    ReplyShortChannelIdsEnd(ReplyShortChannelIdsEnd),
    /// Timestamp filter
    GossipTimestampFilter(GossipTimestampFilter),
    /// Any message the gossip layer does not interpret (init, ping, channel
    /// messages, ...)
    Other {
        /// Raw message type
        type_id: u16,
        /// Undecoded body
        payload: Vec<u8>,
    },
}

impl WireMessage {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WireError> {
        rmp_serde::to_vec(self).map_err(WireError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        rmp_serde::from_slice(bytes).map_err(WireError::Deserialization)
    }

    /// Raw message type code.
    pub fn type_id(&self) -> u16 {
        match self {
            WireMessage::ChannelAnnouncement(_) => MessageType::ChannelAnnouncement as u16,
            WireMessage::ChannelUpdate(_) => MessageType::ChannelUpdate as u16,
            WireMessage::NodeAnnouncement(_) => MessageType::NodeAnnouncement as u16,
            WireMessage::QueryChannelRange(_) => MessageType::QueryChannelRange as u16,
            WireMessage::ReplyChannelRange(_) => MessageType::ReplyChannelRange as u16,
            WireMessage::QueryShortChannelIds(_) => MessageType::QueryShortChannelIds as u16,
            WireMessage::ReplyShortChannelIdsEnd(_) => {
                MessageType::ReplyShortChannelIdsEnd as u16
            }
            WireMessage::GossipTimestampFilter(_) => MessageType::GossipTimestampFilter as u16,
            WireMessage::Other { type_id, .. } => *type_id,
        }
    }

    /// True for the three messages that describe the channel graph and must
    /// be validated before they are passed on.
    pub fn is_routing_gossip(&self) -> bool {
        matches!(
            self,
            WireMessage::ChannelAnnouncement(_)
                | WireMessage::ChannelUpdate(_)
                | WireMessage::NodeAnnouncement(_)
        )
    }

    /// Chain the message pertains to. Node announcements carry no chain hash.
    pub fn chain_hash(&self) -> Option<ChainHash> {
        match self {
            WireMessage::ChannelAnnouncement(m) => Some(m.chain_hash),
            WireMessage::ChannelUpdate(m) => Some(m.chain_hash),
            WireMessage::QueryChannelRange(m) => Some(m.chain_hash),
            WireMessage::ReplyChannelRange(m) => Some(m.chain_hash),
            WireMessage::QueryShortChannelIds(m) => Some(m.chain_hash),
            WireMessage::ReplyShortChannelIdsEnd(m) => Some(m.chain_hash),
            WireMessage::GossipTimestampFilter(m) => Some(m.chain_hash),
            WireMessage::NodeAnnouncement(_) | WireMessage::Other { .. } => None,
        }
    }

    /// Gossip timestamp, for messages that carry one.
    pub fn timestamp(&self) -> Option<u32> {
        match self {
            WireMessage::ChannelUpdate(m) => Some(m.timestamp),
            WireMessage::NodeAnnouncement(m) => Some(m.timestamp),
            _ => None,
        }
    }
}

/// Proves the existence of a channel between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAnnouncement {
    /// Signature by `node_id_1`
    pub node_signature_1: Signature,
    /// Signature by `node_id_2`
    pub node_signature_2: Signature,
    /// Signature by `bitcoin_key_1`
    pub bitcoin_signature_1: Signature,
    /// Signature by `bitcoin_key_2`
    pub bitcoin_signature_2: Signature,
    /// Channel feature bits
    pub features: Vec<u8>,
    /// Chain the channel lives on
    pub chain_hash: ChainHash,
    /// Funding output location
    pub short_channel_id: ShortChannelId,
    /// Lexicographically lesser node
    pub node_id_1: NodeId,
    /// Lexicographically greater node
    pub node_id_2: NodeId,
    /// Funding key of node 1
    pub bitcoin_key_1: NodeId,
    /// Funding key of node 2
    pub bitcoin_key_2: NodeId,
}

/// Policy for one direction of a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelUpdate {
    /// Signature by the originating node
    pub signature: Signature,
    /// Chain the channel lives on
    pub chain_hash: ChainHash,
    /// Channel being updated
    pub short_channel_id: ShortChannelId,
    /// Seconds since epoch; newer replaces older
    pub timestamp: u32,
    /// Bit 0: `htlc_maximum_msat` present
    pub message_flags: u8,
    /// Bit 0: direction, bit 1: disabled
    pub channel_flags: u8,
    /// Blocks added to the HTLC expiry
    pub cltv_expiry_delta: u16,
    /// Smallest HTLC accepted
    pub htlc_minimum_msat: u64,
    /// Largest HTLC accepted, when advertised
    pub htlc_maximum_msat: Option<u64>,
    /// Flat fee
    pub fee_base_msat: u32,
    /// Proportional fee
    pub fee_proportional_millionths: u32,
}

impl ChannelUpdate {
    /// 0 when sent by `node_id_1`, 1 when sent by `node_id_2`.
    pub fn direction(&self) -> u8 {
        self.channel_flags & 0x01
    }

    /// Whether the originating node disabled the channel.
    pub fn is_disabled(&self) -> bool {
        self.channel_flags & 0x02 != 0
    }
}

/// Node metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAnnouncement {
    /// Signature by `node_id`
    pub signature: Signature,
    /// Node feature bits
    pub features: Vec<u8>,
    /// Seconds since epoch; newer replaces older
    pub timestamp: u32,
    /// Announced node
    pub node_id: NodeId,
    /// Display color
    pub rgb_color: [u8; 3],
    /// Display alias, zero padded
    pub alias: [u8; 32],
    /// Encoded address descriptors
    pub addresses: Vec<u8>,
}

/// Ask for every channel whose funding block falls in a range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryChannelRange {
    /// Chain being queried
    pub chain_hash: ChainHash,
    /// First block of the range
    pub first_blocknum: u32,
    /// Number of blocks in the range
    pub number_of_blocks: u32,
}

impl QueryChannelRange {
    /// One past the last block of the range, saturating at `u32::MAX`.
    pub fn end_blocknum(&self) -> u32 {
        self.first_blocknum.saturating_add(self.number_of_blocks)
    }
}

/// One fragment of the answer to a [`QueryChannelRange`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyChannelRange {
    /// Chain being answered
    pub chain_hash: ChainHash,
    /// First block covered by this fragment
    pub first_blocknum: u32,
    /// Blocks covered by this fragment
    pub number_of_blocks: u32,
    /// Set on the final fragment
    pub sync_complete: bool,
    /// Channels funded in the covered blocks
    pub short_channel_ids: Vec<ShortChannelId>,
}

/// Ask for the announcements and updates of specific channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryShortChannelIds {
    /// Chain being queried
    pub chain_hash: ChainHash,
    /// Channels wanted
    pub short_channel_ids: Vec<ShortChannelId>,
}

/// Marks the end of the answer to a [`QueryShortChannelIds`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyShortChannelIdsEnd {
    /// Chain being answered
    pub chain_hash: ChainHash,
    /// False if the responder lacks information for the chain
    pub full_information: bool,
}

/// Restricts relayed gossip to a window of timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipTimestampFilter {
    /// Chain the filter applies to
    pub chain_hash: ChainHash,
    /// Earliest timestamp wanted
    pub first_timestamp: u32,
    /// Window width in seconds
    pub timestamp_range: u32,
}

impl GossipTimestampFilter {
    /// True if `timestamp` falls in `[first_timestamp, first_timestamp + timestamp_range)`.
    pub fn admits(&self, timestamp: u32) -> bool {
        let start = self.first_timestamp as u64;
        let end = start + self.timestamp_range as u64;
        (timestamp as u64) >= start && (timestamp as u64) < end
    }
}
