//! Message builders shared by the unit tests.

use lngossip_types::{
    ChainHash, ChannelAnnouncement, ChannelUpdate, FeatureFlags, FeatureRequirement, InitFeature,
    NodeAnnouncement, NodeId, ReplyChannelRange, ShortChannelId, Signature, WireMessage,
};

pub fn scid(block: u32) -> ShortChannelId {
    ShortChannelId::new(block, 1, 0)
}

pub fn node(byte: u8) -> NodeId {
    let mut bytes = [byte; 33];
    bytes[0] = 0x02;
    NodeId::from_bytes(&bytes).unwrap()
}

pub fn gossip_queries() -> FeatureFlags {
    FeatureFlags::new().with(InitFeature::GossipQueries, FeatureRequirement::Optional)
}

pub fn channel_announcement(scid: ShortChannelId, a: u8, b: u8) -> WireMessage {
    WireMessage::ChannelAnnouncement(ChannelAnnouncement {
        node_signature_1: Signature::from_bytes([1u8; 64]),
        node_signature_2: Signature::from_bytes([1u8; 64]),
        bitcoin_signature_1: Signature::from_bytes([1u8; 64]),
        bitcoin_signature_2: Signature::from_bytes([1u8; 64]),
        features: vec![],
        chain_hash: ChainHash::REGTEST,
        short_channel_id: scid,
        node_id_1: node(a),
        node_id_2: node(b),
        bitcoin_key_1: node(a.wrapping_add(100)),
        bitcoin_key_2: node(b.wrapping_add(100)),
    })
}

pub fn channel_update(scid: ShortChannelId, timestamp: u32, direction: u8) -> WireMessage {
    WireMessage::ChannelUpdate(ChannelUpdate {
        signature: Signature::from_bytes([1u8; 64]),
        chain_hash: ChainHash::REGTEST,
        short_channel_id: scid,
        timestamp,
        message_flags: 1,
        channel_flags: direction,
        cltv_expiry_delta: 40,
        htlc_minimum_msat: 1_000,
        htlc_maximum_msat: Some(1_000_000_000),
        fee_base_msat: 1_000,
        fee_proportional_millionths: 1,
    })
}

pub fn node_announcement(node_id: NodeId, timestamp: u32) -> WireMessage {
    WireMessage::NodeAnnouncement(NodeAnnouncement {
        signature: Signature::from_bytes([1u8; 64]),
        features: vec![],
        timestamp,
        node_id,
        rgb_color: [0, 0, 0],
        alias: [0u8; 32],
        addresses: vec![],
    })
}

pub fn reply_range(chain_hash: ChainHash, complete: bool, scids: &[ShortChannelId]) -> WireMessage {
    WireMessage::ReplyChannelRange(ReplyChannelRange {
        chain_hash,
        first_blocknum: 0,
        number_of_blocks: u32::MAX,
        sync_complete: complete,
        short_channel_ids: scids.to_vec(),
    })
}
