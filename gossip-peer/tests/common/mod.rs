//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use lngossip_peer::{GossipConfig, GossipFilter, GraphFilter, MockConnection};
use lngossip_types::{
    ChainHash, ChannelAnnouncement, ChannelUpdate, FeatureFlags, FeatureRequirement, InitFeature,
    NodeAnnouncement, NodeId, ReplyChannelRange, ShortChannelId, Signature, WireMessage,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn scid(block: u32) -> ShortChannelId {
    ShortChannelId::new(block, 7, 1)
}

pub fn node(byte: u8) -> NodeId {
    let mut bytes = [byte; 33];
    bytes[0] = 0x03;
    NodeId::from_bytes(&bytes).unwrap()
}

/// Ready connection whose remote negotiated gossip_queries.
pub fn capable_connection(id: &str) -> Arc<MockConnection> {
    Arc::new(
        MockConnection::new()
            .with_id(id)
            .with_remote_features(
                FeatureFlags::new().with(InitFeature::GossipQueries, FeatureRequirement::Optional),
            ),
    )
}

pub fn graph_filter(config: &GossipConfig) -> Arc<GraphFilter> {
    Arc::new(GraphFilter::new(ChainHash::REGTEST, &config.graph))
}

pub fn as_filter(filter: &Arc<GraphFilter>) -> Arc<dyn GossipFilter> {
    filter.clone()
}

pub fn marker(n: u8) -> WireMessage {
    WireMessage::Other {
        type_id: 18,
        payload: vec![n],
    }
}

pub fn channel_announcement(scid: ShortChannelId, a: u8, b: u8) -> WireMessage {
    WireMessage::ChannelAnnouncement(ChannelAnnouncement {
        node_signature_1: Signature::from_bytes([7u8; 64]),
        node_signature_2: Signature::from_bytes([7u8; 64]),
        bitcoin_signature_1: Signature::from_bytes([7u8; 64]),
        bitcoin_signature_2: Signature::from_bytes([7u8; 64]),
        features: vec![],
        chain_hash: ChainHash::REGTEST,
        short_channel_id: scid,
        node_id_1: node(a),
        node_id_2: node(b),
        bitcoin_key_1: node(a.wrapping_add(50)),
        bitcoin_key_2: node(b.wrapping_add(50)),
    })
}

pub fn channel_update(scid: ShortChannelId, timestamp: u32, direction: u8) -> WireMessage {
    WireMessage::ChannelUpdate(ChannelUpdate {
        signature: Signature::from_bytes([7u8; 64]),
        chain_hash: ChainHash::REGTEST,
        short_channel_id: scid,
        timestamp,
        message_flags: 1,
        channel_flags: direction,
        cltv_expiry_delta: 144,
        htlc_minimum_msat: 1,
        htlc_maximum_msat: None,
        fee_base_msat: 0,
        fee_proportional_millionths: 100,
    })
}

pub fn node_announcement(node_id: NodeId, timestamp: u32) -> WireMessage {
    WireMessage::NodeAnnouncement(NodeAnnouncement {
        signature: Signature::from_bytes([7u8; 64]),
        features: vec![],
        timestamp,
        node_id,
        rgb_color: [1, 2, 3],
        alias: [b'a'; 32],
        addresses: vec![],
    })
}

pub fn reply_range(complete: bool, scids: &[ShortChannelId]) -> WireMessage {
    WireMessage::ReplyChannelRange(ReplyChannelRange {
        chain_hash: ChainHash::REGTEST,
        first_blocknum: 0,
        number_of_blocks: u32::MAX,
        sync_complete: complete,
        short_channel_ids: scids.to_vec(),
    })
}
