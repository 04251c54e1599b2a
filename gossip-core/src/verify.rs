//! Signature checks for routing gossip.

use lngossip_types::{ChannelAnnouncement, ChannelUpdate, NodeAnnouncement, NodeId};

/// Verifies the signatures carried by routing gossip.
///
/// The graph calls this before accepting anything, so an implementation
/// only has to answer yes or no.
pub trait SignatureVerifier: Send + Sync {
    /// All four signatures of a channel announcement.
    fn verify_channel_announcement(&self, msg: &ChannelAnnouncement) -> bool;

    /// A channel update, signed by the node at the update's end of the channel.
    fn verify_channel_update(&self, msg: &ChannelUpdate, signer: &NodeId) -> bool;

    /// A node announcement, signed by the announced node.
    fn verify_node_announcement(&self, msg: &NodeAnnouncement) -> bool;
}

/// Rejects placeholder (all-zero) signatures and accepts everything else.
///
/// Suitable when messages arrive from a source that has already checked
/// them cryptographically.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralVerifier;

impl SignatureVerifier for StructuralVerifier {
    fn verify_channel_announcement(&self, msg: &ChannelAnnouncement) -> bool {
        [
            &msg.node_signature_1,
            &msg.node_signature_2,
            &msg.bitcoin_signature_1,
            &msg.bitcoin_signature_2,
        ]
        .iter()
        .all(|sig| !sig.is_zero())
    }

    fn verify_channel_update(&self, msg: &ChannelUpdate, _signer: &NodeId) -> bool {
        !msg.signature.is_zero()
    }

    fn verify_node_announcement(&self, msg: &NodeAnnouncement) -> bool {
        !msg.signature.is_zero()
    }
}
