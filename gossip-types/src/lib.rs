//! # gossip-types
//!
//! Wire-level types for the Lightning gossip layer.
//!
//! This crate provides the foundational types used across the gossip crates:
//! - [`ChainHash`], [`ShortChannelId`], [`NodeId`], [`Signature`] - identity types
//! - [`FeatureFlags`], [`InitFeature`] - negotiated feature bits
//! - [`WireMessage`] - the decoded messages a gossip peer sees
//! - [`WireError`] - error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod features;
mod ids;
mod messages;

pub use error::WireError;
pub use features::{FeatureFlags, FeatureRequirement, InitFeature};
pub use ids::{ChainHash, NodeId, ShortChannelId, Signature};
pub use messages::{
    ChannelAnnouncement, ChannelUpdate, GossipTimestampFilter, MessageType, NodeAnnouncement,
    QueryChannelRange, QueryShortChannelIds, ReplyChannelRange, ReplyShortChannelIdsEnd,
    WireMessage,
};
