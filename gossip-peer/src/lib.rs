//! # gossip-peer
//!
//! Per-peer gossip layer for a Lightning node.
//!
//! Wraps a ready peer connection, routes its inbound messages through
//! gossip validation, and drives the gossip query extension.
//!
//! ## Features
//!
//! - **Ordered routing**: one inbound message at a time, outputs in arrival order
//! - **Range sync**: `query_channel_range` exchanges with timeout and cancellation
//! - **Relay**: rumor mongering gated by the remote's timestamp filter
//! - **Shared graph**: one [`GraphFilter`] validates gossip for every peer
//! - **Connection abstraction**: pluggable [`PeerConnection`] (mock included)
//!
//! ## Example
//!
//! ```ignore
//! use lngossip_peer::{GossipConfig, GossipPeer, GraphFilter};
//!
//! let config = GossipConfig::default();
//! let filter = Arc::new(GraphFilter::new(ChainHash::BITCOIN, &config.graph));
//! let (peer, mut messages) = GossipPeer::new(connection, filter, &config)?;
//!
//! // Catch up on the channel graph
//! peer.sync_range(None, None).await?;
//!
//! // Start rumor mongering
//! peer.enable_gossip().await?;
//!
//! while let Some(msg) = messages.recv().await {
//!     handle(msg?);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod connection;
pub mod error;
pub mod filter;
pub mod hub;
pub mod peer;
pub mod receiver;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use config::{ConfigError, GossipConfig, GraphConfig, PeerConfig, RelayConfig, SyncConfig};
pub use connection::{ConnectionError, MockConnection, Peer, PeerConnection, PeerState};
pub use error::GossipError;
pub use filter::{GossipFilter, GraphFilter};
pub use hub::{GossipHub, RelayedGossip};
pub use peer::{GossipMessages, GossipPeer};
pub use receiver::GossipQueriesReceiver;
pub use sync::GossipQueriesSync;
