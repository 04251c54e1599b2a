//! Peer connection contract.
//!
//! The gossip layer sits on top of an authenticated, handshaken connection
//! owned by the transport. This module defines what it needs from that
//! connection:
//! - [`Peer`] is the send/disconnect capability shared by a raw connection
//!   and by [`GossipPeer`](crate::GossipPeer), which wraps one.
//! - [`PeerConnection`] adds lifecycle state, negotiated features, local
//!   chains and the ordered inbound message source.
//!
//! # Example
//!
//! ```ignore
//! let connection = Arc::new(MockConnection::new());
//! let mut inbound = connection.subscribe()?;
//! connection.send_message(&msg).await?;
//! ```

mod mock;

pub use mock::MockConnection;

use async_trait::async_trait;
use lngossip_types::{ChainHash, FeatureFlags, WireError, WireMessage};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

/// Lifecycle of a peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Transport connecting.
    Connecting,
    /// Noise/init handshake in progress.
    Handshaking,
    /// Handshake done, features negotiated.
    Ready,
    /// Connection gone.
    Closed,
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PeerState::Connecting => "connecting",
            PeerState::Handshaking => "handshaking",
            PeerState::Ready => "ready",
            PeerState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Connection errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// Connection is not in the Ready state.
    #[error("connection not ready (state: {state})")]
    NotReady {
        /// State the connection was in.
        state: PeerState,
    },

    /// Connection closed.
    #[error("connection closed")]
    Closed,

    /// The inbound message source was already taken.
    #[error("inbound messages already subscribed")]
    AlreadySubscribed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Message could not be encoded.
    #[error("encode failed: {0}")]
    Encode(#[from] WireError),
}

/// Send and disconnect capability of a peer.
#[async_trait]
pub trait Peer: Send + Sync {
    /// Send raw message bytes.
    async fn send(&self, bytes: &[u8]) -> Result<(), ConnectionError>;

    /// Send a decoded message.
    async fn send_message(&self, msg: &WireMessage) -> Result<(), ConnectionError>;

    /// Close the connection.
    async fn disconnect(&self) -> Result<(), ConnectionError>;
}

/// A ready, authenticated connection to a remote node.
pub trait PeerConnection: Peer {
    /// Stable identifier used in logs.
    fn id(&self) -> String;

    /// Current lifecycle state.
    fn state(&self) -> PeerState;

    /// Features we advertised.
    fn local_features(&self) -> FeatureFlags;

    /// Features the remote advertised.
    fn remote_features(&self) -> FeatureFlags;

    /// Chains we support, preferred first.
    fn local_chains(&self) -> Vec<ChainHash>;

    /// Take the ordered inbound message source.
    ///
    /// May be called once. The channel closing is the connection's close
    /// signal.
    fn subscribe(&self) -> Result<mpsc::Receiver<WireMessage>, ConnectionError>;
}
