//! Error types for the gossip peer.

use crate::connection::{ConnectionError, PeerState};
use lngossip_core::FilterError;
use std::time::Duration;
use thiserror::Error;

/// Errors from gossip peer operations.
#[derive(Debug, Error)]
pub enum GossipError {
    /// The connection was not Ready at construction.
    #[error("peer not ready (state: {state})")]
    PeerNotReady {
        /// State the connection was in.
        state: PeerState,
    },

    /// The connection advertises no chain.
    #[error("connection has no local chain")]
    NoLocalChain,

    /// A routing gossip message failed validation. Ends the output stream.
    #[error("filter validation failed: {0}")]
    FilterValidation(#[from] FilterError),

    /// No completing reply arrived in time.
    #[error("range sync timed out after {timeout:?}")]
    SyncTimeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The range sync was cancelled (explicitly or by disconnect).
    #[error("range sync cancelled")]
    SyncCancelled,

    /// Another range sync is already running on this peer.
    #[error("range sync already in progress")]
    SyncInProgress,

    /// Connection-level failure.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
}

impl GossipError {
    /// Whether retrying the operation may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GossipError::SyncTimeout { .. }
                | GossipError::SyncCancelled
                | GossipError::SyncInProgress
        )
    }
}
