//! Error types for gossip validation.

use lngossip_types::MessageType;
use thiserror::Error;

/// Why a routing gossip message was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    /// The message is structurally invalid.
    #[error("malformed {message:?}: {reason}")]
    Malformed {
        /// Kind of the rejected message.
        message: MessageType,
        /// What was wrong with it.
        reason: String,
    },

    /// A signature did not verify.
    #[error("invalid signature on {message:?}")]
    InvalidSignature {
        /// Kind of the rejected message.
        message: MessageType,
    },

    /// The message is not routing gossip.
    #[error("not routing gossip: message type {type_id}")]
    UnexpectedMessage {
        /// Wire type of the message.
        type_id: u16,
    },
}
