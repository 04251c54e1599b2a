//! Error types for wire-level gossip types.

use thiserror::Error;

/// Errors raised while encoding, decoding or parsing gossip types.
#[derive(Debug, Error)]
pub enum WireError {
    /// MessagePack serialization failed
    #[error("serialization failed: {0}")]
    Serialization(#[source] rmp_serde::encode::Error),

    /// MessagePack deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] rmp_serde::decode::Error),

    /// Unknown message type code
    #[error("invalid message type: {0}")]
    InvalidMessageType(u16),

    /// Malformed hex input
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Input had the wrong number of bytes
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Bytes required
        expected: usize,
        /// Bytes supplied
        actual: usize,
    },
}
