//! # gossip-core
//!
//! Pure logic for the per-peer gossip layer (no I/O, instant tests).
//!
//! This crate holds the state machines behind gossip handling without any
//! network access or timers, so every transition can be unit tested
//! directly.
//!
//! - [`RangeSync`] tracks one `query_channel_range` exchange.
//! - [`RelayState`] decides what may be relayed to a peer.
//! - [`GraphState`] validates routing gossip and releases messages that
//!   arrived before their channel announcement.
//!
//! The async plumbing (connections, timeouts, tasks) lives in `gossip-peer`,
//! which drives these machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod graph;
pub mod range_sync;
pub mod relay;
pub mod verify;

pub use error::FilterError;
pub use graph::{ApplyOutcome, Disposition, GraphState, DEFAULT_MAX_PENDING};
pub use range_sync::{Progress, RangeReplies, RangeSync, RangeSyncState};
pub use relay::RelayState;
pub use verify::{SignatureVerifier, StructuralVerifier};
