//! Range synchronization state machine.
//!
//! Tracks one outstanding `query_channel_range` exchange. The responder may
//! split its answer across any number of `reply_channel_range` messages, so
//! the machine accumulates short channel ids until a reply marks the
//! exchange complete.
//!
//! This module performs no I/O. The caller sends the query returned by
//! [`RangeSync::start`], feeds every inbound message to
//! [`RangeSync::handle_wire_message`], and acts on the returned [`Progress`].

use std::collections::HashSet;
use lngossip_types::{ChainHash, QueryChannelRange, ShortChannelId, WireMessage};

/// Lifecycle of a range sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RangeSyncState {
    /// Built, query not yet sent.
    Created,
    /// Query sent, collecting replies.
    AwaitingReplies,
    /// A reply marked the exchange complete.
    Complete,
    /// Aborted before completion.
    Failed {
        /// Why the sync was aborted.
        reason: String,
    },
    /// No completing reply arrived in time.
    TimedOut,
}

impl RangeSyncState {
    /// True once the sync can make no further progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed { .. } | Self::TimedOut)
    }
}

/// Effect of one inbound message on the sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Not a reply for this sync (or the sync is not awaiting replies).
    Ignored,
    /// A partial reply was absorbed.
    Accumulated {
        /// Channel ids not seen in earlier replies.
        added: usize,
    },
    /// The completing reply arrived.
    Completed,
}

/// Everything learned from a finished range sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeReplies {
    /// Channel ids in the order first reported, without duplicates.
    pub short_channel_ids: Vec<ShortChannelId>,
    /// Number of matching replies received.
    pub replies: u32,
}

/// Range sync state machine - NO I/O, just state transitions.
#[derive(Debug, Clone)]
pub struct RangeSync {
    chain_hash: ChainHash,
    first_blocknum: u32,
    number_of_blocks: u32,
    state: RangeSyncState,
    short_channel_ids: Vec<ShortChannelId>,
    seen: HashSet<ShortChannelId>,
    replies: u32,
}

impl RangeSync {
    /// Create a sync for `number_of_blocks` blocks starting at `first_blocknum`.
    pub fn new(chain_hash: ChainHash, first_blocknum: u32, number_of_blocks: u32) -> Self {
        Self {
            chain_hash,
            first_blocknum,
            number_of_blocks,
            state: RangeSyncState::Created,
            short_channel_ids: Vec::new(),
            seen: HashSet::new(),
            replies: 0,
        }
    }

    /// Move to `AwaitingReplies` and return the query to send.
    ///
    /// Calling it again returns the same query without changing state.
    pub fn start(&mut self) -> QueryChannelRange {
        if self.state == RangeSyncState::Created {
            self.state = RangeSyncState::AwaitingReplies;
        }
        self.query()
    }

    /// The query this sync sends.
    pub fn query(&self) -> QueryChannelRange {
        QueryChannelRange {
            chain_hash: self.chain_hash,
            first_blocknum: self.first_blocknum,
            number_of_blocks: self.number_of_blocks,
        }
    }

    /// Absorb an inbound message.
    pub fn handle_wire_message(&mut self, msg: &WireMessage) -> Progress {
        if self.state != RangeSyncState::AwaitingReplies {
            return Progress::Ignored;
        }

        let reply = match msg {
            WireMessage::ReplyChannelRange(reply) if reply.chain_hash == self.chain_hash => reply,
            _ => return Progress::Ignored,
        };

        self.replies = self.replies.saturating_add(1);
        let mut added = 0;
        for scid in &reply.short_channel_ids {
            if self.seen.insert(*scid) {
                self.short_channel_ids.push(*scid);
                added += 1;
            }
        }

        if reply.sync_complete {
            self.state = RangeSyncState::Complete;
            Progress::Completed
        } else {
            Progress::Accumulated { added }
        }
    }

    /// Abort the sync. No effect once terminal.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.state.is_terminal() {
            self.state = RangeSyncState::Failed {
                reason: reason.into(),
            };
        }
    }

    /// Record that the deadline passed. No effect once terminal.
    pub fn time_out(&mut self) {
        if !self.state.is_terminal() {
            self.state = RangeSyncState::TimedOut;
        }
    }

    /// Current state.
    pub fn state(&self) -> &RangeSyncState {
        &self.state
    }

    /// Chain this sync queries.
    pub fn chain_hash(&self) -> ChainHash {
        self.chain_hash
    }

    /// Channel ids collected so far.
    pub fn short_channel_ids(&self) -> &[ShortChannelId] {
        &self.short_channel_ids
    }

    /// Number of matching replies absorbed so far.
    pub fn replies_received(&self) -> u32 {
        self.replies
    }

    /// Snapshot of what has been collected.
    pub fn replies(&self) -> RangeReplies {
        RangeReplies {
            short_channel_ids: self.short_channel_ids.clone(),
            replies: self.replies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lngossip_types::ReplyChannelRange;

    fn reply(chain_hash: ChainHash, complete: bool, scids: &[ShortChannelId]) -> WireMessage {
        WireMessage::ReplyChannelRange(ReplyChannelRange {
            chain_hash,
            first_blocknum: 0,
            number_of_blocks: 1_000,
            sync_complete: complete,
            short_channel_ids: scids.to_vec(),
        })
    }

    fn scid(block: u32) -> ShortChannelId {
        ShortChannelId::new(block, 0, 0)
    }

    #[test]
    fn starts_created() {
        let sync = RangeSync::new(ChainHash::REGTEST, 0, 100);
        assert_eq!(*sync.state(), RangeSyncState::Created);
    }

    #[test]
    fn start_returns_query_and_awaits_replies() {
        let mut sync = RangeSync::new(ChainHash::REGTEST, 500, 100);
        let query = sync.start();

        assert_eq!(query.chain_hash, ChainHash::REGTEST);
        assert_eq!(query.first_blocknum, 500);
        assert_eq!(query.number_of_blocks, 100);
        assert_eq!(*sync.state(), RangeSyncState::AwaitingReplies);
    }

    #[test]
    fn replies_before_start_are_ignored() {
        let mut sync = RangeSync::new(ChainHash::REGTEST, 0, 100);
        let progress = sync.handle_wire_message(&reply(ChainHash::REGTEST, true, &[]));

        assert_eq!(progress, Progress::Ignored);
        assert_eq!(*sync.state(), RangeSyncState::Created);
    }

    #[test]
    fn fragmented_replies_accumulate_until_complete() {
        let mut sync = RangeSync::new(ChainHash::REGTEST, 0, 1_000);
        sync.start();

        let p1 = sync.handle_wire_message(&reply(ChainHash::REGTEST, false, &[scid(1), scid(2)]));
        let p2 = sync.handle_wire_message(&reply(ChainHash::REGTEST, false, &[scid(3)]));
        let p3 = sync.handle_wire_message(&reply(ChainHash::REGTEST, true, &[scid(4)]));

        assert_eq!(p1, Progress::Accumulated { added: 2 });
        assert_eq!(p2, Progress::Accumulated { added: 1 });
        assert_eq!(p3, Progress::Completed);
        assert_eq!(*sync.state(), RangeSyncState::Complete);
        assert_eq!(
            sync.short_channel_ids(),
            &[scid(1), scid(2), scid(3), scid(4)]
        );
        assert_eq!(sync.replies_received(), 3);
    }

    #[test]
    fn duplicate_ids_across_replies_are_collapsed() {
        let mut sync = RangeSync::new(ChainHash::REGTEST, 0, 1_000);
        sync.start();

        sync.handle_wire_message(&reply(ChainHash::REGTEST, false, &[scid(1), scid(2)]));
        let progress = sync.handle_wire_message(&reply(ChainHash::REGTEST, false, &[scid(2)]));

        assert_eq!(progress, Progress::Accumulated { added: 0 });
        assert_eq!(sync.short_channel_ids().len(), 2);
    }

    #[test]
    fn other_chain_replies_are_ignored() {
        let mut sync = RangeSync::new(ChainHash::REGTEST, 0, 1_000);
        sync.start();

        let progress = sync.handle_wire_message(&reply(ChainHash::BITCOIN, true, &[scid(1)]));

        assert_eq!(progress, Progress::Ignored);
        assert_eq!(*sync.state(), RangeSyncState::AwaitingReplies);
        assert!(sync.short_channel_ids().is_empty());
    }

    #[test]
    fn non_reply_messages_are_ignored() {
        let mut sync = RangeSync::new(ChainHash::REGTEST, 0, 1_000);
        sync.start();

        let ping = WireMessage::Other {
            type_id: 18,
            payload: vec![0, 0],
        };
        assert_eq!(sync.handle_wire_message(&ping), Progress::Ignored);
        assert_eq!(sync.replies_received(), 0);
    }

    #[test]
    fn replies_after_completion_are_ignored() {
        let mut sync = RangeSync::new(ChainHash::REGTEST, 0, 1_000);
        sync.start();
        sync.handle_wire_message(&reply(ChainHash::REGTEST, true, &[scid(1)]));

        let late = sync.handle_wire_message(&reply(ChainHash::REGTEST, true, &[scid(9)]));

        assert_eq!(late, Progress::Ignored);
        assert_eq!(sync.short_channel_ids(), &[scid(1)]);
    }

    #[test]
    fn time_out_is_terminal() {
        let mut sync = RangeSync::new(ChainHash::REGTEST, 0, 1_000);
        sync.start();
        sync.time_out();

        assert_eq!(*sync.state(), RangeSyncState::TimedOut);
        assert!(sync.state().is_terminal());
        assert_eq!(
            sync.handle_wire_message(&reply(ChainHash::REGTEST, true, &[])),
            Progress::Ignored
        );
    }

    #[test]
    fn fail_does_not_override_completion() {
        let mut sync = RangeSync::new(ChainHash::REGTEST, 0, 1_000);
        sync.start();
        sync.handle_wire_message(&reply(ChainHash::REGTEST, true, &[]));

        sync.fail("peer disconnected");

        assert_eq!(*sync.state(), RangeSyncState::Complete);
    }

    #[test]
    fn fail_records_reason() {
        let mut sync = RangeSync::new(ChainHash::REGTEST, 0, 1_000);
        sync.start();
        sync.fail("cancelled");

        assert!(
            matches!(sync.state(), RangeSyncState::Failed { reason } if reason == "cancelled")
        );
    }
}
