//! Relay state for rumor mongering.
//!
//! Decides whether newly validated gossip may be pushed to a peer. Relay is
//! either active or inactive, and the peer may narrow what it wants with a
//! `gossip_timestamp_filter`.

use lngossip_types::{ChainHash, GossipTimestampFilter, WireMessage};

/// Relay decision state for one peer.
#[derive(Debug, Clone)]
pub struct RelayState {
    chain_hash: ChainHash,
    active: bool,
    remote_filter: Option<GossipTimestampFilter>,
}

impl RelayState {
    /// Create an inactive relay state for `chain_hash`.
    pub fn new(chain_hash: ChainHash) -> Self {
        Self {
            chain_hash,
            active: false,
            remote_filter: None,
        }
    }

    /// Turn relay on. Returns true if this changed the state.
    pub fn activate(&mut self) -> bool {
        let changed = !self.active;
        self.active = true;
        changed
    }

    /// Turn relay off. Returns true if this changed the state.
    pub fn deactivate(&mut self) -> bool {
        let changed = self.active;
        self.active = false;
        changed
    }

    /// Whether relay is on.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Record the filter the remote sent us. Filters for other chains are
    /// ignored; returns whether the filter was applied.
    pub fn apply_remote_filter(&mut self, filter: &GossipTimestampFilter) -> bool {
        if filter.chain_hash != self.chain_hash {
            return false;
        }
        self.remote_filter = Some(filter.clone());
        true
    }

    /// The filter last received from the remote.
    pub fn remote_filter(&self) -> Option<&GossipTimestampFilter> {
        self.remote_filter.as_ref()
    }

    /// Whether `msg` may be relayed right now.
    ///
    /// Only routing gossip is relayed. Without a remote filter every message
    /// passes; with one, timestamped messages must fall in its window.
    /// Channel announcements carry no timestamp and always pass.
    pub fn admits(&self, msg: &WireMessage) -> bool {
        if !self.active || !msg.is_routing_gossip() {
            return false;
        }
        if let Some(chain_hash) = msg.chain_hash() {
            if chain_hash != self.chain_hash {
                return false;
            }
        }
        match (&self.remote_filter, msg.timestamp()) {
            (Some(filter), Some(timestamp)) => filter.admits(timestamp),
            _ => true,
        }
    }

    /// Filter asking the remote to relay everything from `now` on.
    pub fn activation_filter(&self, now: u32) -> GossipTimestampFilter {
        GossipTimestampFilter {
            chain_hash: self.chain_hash,
            first_timestamp: now,
            timestamp_range: u32::MAX,
        }
    }

    /// Filter asking the remote to stop relaying.
    pub fn deactivation_filter(&self) -> GossipTimestampFilter {
        GossipTimestampFilter {
            chain_hash: self.chain_hash,
            first_timestamp: u32::MAX,
            timestamp_range: 0,
        }
    }
}
