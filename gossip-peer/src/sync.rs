//! Range synchronization driver.
//!
//! [`GossipQueriesSync`] wraps the pure [`RangeSync`] machine with the I/O it
//! needs: sending the query, waiting for the completing reply, and the
//! timeout. At most one sync runs per peer; its slot is cleared exactly once
//! when the waiting call finishes, whether it completed, failed, timed out,
//! or was dropped. Once the peer's inbound routing stops no reply can
//! arrive, so the driver is closed and refuses further syncs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lngossip_core::{Progress, RangeReplies, RangeSync, RangeSyncState};
use lngossip_types::{ChainHash, WireMessage};
use tokio::sync::oneshot;

use crate::config::SyncConfig;
use crate::connection::Peer;
use crate::error::GossipError;

type Completion = oneshot::Sender<Result<RangeReplies, GossipError>>;

struct ActiveRangeSync {
    id: u64,
    machine: RangeSync,
    done: Option<Completion>,
}

type Slot = Arc<Mutex<Option<ActiveRangeSync>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<ActiveRangeSync>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clears the slot when the waiting call ends, however it ends.
struct SlotGuard {
    slot: Slot,
    id: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if slot.as_ref().map(|active| active.id) == Some(self.id) {
            *slot = None;
        }
    }
}

/// Drives range syncs for one peer.
///
/// Cloning shares the slot, so the routing loop and the caller of
/// [`query_range`](Self::query_range) see the same sync.
#[derive(Clone)]
pub struct GossipQueriesSync {
    chain_hash: ChainHash,
    peer: Arc<dyn Peer>,
    config: SyncConfig,
    slot: Slot,
    next_id: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
}

impl GossipQueriesSync {
    /// Create a sync driver for `chain_hash`, sending through `peer`.
    pub fn new(chain_hash: ChainHash, peer: Arc<dyn Peer>, config: SyncConfig) -> Self {
        Self {
            chain_hash,
            peer,
            config,
            slot: Arc::new(Mutex::new(None)),
            next_id: Arc::new(AtomicU64::new(0)),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Timeout applied to each sync.
    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    /// Query a block range and wait for the complete answer.
    ///
    /// Missing bounds fall back to the configured defaults.
    pub async fn query_range(
        &self,
        first_block: Option<u32>,
        num_blocks: Option<u32>,
    ) -> Result<RangeReplies, GossipError> {
        let first_block = first_block.unwrap_or(self.config.first_block);
        let num_blocks = num_blocks.unwrap_or(self.config.num_blocks);

        let (query, rx, guard) = {
            let mut slot = lock(&self.slot);
            if self.closed.load(Ordering::Acquire) {
                return Err(GossipError::SyncCancelled);
            }
            if slot.is_some() {
                return Err(GossipError::SyncInProgress);
            }
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let mut machine = RangeSync::new(self.chain_hash, first_block, num_blocks);
            let query = machine.start();
            let (tx, rx) = oneshot::channel();
            *slot = Some(ActiveRangeSync {
                id,
                machine,
                done: Some(tx),
            });
            let guard = SlotGuard {
                slot: Arc::clone(&self.slot),
                id,
            };
            (query, rx, guard)
        };

        tracing::info!(
            "Starting range sync (first_block: {}, num_blocks: {})",
            first_block,
            num_blocks
        );
        self.peer
            .send_message(&WireMessage::QueryChannelRange(query))
            .await?;

        let timeout = self.timeout();
        let result = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(GossipError::SyncCancelled),
            Err(_) => {
                if let Some(active) = lock(&self.slot).as_mut() {
                    active.machine.time_out();
                }
                tracing::warn!("Range sync timed out after {:?}", timeout);
                Err(GossipError::SyncTimeout { timeout })
            }
        };
        drop(guard);

        if let Ok(replies) = &result {
            tracing::info!(
                "Range sync complete: {} channels in {} replies",
                replies.short_channel_ids.len(),
                replies.replies
            );
        }
        result
    }

    /// Feed an inbound message to the active sync, if any.
    pub fn handle_wire_message(&self, msg: &WireMessage) {
        let mut slot = lock(&self.slot);
        let Some(active) = slot.as_mut() else {
            return;
        };
        match active.machine.handle_wire_message(msg) {
            Progress::Ignored => {}
            Progress::Accumulated { added } => {
                tracing::debug!(
                    "Range reply {}: {} new channels",
                    active.machine.replies_received(),
                    added
                );
            }
            Progress::Completed => {
                if let Some(done) = active.done.take() {
                    let _ = done.send(Ok(active.machine.replies()));
                }
            }
        }
    }

    /// Abort the active sync. Returns whether one was running.
    pub fn cancel(&self, reason: &str) -> bool {
        let mut slot = lock(&self.slot);
        let Some(active) = slot.as_mut() else {
            return false;
        };
        let Some(done) = active.done.take() else {
            return false;
        };
        active.machine.fail(reason);
        tracing::debug!("Range sync cancelled: {}", reason);
        let _ = done.send(Err(GossipError::SyncCancelled));
        true
    }

    /// Cancel the running sync and refuse new ones. Returns whether one was
    /// running.
    pub fn close(&self, reason: &str) -> bool {
        {
            // Under the slot lock so no sync can start in between
            let _slot = lock(&self.slot);
            self.closed.store(true, Ordering::Release);
        }
        self.cancel(reason)
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether a sync is running.
    pub fn is_active(&self) -> bool {
        lock(&self.slot).is_some()
    }

    /// State of the running sync.
    pub fn state(&self) -> Option<RangeSyncState> {
        lock(&self.slot)
            .as_ref()
            .map(|active| active.machine.state().clone())
    }
}

impl std::fmt::Debug for GossipQueriesSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GossipQueriesSync")
            .field("chain_hash", &self.chain_hash)
            .field("active", &self.is_active())
            .field("closed", &self.is_closed())
            .finish()
    }
}
