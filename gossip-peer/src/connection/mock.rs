//! Mock connection for testing.
//!
//! Allows delivering inbound messages and capturing sent messages for
//! verification.

use super::{ConnectionError, Peer, PeerConnection, PeerState};
use async_trait::async_trait;
use lngossip_types::{ChainHash, FeatureFlags, WireMessage};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, watch};

const INBOUND_CAPACITY: usize = 256;

/// Mock connection for testing.
///
/// Starts Ready on regtest with no features. Clones share state.
#[derive(Debug, Clone)]
pub struct MockConnection {
    inner: Arc<Mutex<MockConnectionInner>>,
    sent_count: Arc<watch::Sender<usize>>,
}

#[derive(Debug)]
struct MockConnectionInner {
    id: String,
    state: PeerState,
    local_features: FeatureFlags,
    remote_features: FeatureFlags,
    local_chains: Vec<ChainHash>,
    inbound_tx: Option<mpsc::Sender<WireMessage>>,
    inbound_rx: Option<mpsc::Receiver<WireMessage>>,
    subscribe_calls: usize,
    sent_messages: Vec<WireMessage>,
    sent_bytes: Vec<Vec<u8>>,
    fail_next_send: Option<String>,
    disconnected: bool,
}

impl Default for MockConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnection {
    /// Create a new mock connection.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        let (sent_count, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(MockConnectionInner {
                id: "mock".to_string(),
                state: PeerState::Ready,
                local_features: FeatureFlags::new(),
                remote_features: FeatureFlags::new(),
                local_chains: vec![ChainHash::REGTEST],
                inbound_tx: Some(tx),
                inbound_rx: Some(rx),
                subscribe_calls: 0,
                sent_messages: Vec::new(),
                sent_bytes: Vec::new(),
                fail_next_send: None,
                disconnected: false,
            })),
            sent_count: Arc::new(sent_count),
        }
    }

    fn inner(&self) -> MutexGuard<'_, MockConnectionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set the id reported in logs.
    pub fn with_id(self, id: &str) -> Self {
        self.inner().id = id.to_string();
        self
    }

    /// Set the lifecycle state.
    pub fn with_state(self, state: PeerState) -> Self {
        self.inner().state = state;
        self
    }

    /// Set the features we advertise.
    pub fn with_local_features(self, features: FeatureFlags) -> Self {
        self.inner().local_features = features;
        self
    }

    /// Set the features the remote advertises.
    pub fn with_remote_features(self, features: FeatureFlags) -> Self {
        self.inner().remote_features = features;
        self
    }

    /// Set the supported chains.
    pub fn with_chains(self, chains: Vec<ChainHash>) -> Self {
        self.inner().local_chains = chains;
        self
    }

    /// Deliver an inbound message as if the remote sent it.
    pub async fn deliver(&self, msg: WireMessage) -> Result<(), ConnectionError> {
        let tx = self.inner().inbound_tx.clone().ok_or(ConnectionError::Closed)?;
        tx.send(msg).await.map_err(|_| ConnectionError::Closed)
    }

    /// Close the inbound side, as if the remote hung up.
    pub fn close(&self) {
        let mut inner = self.inner();
        inner.inbound_tx = None;
        inner.state = PeerState::Closed;
    }

    /// Get all messages that were sent with `send_message`.
    pub fn sent_messages(&self) -> Vec<WireMessage> {
        self.inner().sent_messages.clone()
    }

    /// Get all byte payloads that were sent, including encoded messages.
    pub fn sent_bytes(&self) -> Vec<Vec<u8>> {
        self.inner().sent_bytes.clone()
    }

    /// Get the last message that was sent.
    pub fn last_sent(&self) -> Option<WireMessage> {
        self.inner().sent_messages.last().cloned()
    }

    /// Wait until at least `count` messages were sent, then return them all.
    pub async fn wait_for_sent(&self, count: usize) -> Vec<WireMessage> {
        let mut rx = self.sent_count.subscribe();
        // Sender lives in self, so wait_for cannot fail while we hold it
        let _ = rx.wait_for(|sent| *sent >= count).await;
        self.sent_messages()
    }

    /// Number of times `subscribe()` was called.
    pub fn subscribe_calls(&self) -> usize {
        self.inner().subscribe_calls
    }

    /// Whether `disconnect()` was called.
    pub fn is_disconnected(&self) -> bool {
        self.inner().disconnected
    }

    /// Cause the next send to fail with the given error.
    pub fn fail_next_send(&self, error: &str) {
        self.inner().fail_next_send = Some(error.to_string());
    }

    fn check_send(inner: &mut MockConnectionInner) -> Result<(), ConnectionError> {
        if inner.state == PeerState::Closed {
            return Err(ConnectionError::Closed);
        }
        if let Some(error) = inner.fail_next_send.take() {
            return Err(ConnectionError::SendFailed(error));
        }
        Ok(())
    }
}

#[async_trait]
impl Peer for MockConnection {
    async fn send(&self, bytes: &[u8]) -> Result<(), ConnectionError> {
        let mut inner = self.inner();
        Self::check_send(&mut inner)?;
        inner.sent_bytes.push(bytes.to_vec());
        Ok(())
    }

    async fn send_message(&self, msg: &WireMessage) -> Result<(), ConnectionError> {
        let bytes = msg.to_bytes()?;
        let count = {
            let mut inner = self.inner();
            Self::check_send(&mut inner)?;
            inner.sent_bytes.push(bytes);
            inner.sent_messages.push(msg.clone());
            inner.sent_messages.len()
        };
        self.sent_count.send_replace(count);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ConnectionError> {
        let mut inner = self.inner();
        inner.disconnected = true;
        inner.state = PeerState::Closed;
        inner.inbound_tx = None;
        Ok(())
    }
}

impl PeerConnection for MockConnection {
    fn id(&self) -> String {
        self.inner().id.clone()
    }

    fn state(&self) -> PeerState {
        self.inner().state
    }

    fn local_features(&self) -> FeatureFlags {
        self.inner().local_features.clone()
    }

    fn remote_features(&self) -> FeatureFlags {
        self.inner().remote_features.clone()
    }

    fn local_chains(&self) -> Vec<ChainHash> {
        self.inner().local_chains.clone()
    }

    fn subscribe(&self) -> Result<mpsc::Receiver<WireMessage>, ConnectionError> {
        let mut inner = self.inner();
        inner.subscribe_calls += 1;
        inner
            .inbound_rx
            .take()
            .ok_or(ConnectionError::AlreadySubscribed)
    }
}
