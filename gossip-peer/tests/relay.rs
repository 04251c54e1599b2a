//! Rumor mongering between peers sharing one hub and one graph.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use lngossip_peer::{GossipConfig, GossipHub, GossipPeer, MockConnection};
use lngossip_types::{ChainHash, GossipTimestampFilter, WireMessage};

struct Node {
    config: GossipConfig,
    hub: GossipHub,
    graph: Arc<lngossip_peer::GraphFilter>,
}

impl Node {
    fn new() -> Self {
        let config = GossipConfig::default();
        let hub = GossipHub::new(config.relay.hub_capacity);
        let graph = graph_filter(&config);
        Self { config, hub, graph }
    }

    fn connect(
        &self,
        connection: &Arc<MockConnection>,
    ) -> (GossipPeer<MockConnection>, lngossip_peer::GossipMessages) {
        GossipPeer::with_hub(
            connection.clone(),
            as_filter(&self.graph),
            self.hub.clone(),
            &self.config,
        )
        .unwrap()
    }
}

fn relayed(connection: &MockConnection) -> Vec<WireMessage> {
    connection
        .sent_messages()
        .into_iter()
        .filter(|m| !matches!(m, WireMessage::GossipTimestampFilter(_)))
        .collect()
}

#[tokio::test]
async fn accepted_gossip_reaches_other_active_peers() {
    init_tracing();
    let node = Node::new();
    let alice = capable_connection("alice");
    let bob = capable_connection("bob");
    let (alice_peer, mut from_alice) = node.connect(&alice);
    let (bob_peer, _from_bob) = node.connect(&bob);

    alice_peer.enable_gossip().await.unwrap();
    bob_peer.enable_gossip().await.unwrap();

    let ann = channel_announcement(scid(900), 1, 2);
    alice.deliver(ann.clone()).await.unwrap();
    assert_eq!(from_alice.recv().await.unwrap().unwrap(), ann);

    // bob: activation filter, then the relayed announcement
    let sent = bob.wait_for_sent(2).await;
    assert_eq!(sent[1], ann);

    // alice never gets her own gossip back
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(relayed(&alice).is_empty());
}

#[tokio::test]
async fn inactive_peer_gets_no_relay() {
    init_tracing();
    let node = Node::new();
    let alice = capable_connection("alice");
    let bob = capable_connection("bob");
    let (_alice_peer, mut from_alice) = node.connect(&alice);
    let (_bob_peer, _from_bob) = node.connect(&bob);

    let ann = channel_announcement(scid(901), 1, 2);
    alice.deliver(ann.clone()).await.unwrap();
    assert_eq!(from_alice.recv().await.unwrap().unwrap(), ann);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(bob.sent_messages().is_empty());
}

#[tokio::test]
async fn relay_respects_remote_timestamp_filter() {
    init_tracing();
    let node = Node::new();
    let alice = capable_connection("alice");
    let bob = capable_connection("bob");
    let (_alice_peer, mut from_alice) = node.connect(&alice);
    let (bob_peer, mut from_bob) = node.connect(&bob);
    bob_peer.enable_gossip().await.unwrap();

    // bob only wants gossip stamped in [1000, 2000)
    let filter = WireMessage::GossipTimestampFilter(GossipTimestampFilter {
        chain_hash: ChainHash::REGTEST,
        first_timestamp: 1_000,
        timestamp_range: 1_000,
    });
    bob.deliver(filter.clone()).await.unwrap();
    assert_eq!(from_bob.recv().await.unwrap().unwrap(), filter);

    let ann = channel_announcement(scid(902), 1, 2);
    let stale = channel_update(scid(902), 500, 0);
    let fresh = channel_update(scid(902), 1_500, 1);
    for msg in [&ann, &stale, &fresh] {
        alice.deliver(msg.clone()).await.unwrap();
        assert_eq!(from_alice.recv().await.unwrap().unwrap(), *msg);
    }

    bob.wait_for_sent(3).await;
    assert_eq!(relayed(&bob), vec![ann, fresh]);
}

#[tokio::test]
async fn disable_gossip_stops_later_relay() {
    init_tracing();
    let node = Node::new();
    let alice = capable_connection("alice");
    let bob = capable_connection("bob");
    let (_alice_peer, mut from_alice) = node.connect(&alice);
    let (bob_peer, _from_bob) = node.connect(&bob);

    bob_peer.enable_gossip().await.unwrap();
    let first = channel_announcement(scid(903), 1, 2);
    alice.deliver(first.clone()).await.unwrap();
    from_alice.recv().await.unwrap().unwrap();
    bob.wait_for_sent(2).await;

    bob_peer.disable_gossip().await.unwrap();
    let second = channel_announcement(scid(904), 1, 2);
    alice.deliver(second).await.unwrap();
    from_alice.recv().await.unwrap().unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(relayed(&bob), vec![first]);
    assert!(matches!(
        bob.last_sent(),
        Some(WireMessage::GossipTimestampFilter(f)) if f.first_timestamp == u32::MAX
    ));
}

#[tokio::test]
async fn released_update_is_not_echoed_to_its_sender() {
    init_tracing();
    let node = Node::new();
    let alice = capable_connection("alice");
    let bob = capable_connection("bob");
    let carol = capable_connection("carol");
    let (alice_peer, _from_alice) = node.connect(&alice);
    let (bob_peer, mut from_bob) = node.connect(&bob);
    let (carol_peer, _from_carol) = node.connect(&carol);
    for peer in [&alice_peer, &bob_peer, &carol_peer] {
        peer.enable_gossip().await.unwrap();
    }

    // alice's update waits until bob announces the channel
    let upd = channel_update(scid(905), 1_700_000_000, 0);
    let ann = channel_announcement(scid(905), 1, 2);
    alice.deliver(upd.clone()).await.unwrap();
    while node.graph.pending_count().await == 0 {
        tokio::task::yield_now().await;
    }
    bob.deliver(ann.clone()).await.unwrap();
    assert_eq!(from_bob.recv().await.unwrap().unwrap(), ann);
    assert_eq!(from_bob.recv().await.unwrap().unwrap(), upd);

    carol.wait_for_sent(3).await;
    assert_eq!(relayed(&carol), vec![ann.clone(), upd.clone()]);
    bob.wait_for_sent(2).await;
    assert_eq!(relayed(&bob), vec![upd]);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(relayed(&alice), vec![ann]);
}

#[tokio::test]
async fn closed_peer_gets_no_relay() {
    init_tracing();
    let node = Node::new();
    let alice = capable_connection("alice");
    let bob = capable_connection("bob");
    let (alice_peer, _from_alice) = node.connect(&alice);
    let (bob_peer, mut from_bob) = node.connect(&bob);
    alice_peer.enable_gossip().await.unwrap();
    bob_peer.enable_gossip().await.unwrap();

    // node ids out of order end alice's stream
    alice
        .deliver(channel_announcement(scid(906), 9, 2))
        .await
        .unwrap();
    alice_peer.closed().wait_for(|c| *c).await.unwrap();

    let ann = channel_announcement(scid(907), 1, 2);
    bob.deliver(ann.clone()).await.unwrap();
    assert_eq!(from_bob.recv().await.unwrap().unwrap(), ann);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(relayed(&alice).is_empty());
}
