//! End-to-end replication behavior driven directly against `ControllerState`,
//! routing envelopes between in-memory replicas instead of over real
//! sockets. Adapted from the teacher's `tests/replication.rs`, which drove
//! the same scenarios over loopback TCP; routing in-process here keeps the
//! test deterministic while still exercising the full message-passing
//! protocol rather than just individual handlers.

use std::collections::{HashMap, VecDeque};

use raft_cluster::cluster::{ClusterConfig, NodeId};
use raft_cluster::controller::{ControllerState, Role};
use raft_cluster::message::{Destination, Envelope, InboundEnvelope, Message};
use raft_cluster::persistence::{self, PersistentState};

/// A tiny in-memory network: a queue per node plus simple broadcast/unicast
/// routing, driven by repeatedly draining every node's step outputs until
/// no envelope remains in flight.
struct Network {
    nodes: HashMap<NodeId, ControllerState>,
    in_flight: VecDeque<(NodeId, InboundEnvelope)>,
}

impl Network {
    fn new(cluster: ClusterConfig) -> Self {
        let nodes = cluster
            .all_nodes()
            .into_iter()
            .map(|id| (id, ControllerState::new(id, cluster.clone())))
            .collect();
        Self {
            nodes,
            in_flight: VecDeque::new(),
        }
    }

    fn route(&mut self, from: NodeId, envelope: Envelope) {
        match envelope.destination {
            Destination::Node(to) => {
                self.in_flight.push_back((to, InboundEnvelope::from_peer(from, envelope.message)));
            }
            Destination::Broadcast => {
                for &peer in self.nodes.keys() {
                    if peer != from {
                        self.in_flight
                            .push_back((peer, InboundEnvelope::from_peer(from, envelope.message.clone())));
                    }
                }
            }
        }
    }

    /// Drain all in-flight messages (and anything they trigger) until the
    /// network is quiescent.
    fn settle(&mut self) {
        let mut guard = 0;
        while let Some((to, inbound)) = self.in_flight.pop_front() {
            guard += 1;
            assert!(guard < 10_000, "network did not settle, possible infinite loop");
            let node = self.nodes.get_mut(&to).expect("routed to unknown node");
            let outbound = node.step(inbound);
            for envelope in outbound {
                self.route(to, envelope);
            }
        }
    }

    fn elect_leader(&mut self, candidate: NodeId) {
        let outbound = self
            .nodes
            .get_mut(&candidate)
            .unwrap()
            .step(InboundEnvelope::local(Message::ClockTick { elapsed_ms: 10_000.0 }));
        for envelope in outbound {
            self.route(candidate, envelope);
        }
        self.settle();
    }

    fn submit(&mut self, leader: NodeId, command: &str) {
        let outbound = self
            .nodes
            .get_mut(&leader)
            .unwrap()
            .step(InboundEnvelope::local(Message::NewCommand {
                command: command.as_bytes().to_vec(),
            }));
        for envelope in outbound {
            self.route(leader, envelope);
        }
        self.settle();
    }
}

fn small_cluster() -> ClusterConfig {
    ClusterConfig::five_node_default(16000)
}

#[test]
fn replication_basic() {
    let mut net = Network::new(small_cluster());
    net.elect_leader(1);
    assert_eq!(net.nodes[&1].role, Role::Leader);

    net.submit(1, "set x 1");

    for (&id, node) in &net.nodes {
        assert_eq!(node.log.last_index(), 1, "node {id} did not replicate the entry");
        assert_eq!(node.commit_index, 1, "node {id} did not advance commit_index");
    }
}

#[test]
fn replication_multi_node() {
    let mut net = Network::new(small_cluster());
    net.elect_leader(2);
    assert_eq!(net.nodes[&2].role, Role::Leader);

    net.submit(2, "set a 1");
    net.submit(2, "set b 2");
    net.submit(2, "set c 3");

    for (&id, node) in &net.nodes {
        assert_eq!(node.log.last_index(), 3, "node {id} missing entries");
        assert_eq!(node.commit_index, 3, "node {id} did not commit everything");
    }

    let leader_log: Vec<_> = (1..=3).map(|i| net.nodes[&2].log.get(i).cloned()).collect();
    for (&id, node) in &net.nodes {
        let log: Vec<_> = (1..=3).map(|i| node.log.get(i).cloned()).collect();
        assert_eq!(log, leader_log, "node {id} log diverged from leader");
    }
}

#[test]
fn only_one_leader_survives_an_election() {
    let mut net = Network::new(small_cluster());
    net.elect_leader(1);
    assert_eq!(net.nodes[&1].role, Role::Leader);

    // a stale candidacy attempt from a follower in the same term must not
    // produce a second leader
    let outbound = net
        .nodes
        .get_mut(&3)
        .unwrap()
        .step(InboundEnvelope::local(Message::ClockTick { elapsed_ms: 10_000.0 }));
    for envelope in outbound {
        net.route(3, envelope);
    }
    net.settle();

    let leaders = net.nodes.values().filter(|n| n.role == Role::Leader).count();
    assert_eq!(leaders, 1);
}

#[tokio::test]
async fn persistence_restart_recovers_term_vote_and_log() {
    let dir = tempfile::tempdir().unwrap();
    let cluster = small_cluster();

    let mut net = Network::new(cluster.clone());
    net.elect_leader(1);
    net.submit(1, "set x 1");
    net.submit(1, "set y 2");

    let snapshot = net.nodes[&1].persistent_snapshot();
    persistence::save(dir.path(), 1, &snapshot).unwrap();

    let reloaded: PersistentState = persistence::load(dir.path(), 1).unwrap();
    let restarted = ControllerState::from_persisted(1, cluster, reloaded);

    assert_eq!(restarted.current_term, net.nodes[&1].current_term);
    assert_eq!(restarted.voted_for, Some(1));
    assert_eq!(restarted.log.last_index(), 2);
    assert_eq!(restarted.role, Role::Follower);
}
