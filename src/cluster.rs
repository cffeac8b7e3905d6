//! Cluster membership: node identity and the static `NodeId -> (host, port)`
//! mapping every node is configured with at start (§6).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A small integer drawn from the closed cluster membership set.
pub type NodeId = u32;

/// Static, process-start-known mapping of node id to network address.
/// Generalized per the REDESIGN FLAGS from a hardcoded five-node map to a
/// parameterized set; the shipped default (`ClusterConfig::five_node_default`)
/// still produces the five-node `{1..5}` cluster the spec's scenarios assume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    peers: BTreeMap<NodeId, (String, u16)>,
}

impl ClusterConfig {
    pub fn new(peers: BTreeMap<NodeId, (String, u16)>) -> Self {
        Self { peers }
    }

    /// The conventional five-node local cluster used by the original pyraft
    /// `config.py` (`SERVERS`), ports offset by node id.
    pub fn five_node_default(base_port: u16) -> Self {
        let mut peers = BTreeMap::new();
        for id in 1..=5u32 {
            peers.insert(id, ("127.0.0.1".to_string(), base_port + id as u16));
        }
        Self { peers }
    }

    pub fn addr_of(&self, node: NodeId) -> Option<(&str, u16)> {
        self.peers.get(&node).map(|(host, port)| (host.as_str(), *port))
    }

    /// Every node id other than `exclude`, in ascending order.
    pub fn peers_excluding(&self, exclude: NodeId) -> Vec<NodeId> {
        self.peers.keys().copied().filter(|id| *id != exclude).collect()
    }

    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.peers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// `⌊n/2⌋ + 1` for the configured cluster size.
    pub fn majority(&self) -> usize {
        majority_of(self.peers.len())
    }
}

/// `⌊n/2⌋ + 1`, the quorum size for an `n`-node cluster.
pub fn majority_of(n: usize) -> usize {
    n / 2 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_node_cluster_has_majority_three() {
        let cluster = ClusterConfig::five_node_default(15000);
        assert_eq!(cluster.len(), 5);
        assert_eq!(cluster.majority(), 3);
        assert_eq!(cluster.peers_excluding(1), vec![2, 3, 4, 5]);
    }

    #[test]
    fn majority_of_matches_raft_quorum_formula() {
        assert_eq!(majority_of(1), 1);
        assert_eq!(majority_of(3), 2);
        assert_eq!(majority_of(5), 3);
        assert_eq!(majority_of(7), 4);
    }
}
