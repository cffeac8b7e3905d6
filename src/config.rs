//! Process-start configuration: this node's id, its data directory, and the
//! cluster's peer table, derived from CLI arguments the way the teacher's
//! `bin/server.rs` reads `std::env::args()`, generalized from a hardcoded
//! five-node map to a parameterized one (§6, §9 REDESIGN FLAGS).

use std::path::PathBuf;

use crate::cluster::{ClusterConfig, NodeId};

/// Base port the default five-node cluster offsets by node id, matching
/// the original `config.py` `SERVERS` table.
pub const DEFAULT_BASE_PORT: u16 = 15000;

pub struct NodeConfig {
    pub node_id: NodeId,
    pub cluster: ClusterConfig,
    pub data_dir: PathBuf,
}

impl NodeConfig {
    /// Parses `<node-id> [data-dir]` from the given arguments (excluding
    /// argv[0]). Always builds the conventional five-node local cluster;
    /// callers needing a different topology construct `NodeConfig`
    /// directly instead of going through argument parsing.
    pub fn from_args(args: &[String]) -> anyhow::Result<Self> {
        let node_id: NodeId = args
            .first()
            .ok_or_else(|| anyhow::anyhow!("usage: <node-id> [data-dir]"))?
            .parse()
            .map_err(|_| anyhow::anyhow!("node id must be a positive integer"))?;

        let data_dir = args
            .get(1)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("./data/node-{node_id}")));

        let cluster = ClusterConfig::five_node_default(DEFAULT_BASE_PORT);
        if cluster.addr_of(node_id).is_none() {
            anyhow::bail!("node id {node_id} is not part of the configured cluster");
        }

        Ok(Self { node_id, cluster, data_dir })
    }
}

/// Initializes the `env_logger` backend the way the teacher's binaries do
/// (`env_logger::init()` in `main`), defaulting to `info` when `RUST_LOG`
/// is unset.
pub fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
