use std::env;

use log::info;
use raft_cluster::applier::KvStore;
use raft_cluster::clock;
use raft_cluster::config::{self, NodeConfig};
use raft_cluster::node::Node;
use raft_cluster::transport;
use tokio::sync::mpsc;

const QUEUE_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    let node_config = NodeConfig::from_args(&args)?;
    let node_id = node_config.node_id;
    let cluster = node_config.cluster.clone();

    info!("starting node {node_id}, data dir {:?}", node_config.data_dir);

    let (inbound_tx, inbound_rx) = mpsc::channel(QUEUE_CAPACITY);
    let (outbound_tx, outbound_rx) = mpsc::channel(QUEUE_CAPACITY);
    let leader_flag = clock::new_leader_flag();

    let node = Node::new(node_config, KvStore::new())?;

    let accept_handle = tokio::spawn(transport::serve(node_id, cluster.clone(), inbound_tx.clone()));
    let outbound_handle = tokio::spawn(transport::drain_outbound(node_id, cluster, outbound_rx));
    let clock_handle = tokio::spawn(clock::run(inbound_tx, leader_flag.clone()));

    node.run(inbound_rx, outbound_tx, leader_flag).await;

    accept_handle.abort();
    outbound_handle.abort();
    clock_handle.abort();
    Ok(())
}
