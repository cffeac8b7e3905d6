//! Network transport: one long-lived accept loop plus one short-lived
//! outbound connection per send, as the teacher's `send_raft_message`/
//! `handle_raft_message` do, but bridged to the controller purely through
//! `tokio::sync::mpsc` queues instead of calling into controller state
//! directly from the socket-handling tasks (§4.13, §5).

use log::{debug, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use crate::cluster::{ClusterConfig, NodeId};
use crate::message::{Destination, Envelope, InboundEnvelope, Message};
use crate::wire::{self, HEADER_LEN};

/// Runs the inbound accept loop until the listener itself fails. Every
/// connection is read to completion on its own task; a peer frame becomes
/// an `InboundEnvelope` pushed onto `inbound_tx`.
pub async fn serve(
    node_id: NodeId,
    cluster: ClusterConfig,
    inbound_tx: mpsc::Sender<InboundEnvelope>,
) -> anyhow::Result<()> {
    let (_, port) = cluster
        .addr_of(node_id)
        .ok_or_else(|| anyhow::anyhow!("node {node_id} missing from cluster config"))?;
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    debug!("node {node_id} listening on port {port}");

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let tx = inbound_tx.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, tx).await {
                warn!("connection from {peer_addr} ended: {err}");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, tx: mpsc::Sender<InboundEnvelope>) -> anyhow::Result<()> {
    loop {
        let mut header = [0u8; HEADER_LEN];
        if stream.read_exact(&mut header).await.is_err() {
            return Ok(()); // peer closed the connection
        }
        let body_len = wire::decode_header(&header)? as usize;
        let mut body = vec![0u8; body_len];
        stream.read_exact(&mut body).await?;

        let message = wire::decode_body(&body)?;
        let from = sender_hint(&message);
        if tx.send(InboundEnvelope { from, message }).await.is_err() {
            return Ok(());
        }
    }
}

/// Responses and vote/append requests carry the sender's id in the message
/// body itself; the raw socket address is not a reliable `NodeId`.
fn sender_hint(message: &Message) -> Option<NodeId> {
    match message {
        Message::AppendEntriesResponse { node_id, .. } | Message::RequestVoteResponse { node_id, .. } => {
            Some(*node_id)
        }
        Message::RequestVoteRequest { candidate_id, .. } => Some(*candidate_id),
        _ => None,
    }
}

/// Drains `outbound_rx` forever, resolving each envelope's destination
/// against `cluster` and dialing a fresh connection per send.
pub async fn drain_outbound(
    node_id: NodeId,
    cluster: ClusterConfig,
    mut outbound_rx: mpsc::Receiver<Envelope>,
) {
    while let Some(envelope) = outbound_rx.recv().await {
        let targets = match envelope.destination {
            Destination::Node(target) => vec![target],
            Destination::Broadcast => cluster.peers_excluding(node_id),
        };
        for target in targets {
            if let Err(err) = send_to(&cluster, target, &envelope.message).await {
                debug!("send to node {target} failed: {err}");
            }
        }
    }
}

async fn send_to(cluster: &ClusterConfig, target: NodeId, message: &Message) -> anyhow::Result<()> {
    let (host, port) = cluster
        .addr_of(target)
        .ok_or_else(|| anyhow::anyhow!("node {target} missing from cluster config"))?;
    let frame = wire::encode_frame(message)?;
    let mut stream = TcpStream::connect((host, port)).await?;
    stream.write_all(&frame).await?;
    Ok(())
}
