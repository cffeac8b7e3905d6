//! The message sum type exchanged between controllers, plus the envelope
//! that carries a destination for outbound messages.

use serde::{Deserialize, Serialize};

use crate::cluster::NodeId;
use crate::log::LogEntry;

/// All inbound/outbound message kinds the controller understands. Ticks
/// enter through the same inbound queue as peer/client traffic (§2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    AppendEntriesRequest {
        term: u64,
        prev_log_idx: u64,
        prev_log_term: u64,
        entries: Vec<LogEntry>,
        leader_commit: u64,
    },
    AppendEntriesResponse {
        term: u64,
        success: bool,
        last_applied_index: u64,
        node_id: NodeId,
    },
    RequestVoteRequest {
        term: u64,
        candidate_id: NodeId,
        last_log_index: u64,
        last_log_term: u64,
    },
    RequestVoteResponse {
        term: u64,
        vote_granted: bool,
        node_id: NodeId,
    },
    NewCommand {
        command: Vec<u8>,
    },
    ClockTick {
        elapsed_ms: f64,
    },
}

impl Message {
    /// The term carried by this message, for variants that carry one.
    pub fn term(&self) -> Option<u64> {
        match self {
            Message::AppendEntriesRequest { term, .. }
            | Message::AppendEntriesResponse { term, .. }
            | Message::RequestVoteRequest { term, .. }
            | Message::RequestVoteResponse { term, .. } => Some(*term),
            Message::NewCommand { .. } | Message::ClockTick { .. } => None,
        }
    }
}

/// Where an outbound message should be delivered. The core never resolves a
/// `NodeId` to a network address — that mapping belongs to cluster
/// configuration (`crate::cluster::ClusterConfig`) consumed by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Destination {
    /// Deliver to exactly one peer.
    Node(NodeId),
    /// Deliver to every peer other than the sender.
    Broadcast,
}

/// An outbound message paired with its destination. Produced by
/// `ControllerState::step` and drained by the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub destination: Destination,
    pub message: Message,
}

impl Envelope {
    pub fn to(node: NodeId, message: Message) -> Self {
        Self {
            destination: Destination::Node(node),
            message,
        }
    }

    pub fn broadcast(message: Message) -> Self {
        Self {
            destination: Destination::Broadcast,
            message,
        }
    }
}

/// An inbound message paired with the node id it arrived from, where known.
/// `ClockTick` and locally-submitted `NewCommand`s have no sender.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEnvelope {
    pub from: Option<NodeId>,
    pub message: Message,
}

impl InboundEnvelope {
    pub fn from_peer(from: NodeId, message: Message) -> Self {
        Self {
            from: Some(from),
            message,
        }
    }

    pub fn local(message: Message) -> Self {
        Self { from: None, message }
    }
}
