//! The core's typed error vocabulary (§7). None of these are ever raised as
//! a Rust `Err` out of `ControllerState::step` — the controller always
//! resolves them into a return value or outbound message — but naming them
//! gives logging, tests, and the console's user-facing messages a shared
//! vocabulary instead of ad hoc strings.

use thiserror::Error;

use crate::cluster::NodeId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaftError {
    #[error("append entries anchor (idx={prev_idx}, term={prev_term}) did not match local log")]
    LogMismatch { prev_idx: u64, prev_term: u64 },

    #[error("message term {msg_term} is stale against current term {current_term}")]
    StaleTerm { msg_term: u64, current_term: u64 },

    #[error("observed higher term {higher_term} than current term {current_term}; stepping down")]
    StaleLeader { higher_term: u64, current_term: u64 },

    #[error("node {node_id} is not the leader")]
    NotLeader { node_id: NodeId },
}
