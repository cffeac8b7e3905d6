//! The consensus state machine: the per-node controller that owns the
//! persistent log, term/vote state, role, election timeouts, leader
//! replication bookkeeping, and the message-processing rules (§4.2-§4.11).
//!
//! `ControllerState::step` is the single point of mutation. It never
//! suspends and never touches the network or disk directly — it is pure
//! computation over `&mut self` plus a list of outbound envelopes for the
//! transport to deliver (§5).

use std::collections::HashMap;

use rand::Rng;

use crate::cluster::{ClusterConfig, NodeId};
use crate::error::RaftError;
use crate::log::{Log, LogEntry};
use crate::message::{Envelope, InboundEnvelope, Message};
use crate::persistence::PersistentState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Follower,
    Candidate,
    Leader,
}

/// Heartbeat cadence on leaders. Must be strictly less than the minimum
/// election timeout (§4.11) so a leader's heartbeats reliably beat a
/// follower's timer.
pub const HEARTBEAT_INTERVAL_MS: f64 = 100.0;

const ELECTION_TIMEOUT_MIN_MS: f64 = 500.0;
const ELECTION_TIMEOUT_MAX_MS: f64 = 1500.0;

pub struct ControllerState {
    pub node_id: NodeId,
    pub role: Role,
    pub current_term: u64,
    pub voted_for: Option<NodeId>,
    pub log: Log,
    pub commit_index: u64,
    pub election_deadline_ms: f64,
    pub match_index: HashMap<NodeId, u64>,
    votes: HashMap<NodeId, Option<bool>>,
    cluster: ClusterConfig,
}

impl ControllerState {
    /// A fresh node: Follower, term 0, empty vote record, log with only the
    /// sentinel, commit_index 0, and a randomized election deadline (§3).
    pub fn new(node_id: NodeId, cluster: ClusterConfig) -> Self {
        Self {
            node_id,
            role: Role::Follower,
            current_term: 0,
            voted_for: None,
            log: Log::new(),
            commit_index: 0,
            election_deadline_ms: random_election_deadline(),
            match_index: HashMap::new(),
            votes: HashMap::new(),
            cluster,
        }
    }

    /// Reconstruct a node from previously persisted term/vote/log state
    /// (§9: persistence is required, not optional). Always starts as a
    /// Follower with a fresh election deadline; `commit_index` and
    /// leader-only bookkeeping are volatile and never persisted.
    pub fn from_persisted(node_id: NodeId, cluster: ClusterConfig, persisted: PersistentState) -> Self {
        Self {
            node_id,
            role: Role::Follower,
            current_term: persisted.current_term,
            voted_for: persisted.voted_for,
            log: persisted.log,
            commit_index: 0,
            election_deadline_ms: random_election_deadline(),
            match_index: HashMap::new(),
            votes: HashMap::new(),
            cluster,
        }
    }

    /// Snapshot of the three fields that must be write-through persisted
    /// after any step that can change them (§9).
    pub fn persistent_snapshot(&self) -> PersistentState {
        PersistentState {
            current_term: self.current_term,
            voted_for: self.voted_for,
            log: self.log.clone(),
        }
    }

    pub fn is_leader(&self) -> bool {
        self.role == Role::Leader
    }

    /// Process one inbound message, mutating state as needed, and return the
    /// outbound envelopes it produces (possibly empty).
    pub fn step(&mut self, inbound: InboundEnvelope) -> Vec<Envelope> {
        match inbound.message {
            Message::AppendEntriesRequest {
                term,
                prev_log_idx,
                prev_log_term,
                entries,
                leader_commit,
            } => {
                let from = inbound.from.unwrap_or(self.node_id);
                self.handle_append_entries_request(from, term, prev_log_idx, prev_log_term, entries, leader_commit)
            }
            Message::AppendEntriesResponse {
                term,
                success,
                last_applied_index,
                node_id,
            } => self.handle_append_entries_response(term, success, last_applied_index, node_id),
            Message::RequestVoteRequest {
                term,
                candidate_id,
                last_log_index,
                last_log_term,
            } => self.handle_request_vote_request(term, candidate_id, last_log_index, last_log_term),
            Message::RequestVoteResponse {
                term,
                vote_granted,
                node_id,
            } => self.handle_request_vote_response(term, vote_granted, node_id),
            Message::NewCommand { command } => self.handle_new_command(command),
            Message::ClockTick { elapsed_ms } => self.handle_clock_tick(elapsed_ms),
        }
    }

    /// Submit a client command. Unlike peer/tick traffic, a rejected
    /// submission is reported back to the caller directly rather than folded
    /// into an outbound envelope, mirroring the original controller's
    /// rejection at the admission point rather than inside message
    /// processing (§4.8, §7 `NotLeader`).
    pub fn propose(&mut self, command: Vec<u8>) -> Result<Vec<Envelope>, RaftError> {
        if !self.is_leader() {
            return Err(RaftError::NotLeader { node_id: self.node_id });
        }
        Ok(self.step(InboundEnvelope::local(Message::NewCommand { command })))
    }

    // --- common rule (§4.3) -------------------------------------------------

    fn apply_common_rule(&mut self, msg_term: u64) {
        if msg_term > self.current_term {
            self.current_term = msg_term;
            self.voted_for = None;
            self.role = Role::Follower;
            self.reset_election_deadline();
        }
    }

    // --- AppendEntriesRequest (§4.4) ----------------------------------------

    fn handle_append_entries_request(
        &mut self,
        from: NodeId,
        term: u64,
        prev_log_idx: u64,
        prev_log_term: u64,
        entries: Vec<LogEntry>,
        leader_commit: u64,
    ) -> Vec<Envelope> {
        self.apply_common_rule(term);

        if term < self.current_term {
            log::debug!(
                "node {}: {}",
                self.node_id,
                RaftError::StaleTerm {
                    msg_term: term,
                    current_term: self.current_term
                }
            );
            return vec![Envelope::to(
                from,
                Message::AppendEntriesResponse {
                    term: self.current_term,
                    success: false,
                    last_applied_index: self.log.last_index(),
                    node_id: self.node_id,
                },
            )];
        }

        // A valid leader contact: reset the deadline and defer to it even if
        // we were mid-election ourselves.
        self.role = Role::Follower;
        self.reset_election_deadline();

        let success = self.log.append(prev_log_idx, prev_log_term, &entries);
        if success {
            self.commit_index = leader_commit.min(self.log.last_index());
        } else {
            log::debug!(
                "node {}: {}",
                self.node_id,
                RaftError::LogMismatch {
                    prev_idx: prev_log_idx,
                    prev_term: prev_log_term
                }
            );
        }

        vec![Envelope::to(
            from,
            Message::AppendEntriesResponse {
                term: self.current_term,
                success,
                last_applied_index: self.log.last_index(),
                node_id: self.node_id,
            },
        )]
    }

    // --- AppendEntriesResponse (§4.5) ---------------------------------------

    fn handle_append_entries_response(
        &mut self,
        term: u64,
        success: bool,
        last_applied_index: u64,
        node_id: NodeId,
    ) -> Vec<Envelope> {
        if !self.is_leader() {
            return vec![];
        }
        if term > self.current_term {
            log::info!(
                "node {}: {}",
                self.node_id,
                RaftError::StaleLeader {
                    higher_term: term,
                    current_term: self.current_term
                }
            );
            self.apply_common_rule(term);
            return vec![];
        }

        self.match_index.insert(node_id, last_applied_index);

        let mut outbound = Vec::new();
        if success {
            if last_applied_index < self.log.last_index() {
                outbound.push(self.replication_request_to(node_id, last_applied_index));
            }
        } else if last_applied_index < self.log.last_index() {
            // Only back off if the follower is actually behind (§4.5,
            // controller.py's `last_applied_index < len(log) - 1` guard).
            let prev_idx = last_applied_index.saturating_sub(1);
            outbound.push(self.replication_request_to(node_id, prev_idx));
        }

        self.recompute_commit_index();
        outbound
    }

    /// Build an AppendEntriesRequest anchored at `prev_idx`, carrying
    /// everything after it.
    fn replication_request_to(&self, node_id: NodeId, prev_idx: u64) -> Envelope {
        let prev_term = self.log.term_at(prev_idx).unwrap_or(0);
        let entries = self.log.entries_after(prev_idx).to_vec();
        Envelope::to(
            node_id,
            Message::AppendEntriesRequest {
                term: self.current_term,
                prev_log_idx: prev_idx,
                prev_log_term: prev_term,
                entries,
                leader_commit: self.commit_index,
            },
        )
    }

    fn recompute_commit_index(&mut self) {
        let last_index = self.log.last_index();
        let majority = self.cluster.majority();
        let mut best = self.commit_index;
        for n in (self.commit_index + 1)..=last_index {
            let replicated_count = self.match_index.values().filter(|&&m| m >= n).count();
            if replicated_count >= majority && self.log.term_at(n) == Some(self.current_term) {
                best = n;
            }
        }
        self.commit_index = best;
    }

    // --- RequestVoteRequest (§4.6) -------------------------------------------

    fn handle_request_vote_request(
        &mut self,
        term: u64,
        candidate_id: NodeId,
        last_log_index: u64,
        last_log_term: u64,
    ) -> Vec<Envelope> {
        self.apply_common_rule(term);

        let vote_granted = term >= self.current_term
            && (self.voted_for.is_none() || self.voted_for == Some(candidate_id))
            && self.candidate_log_is_up_to_date(last_log_term, last_log_index);

        if vote_granted {
            self.voted_for = Some(candidate_id);
            self.role = Role::Follower;
            self.reset_election_deadline();
        }

        vec![Envelope::to(
            candidate_id,
            Message::RequestVoteResponse {
                term: self.current_term,
                vote_granted,
                node_id: self.node_id,
            },
        )]
    }

    fn candidate_log_is_up_to_date(&self, last_log_term: u64, last_log_index: u64) -> bool {
        last_log_term > self.log.last_term()
            || (last_log_term == self.log.last_term() && last_log_index >= self.log.last_index())
    }

    // --- RequestVoteResponse (§4.7) ------------------------------------------

    fn handle_request_vote_response(&mut self, term: u64, vote_granted: bool, node_id: NodeId) -> Vec<Envelope> {
        if self.role != Role::Candidate || term != self.current_term {
            return vec![];
        }

        self.votes.insert(node_id, Some(vote_granted));

        let granted = self.votes.values().filter(|v| **v == Some(true)).count();
        if granted >= self.cluster.majority() {
            return self.become_leader();
        }
        vec![]
    }

    fn become_leader(&mut self) -> Vec<Envelope> {
        self.role = Role::Leader;
        self.match_index.clear();
        for peer in self.cluster.peers_excluding(self.node_id) {
            self.match_index.insert(peer, 0);
        }
        self.match_index.insert(self.node_id, self.log.last_index());

        vec![Envelope::broadcast(Message::AppendEntriesRequest {
            term: self.current_term,
            prev_log_idx: self.log.last_index(),
            prev_log_term: self.log.last_term(),
            entries: vec![],
            leader_commit: self.commit_index,
        })]
    }

    // --- NewCommand (§4.8) ---------------------------------------------------

    fn handle_new_command(&mut self, command: Vec<u8>) -> Vec<Envelope> {
        if !self.is_leader() {
            return vec![];
        }

        let entry = LogEntry::new(self.current_term, command);
        self.log.append_local(entry.clone());
        let last_index = self.log.last_index();
        self.match_index.insert(self.node_id, last_index);

        let prev_idx = last_index - 1;
        let prev_term = self.log.term_at(prev_idx).unwrap_or(0);

        vec![Envelope::broadcast(Message::AppendEntriesRequest {
            term: self.current_term,
            prev_log_idx: prev_idx,
            prev_log_term: prev_term,
            entries: vec![entry],
            leader_commit: self.commit_index,
        })]
    }

    // --- ClockTick (§4.9) -----------------------------------------------------

    fn handle_clock_tick(&mut self, elapsed_ms: f64) -> Vec<Envelope> {
        if self.is_leader() {
            return vec![Envelope::broadcast(Message::AppendEntriesRequest {
                term: self.current_term,
                prev_log_idx: self.log.last_index(),
                prev_log_term: self.log.last_term(),
                entries: vec![],
                leader_commit: self.commit_index,
            })];
        }

        self.election_deadline_ms -= elapsed_ms;
        if self.election_deadline_ms < 0.0 {
            return self.start_election();
        }
        vec![]
    }

    fn start_election(&mut self) -> Vec<Envelope> {
        self.role = Role::Candidate;
        self.current_term += 1;
        self.voted_for = Some(self.node_id);
        self.votes.clear();
        self.votes.insert(self.node_id, Some(true));
        self.reset_election_deadline();

        vec![Envelope::broadcast(Message::RequestVoteRequest {
            term: self.current_term,
            candidate_id: self.node_id,
            last_log_index: self.log.last_index(),
            last_log_term: self.log.last_term(),
        })]
    }

    fn reset_election_deadline(&mut self) {
        self.election_deadline_ms = random_election_deadline();
    }
}

fn random_election_deadline() -> f64 {
    rand::thread_rng().gen_range(ELECTION_TIMEOUT_MIN_MS..ELECTION_TIMEOUT_MAX_MS)
}
