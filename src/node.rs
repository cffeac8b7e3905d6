//! The driver loop: wires persistence, the applier, and the in/out queues
//! around a `ControllerState`, the way the teacher's `RaftNode` wraps
//! `RaftState` with its background tasks — except here the controller is
//! exclusively owned by this loop rather than shared behind a `Mutex`
//! (§5: single-threaded cooperative state machine).

use std::path::PathBuf;

use log::{debug, info};
use tokio::sync::mpsc;

use crate::applier::StateMachine;
use crate::cluster::NodeId;
use crate::clock::LeaderFlag;
use crate::config::NodeConfig;
use crate::controller::ControllerState;
use crate::message::{Envelope, InboundEnvelope};
use crate::persistence;

pub struct Node<S: StateMachine> {
    node_id: NodeId,
    data_dir: PathBuf,
    controller: ControllerState,
    applier: S,
    last_applied: u64,
}

impl<S: StateMachine> Node<S> {
    /// Loads persisted state (if any) and builds the controller from it
    /// (§9). `last_applied` always starts at 0: the applier replays every
    /// committed entry on each process start, since the applier's own state
    /// is never persisted in this crate.
    pub fn new(config: NodeConfig, applier: S) -> anyhow::Result<Self> {
        let persisted = persistence::load(&config.data_dir, config.node_id)?;
        let controller = ControllerState::from_persisted(config.node_id, config.cluster, persisted);
        Ok(Self {
            node_id: config.node_id,
            data_dir: config.data_dir,
            controller,
            applier,
            last_applied: 0,
        })
    }

    fn persist(&self) -> anyhow::Result<()> {
        let snapshot = self.controller.persistent_snapshot();
        persistence::save(&self.data_dir, self.node_id, &snapshot)
    }

    /// Apply every newly committed entry in order, exactly once (§8 scenario 8).
    fn apply_committed(&mut self) {
        while self.last_applied < self.controller.commit_index {
            self.last_applied += 1;
            if let Some(entry) = self.controller.log.get(self.last_applied) {
                let result = self.applier.apply(&entry.command);
                debug!("node {} applied index {}: {result}", self.node_id, self.last_applied);
            }
        }
    }

    /// Drains `inbound_rx` forever, stepping the controller once per
    /// message, persisting any state change, applying newly committed
    /// entries, and forwarding outbound envelopes to `outbound_tx`.
    pub async fn run(
        mut self,
        mut inbound_rx: mpsc::Receiver<InboundEnvelope>,
        outbound_tx: mpsc::Sender<Envelope>,
        leader_flag: LeaderFlag,
    ) {
        while let Some(inbound) = inbound_rx.recv().await {
            let outbound = self.controller.step(inbound);

            if let Err(err) = self.persist() {
                log::warn!("node {} failed to persist state: {err}", self.node_id);
            }
            self.apply_committed();
            leader_flag.store(self.controller.is_leader(), std::sync::atomic::Ordering::Relaxed);

            for envelope in outbound {
                if outbound_tx.send(envelope).await.is_err() {
                    info!("node {} outbound queue closed, shutting down", self.node_id);
                    return;
                }
            }
        }
    }
}
