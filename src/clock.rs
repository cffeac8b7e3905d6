//! The tick source: a background task that feeds `ClockTick` messages into
//! a node's inbound queue at a cadence that tightens once the node becomes
//! leader, mirroring the original `clock()` thread (50ms while leading,
//! 100ms otherwise) without needing direct access to `ControllerState` (the
//! controller lives exclusively in the driver loop; this task only sees a
//! shared flag the driver updates after each `step`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::{self, Duration};

use crate::controller::HEARTBEAT_INTERVAL_MS;
use crate::message::{InboundEnvelope, Message};

/// Follower/candidate poll cadence. Coarser than the heartbeat interval
/// since these nodes are only watching their own election deadline, not
/// driving replication.
const FOLLOWER_POLL_INTERVAL_MS: u64 = 2 * HEARTBEAT_INTERVAL_MS as u64;

/// Shared with the driver loop: `true` once this node believes it is
/// leader. Read-only from the clock's perspective.
pub type LeaderFlag = Arc<AtomicBool>;

pub fn new_leader_flag() -> LeaderFlag {
    Arc::new(AtomicBool::new(false))
}

/// Runs until `tx` is closed. Each iteration sends one `ClockTick` carrying
/// the actual elapsed time since the previous tick, then sleeps for the
/// cadence appropriate to the current leader flag.
pub async fn run(tx: mpsc::Sender<InboundEnvelope>, is_leader: LeaderFlag) {
    let mut last = Instant::now();
    loop {
        let interval_ms = if is_leader.load(Ordering::Relaxed) {
            HEARTBEAT_INTERVAL_MS as u64
        } else {
            FOLLOWER_POLL_INTERVAL_MS
        };
        time::sleep(Duration::from_millis(interval_ms)).await;

        let now = Instant::now();
        let elapsed_ms = now.duration_since(last).as_secs_f64() * 1000.0;
        last = now;

        let tick = InboundEnvelope::local(Message::ClockTick { elapsed_ms });
        if tx.send(tick).await.is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sends_ticks_until_receiver_drops() {
        let (tx, mut rx) = mpsc::channel(4);
        let flag = new_leader_flag();
        let handle = tokio::spawn(run(tx, flag));

        let first = rx.recv().await.unwrap();
        match first.message {
            Message::ClockTick { elapsed_ms } => assert!(elapsed_ms > 0.0),
            other => panic!("unexpected message: {other:?}"),
        }

        drop(rx);
        handle.await.unwrap();
    }
}
