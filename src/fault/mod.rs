//! Fault ("reflex") supervision and recovery

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::control::gateway::MotionGateway;
use crate::error::Result;

/// Operating mode reported by the arm's state stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotMode {
    Other,
    Idle,
    Move,
    Guiding,
    Reflex,
    UserStopped,
    AutomaticErrorRecovery,
}

impl RobotMode {
    /// Decode a wire mode code; unknown codes map to `Other`.
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => RobotMode::Idle,
            2 => RobotMode::Move,
            3 => RobotMode::Guiding,
            4 => RobotMode::Reflex,
            5 => RobotMode::UserStopped,
            6 => RobotMode::AutomaticErrorRecovery,
            _ => RobotMode::Other,
        }
    }

    pub fn is_fault(self) -> bool {
        self == RobotMode::Reflex
    }
}

/// Trait for the outbound recovery request publisher.
pub trait RecoveryChannel: Send {
    fn request_recovery(&mut self) -> Result<()>;
}

/// Shared fault flag, written by the robot state stream.
#[derive(Debug, Clone, Default)]
pub struct FaultFeed {
    faulted: Arc<AtomicBool>,
}

impl FaultFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted.load(Ordering::Acquire)
    }

    /// Apply one robot-mode report. Only `Reflex` raises the flag; any other
    /// mode clears it.
    pub fn report(&self, mode: RobotMode) {
        let faulted = mode.is_fault();
        let was = self.faulted.swap(faulted, Ordering::AcqRel);
        if was != faulted {
            info!(?mode, faulted, "robot fault state changed");
        }
    }
}

/// Reads the fault flag and triggers recovery.
///
/// The flag changes asynchronously from the state stream; the executor reads
/// it before each motion command and may see a slightly stale value.
pub struct FaultMonitor {
    feed: FaultFeed,
    channel: Box<dyn RecoveryChannel>,
}

impl FaultMonitor {
    pub fn new(feed: FaultFeed, channel: Box<dyn RecoveryChannel>) -> Self {
        FaultMonitor { feed, channel }
    }

    pub fn feed(&self) -> FaultFeed {
        self.feed.clone()
    }

    pub fn is_faulted(&self) -> bool {
        self.feed.is_faulted()
    }

    /// Stop motion and publish a recovery request without waiting for it.
    /// The flag clears only when the stream next reports a non-fault mode.
    pub fn recover(&mut self, gateway: &mut MotionGateway) {
        gateway.stop();
        match self.channel.request_recovery() {
            Ok(()) => warn!("recovery requested"),
            Err(e) => warn!("failed to publish recovery request: {}", e),
        }
    }
}

/// Drain robot-mode reports into `feed` until the sender side closes.
pub fn spawn_fault_listener(
    feed: FaultFeed,
    mut modes: mpsc::Receiver<RobotMode>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(mode) = modes.recv().await {
            feed.report(mode);
        }
        debug!("robot state feed closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::gateway::SafeBand;
    use crate::control::status::StatusTracker;
    use crate::sim::{default_home_pose, BackendCall, Journal, SimulatedPlanner, SimulatedRecovery};

    fn new_monitor(journal: Journal) -> FaultMonitor {
        FaultMonitor::new(FaultFeed::new(), Box::new(SimulatedRecovery::new(journal)))
    }

    #[test]
    fn test_only_reflex_is_a_fault() {
        let monitor = new_monitor(Journal::new());
        let feed = monitor.feed();
        feed.report(RobotMode::Reflex);
        assert!(monitor.is_faulted());
        feed.report(RobotMode::UserStopped);
        assert!(!monitor.is_faulted());
        feed.report(RobotMode::from_code(4));
        assert!(monitor.is_faulted());
        feed.report(RobotMode::from_code(200));
        assert!(!monitor.is_faulted());
    }

    #[test]
    fn test_recover_stops_then_publishes_and_keeps_flag() {
        let journal = Journal::new();
        let mut gateway = MotionGateway::new(
            Box::new(SimulatedPlanner::new(journal.clone(), default_home_pose())),
            StatusTracker::new(),
            vec![0.0; 7],
            SafeBand::default(),
            "panda_link0",
        );
        let mut monitor = new_monitor(journal.clone());
        monitor.feed().report(RobotMode::Reflex);

        monitor.recover(&mut gateway);

        assert_eq!(
            journal.calls(),
            vec![
                BackendCall::Stop,
                BackendCall::ClearPoseTargets,
                BackendCall::RecoveryRequested
            ]
        );
        assert!(monitor.is_faulted());
    }

    #[tokio::test]
    async fn test_listener_tracks_stream() {
        let monitor = new_monitor(Journal::new());
        let (tx, rx) = mpsc::channel(4);
        let handle = spawn_fault_listener(monitor.feed(), rx);
        tx.send(RobotMode::Move).await.unwrap();
        tx.send(RobotMode::Reflex).await.unwrap();
        drop(tx);
        handle.await.unwrap();
        assert!(monitor.is_faulted());
    }
}
