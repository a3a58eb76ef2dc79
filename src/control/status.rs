//! Planner goal status and the asynchronous status feed

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::CoreError;

/// Status of the planner's current goal, with the wire codes used by the
/// execution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalStatus {
    Pending,
    Active,
    Preempted,
    Succeeded,
    Aborted,
    Rejected,
    Preempting,
    Recalling,
    Recalled,
    Lost,
}

impl GoalStatus {
    const TABLE: [(u8, GoalStatus); 10] = [
        (0, GoalStatus::Pending),
        (1, GoalStatus::Active),
        (2, GoalStatus::Preempted),
        (3, GoalStatus::Succeeded),
        (4, GoalStatus::Aborted),
        (5, GoalStatus::Rejected),
        (6, GoalStatus::Preempting),
        (7, GoalStatus::Recalling),
        (8, GoalStatus::Recalled),
        (9, GoalStatus::Lost),
    ];

    pub fn code(self) -> u8 {
        Self::TABLE
            .iter()
            .find(|(_, status)| *status == self)
            .map(|(code, _)| *code)
            .unwrap_or(9)
    }
}

impl TryFrom<u8> for GoalStatus {
    type Error = CoreError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::TABLE
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, status)| *status)
            .ok_or(CoreError::UnknownStatusCode(code))
    }
}

/// Last known planner status, shared between the feed and the gateway.
///
/// Writes come from the feed task, reads from the control thread. A read may
/// observe a slightly stale value; that is acceptable for the busy check.
#[derive(Debug, Clone)]
pub struct StatusTracker {
    code: Arc<AtomicU8>,
}

impl Default for StatusTracker {
    fn default() -> Self {
        StatusTracker {
            code: Arc::new(AtomicU8::new(GoalStatus::Pending.code())),
        }
    }
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> GoalStatus {
        // Only valid codes are ever stored.
        GoalStatus::try_from(self.code.load(Ordering::Acquire)).unwrap_or(GoalStatus::Lost)
    }

    pub fn set(&self, status: GoalStatus) {
        self.code.store(status.code(), Ordering::Release);
    }

    /// Apply one status-array report: the last entry wins. Empty reports are
    /// ignored; an undecodable code is dropped and the stored status kept.
    pub fn apply_report(&self, codes: &[u8]) {
        let Some(&code) = codes.last() else {
            return;
        };
        match GoalStatus::try_from(code) {
            Ok(status) => {
                debug!(?status, "planner status update");
                self.set(status);
            }
            Err(e) => warn!("dropping planner status report: {}", e),
        }
    }
}

/// Drain status-array reports into `tracker` until the sender side closes.
pub fn spawn_status_listener(
    tracker: StatusTracker,
    mut reports: mpsc::Receiver<Vec<u8>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(codes) = reports.recv().await {
            tracker.apply_report(&codes);
        }
        debug!("planner status feed closed");
    })
}
