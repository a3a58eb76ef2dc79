//! Pick/place pose chain: one slot per pick-then-place cycle

use serde::Deserialize;
use tracing::{debug, info};

use crate::common::Pose;
use crate::error::{CoreError, Result};

/// What `record_pick`/`record_place` do when no slot has been opened yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotPolicy {
    /// Append a fresh slot and write into it.
    #[default]
    AutoOpen,
    /// Refuse the write with [`CoreError::NoOpenSlot`].
    RequireOpenSlot,
}

/// Tracks pick and place poses per chain slot.
///
/// Pick and place entries of a slot are written independently; a slot is
/// complete once both are `Some`. Only the last slot is ever written.
#[derive(Debug, Clone, Default)]
pub struct TaskChainTracker {
    picks: Vec<Option<Pose>>,
    places: Vec<Option<Pose>>,
    policy: SlotPolicy,
}

impl TaskChainTracker {
    pub fn new(policy: SlotPolicy) -> Self {
        TaskChainTracker {
            picks: Vec::new(),
            places: Vec::new(),
            policy,
        }
    }

    /// Whether a record call would currently be accepted.
    pub fn can_record(&self) -> bool {
        !self.is_empty() || self.policy == SlotPolicy::AutoOpen
    }

    /// Open a new empty slot at the end of the chain.
    pub fn open_slot(&mut self) {
        self.picks.push(None);
        self.places.push(None);
        debug!(slots = self.picks.len(), "opened chain slot");
    }

    /// Null out the current pick entry. No-op on an empty chain.
    pub fn reset_current_pick(&mut self) {
        Self::reset_last(&mut self.picks, "pick");
    }

    /// Null out the current place entry. No-op on an empty chain.
    pub fn reset_current_place(&mut self) {
        Self::reset_last(&mut self.places, "place");
    }

    fn reset_last(entries: &mut [Option<Pose>], kind: &str) {
        let slots = entries.len();
        match entries.last_mut() {
            Some(entry) => {
                info!(slot = slots - 1, kind, "resetting current slot entry");
                *entry = None;
            }
            None => info!(kind, "no slot present, nothing to reset"),
        }
    }

    pub fn record_pick(&mut self, pose: Pose) -> Result<()> {
        let policy = self.policy;
        Self::record_last(&mut self.picks, &mut self.places, policy, pose)
    }

    pub fn record_place(&mut self, pose: Pose) -> Result<()> {
        let policy = self.policy;
        Self::record_last(&mut self.places, &mut self.picks, policy, pose)
    }

    // Write into the last slot of `target`, or open one according to `policy`.
    // The sibling list grows with it so both lists stay slot-aligned.
    fn record_last(
        target: &mut Vec<Option<Pose>>,
        sibling: &mut Vec<Option<Pose>>,
        policy: SlotPolicy,
        pose: Pose,
    ) -> Result<()> {
        match target.last_mut() {
            Some(entry) => *entry = Some(pose),
            None => match policy {
                SlotPolicy::AutoOpen => {
                    info!("no slot open, appending a new one");
                    target.push(Some(pose));
                    if sibling.len() < target.len() {
                        sibling.push(None);
                    }
                }
                SlotPolicy::RequireOpenSlot => return Err(CoreError::NoOpenSlot),
            },
        }
        Ok(())
    }

    /// Both lists have the same length and hold no `None`.
    pub fn is_valid(&self) -> bool {
        self.picks.len() == self.places.len()
            && self.picks.iter().all(Option::is_some)
            && self.places.iter().all(Option::is_some)
    }

    /// The last slot has both a pick and a place pose.
    pub fn has_current_pair(&self) -> bool {
        self.current_pick().is_some() && self.current_place().is_some()
    }

    pub fn current_pick(&self) -> Option<&Pose> {
        self.picks.last().and_then(Option::as_ref)
    }

    pub fn current_place(&self) -> Option<&Pose> {
        self.places.last().and_then(Option::as_ref)
    }

    pub fn picks(&self) -> &[Option<Pose>] {
        &self.picks
    }

    pub fn places(&self) -> &[Option<Pose>] {
        &self.places
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.picks.len().max(self.places.len())
    }

    pub fn is_empty(&self) -> bool {
        self.picks.is_empty() && self.places.is_empty()
    }

    pub fn clear(&mut self) {
        self.picks.clear();
        self.places.clear();
    }
}
