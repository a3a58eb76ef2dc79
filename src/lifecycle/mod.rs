//! Lifecycle management for executor components

use std::fmt;

use tracing::info;

use crate::error::{CoreError, Result};

/// Trait for components that follow a configure/activate lifecycle
pub trait LifecycleNode: Send {
    /// Acquire everything needed before motion, e.g. calibration
    fn on_configure(&mut self) -> Result<()>;

    /// Bring the hardware into its working pose
    fn on_activate(&mut self) -> Result<()>;

    /// Halt motion, keep configuration
    fn on_deactivate(&mut self) -> Result<()>;

    /// Drop runtime state and return to unconfigured
    fn on_cleanup(&mut self) -> Result<()>;

    /// Final stop; the node cannot be configured again
    fn on_shutdown(&mut self) -> Result<()>;
}

/// State of a lifecycle node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unconfigured,
    Inactive,
    Active,
    Finalized,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Unconfigured => "unconfigured",
            State::Inactive => "inactive",
            State::Active => "active",
            State::Finalized => "finalized",
        };
        f.write_str(name)
    }
}

/// Tracks the lifecycle state of a node and guards its transitions
#[derive(Debug)]
pub struct LifecycleNodeBase {
    pub name: String,
    state: State,
}

impl LifecycleNodeBase {
    pub fn new(name: &str) -> Self {
        LifecycleNodeBase {
            name: name.to_string(),
            state: State::Unconfigured,
        }
    }

    pub fn get_state(&self) -> State {
        self.state
    }

    /// Move to `to` if the current state is one of `from`.
    pub fn transition(&mut self, from: &[State], to: State) -> Result<()> {
        if !from.contains(&self.state) {
            return Err(CoreError::Lifecycle(format!(
                "{} cannot go from {} to {}",
                self.name, self.state, to
            )));
        }
        info!(node = %self.name, from = %self.state, to = %to, "lifecycle transition");
        self.state = to;
        Ok(())
    }

    /// Fail unless the node is in `state`.
    pub fn require(&self, state: State) -> Result<()> {
        if self.state != state {
            return Err(CoreError::Lifecycle(format!(
                "{} is {}, expected {}",
                self.name, self.state, state
            )));
        }
        Ok(())
    }
}
