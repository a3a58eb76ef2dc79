//! Task module: pick/place sequencing and the pose chain
pub mod chain;
pub mod executor;

pub use self::chain::{SlotPolicy, TaskChainTracker};
pub use self::executor::{ExecutorBackend, ExecutorState, TaskExecutor, TaskOutcome};
