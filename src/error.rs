//! Error types for the task executor core

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the executor and its collaborators.
///
/// Planning failures and busy rejections are not errors: they are reported
/// as [`MotionOutcome`](crate::control::gateway::MotionOutcome) values and the
/// step is skipped.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("transform {target} <- {source_frame} not available after {waited:?}")]
    CalibrationTimeout {
        target: String,
        source_frame: String,
        waited: Duration,
    },

    #[error("perception failed: {0}")]
    Perception(String),

    #[error("unknown planner status code {0}")]
    UnknownStatusCode(u8),

    #[error("no chain slot is open, call open_slot() first")]
    NoOpenSlot,

    #[error("gripper service failed: {0}")]
    Gripper(String),

    #[error("planner service failed: {0}")]
    Planner(String),

    #[error("lifecycle: {0}")]
    Lifecycle(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
