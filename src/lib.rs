//! Pick-and-place task execution for a 7-DoF arm with a parallel gripper.
//!
//! A [`TaskExecutor`] turns perception results into grasp and release poses,
//! drives the arm through a [`MotionGateway`](control::MotionGateway), actuates
//! the gripper, and records poses in a [`TaskChainTracker`]. Hardware sits
//! behind traits; [`sim`] provides in-process stand-ins.
pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod fault;
pub mod lifecycle;
pub mod observability;
pub mod perception;
pub mod sim;
pub mod task;

pub use crate::common::{BoundingBox, DepthImage, Pose, RgbImage, TaskInfo};
pub use crate::config::{AppConfig, ExecutorConfig};
pub use crate::error::{CoreError, Result};
pub use crate::lifecycle::LifecycleNode;
pub use crate::task::{
    ExecutorBackend, ExecutorState, SlotPolicy, TaskChainTracker, TaskExecutor, TaskOutcome,
};
