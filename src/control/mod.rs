//! Control module: planner and gripper contracts
pub mod constraints;
pub mod gateway;
pub mod gripper;
pub mod planner;
pub mod status;

pub use self::gateway::{MotionGateway, MotionOutcome, MotionRequest, SafeBand};
pub use self::gripper::{GripperController, GripperService};
pub use self::planner::{MotionPlanner, Plan, PlanTarget};
pub use self::status::{GoalStatus, StatusTracker};
