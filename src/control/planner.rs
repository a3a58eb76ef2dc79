//! Motion planning service contract

use crate::common::Pose;
use crate::control::constraints::PathConstraint;
use crate::error::Result;

/// What a plan drives the arm to.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanTarget {
    Joints(Vec<f64>),
    Cartesian(Vec<Pose>),
}

/// A trajectory produced by the planning service.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub target: PlanTarget,
    /// Fraction of the requested path the planner could follow, 0.0 - 1.0.
    pub fraction: f64,
    pub velocity_scale: f64,
}

impl Plan {
    pub fn new(target: PlanTarget, fraction: f64) -> Self {
        Plan {
            target,
            fraction,
            velocity_scale: 1.0,
        }
    }
}

/// Trait for the external planner/executor the gateway drives.
///
/// An `Err` from a planning call means no path was found; the gateway logs it
/// and skips the motion.
pub trait MotionPlanner: Send {
    /// Plan a joint-space motion to `joints`.
    fn plan_joint_target(&mut self, joints: &[f64]) -> Result<Plan>;

    /// Plan a Cartesian path through `waypoints`.
    fn plan_cartesian(
        &mut self,
        waypoints: &[Pose],
        eef_step: f64,
        jump_threshold: f64,
        constraint: Option<&PathConstraint>,
    ) -> Result<Plan>;

    /// Retime `plan` to `velocity_scale` of the nominal speed.
    fn retime(&mut self, plan: Plan, velocity_scale: f64) -> Result<Plan>;

    /// Execute `plan`, blocking until completion when `wait` is set.
    fn execute(&mut self, plan: &Plan, wait: bool) -> Result<()>;

    /// Cancel any in-flight execution.
    fn stop(&mut self);

    fn clear_pose_targets(&mut self);

    /// Current pose of the end effector link.
    fn current_pose(&self) -> Pose;

    fn end_effector_link(&self) -> &str;
}
