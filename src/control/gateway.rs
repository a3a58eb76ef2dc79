//! Motion gateway: the only path from the executor to the planner

use std::sync::Arc;

use tracing::{info, warn};

use crate::common::Pose;
use crate::control::constraints::PathConstraint;
use crate::control::planner::MotionPlanner;
use crate::control::status::{GoalStatus, StatusTracker};

/// Cartesian resolution of planned paths, meters.
pub const EEF_STEP: f64 = 0.01;
/// Joint-space jump threshold; 0.0 disables the check.
pub const JUMP_THRESHOLD: f64 = 0.0;

/// Result of a motion command. None of these abort a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionOutcome {
    Executed,
    /// Another trajectory is in flight; the command was dropped.
    Busy,
    PlanningFailed,
    ExecutionFailed,
    /// A waypoint had a non-finite coordinate; nothing was planned.
    Rejected,
    /// A fault was active and recovery ran instead.
    Suppressed,
}

impl MotionOutcome {
    pub fn is_executed(self) -> bool {
        self == MotionOutcome::Executed
    }
}

/// Allowed z range for Cartesian waypoints, meters in the base frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafeBand {
    pub z_min: f64,
    pub z_max: f64,
}

impl Default for SafeBand {
    fn default() -> Self {
        SafeBand {
            z_min: 0.01,
            z_max: 0.30,
        }
    }
}

impl SafeBand {
    /// Clamp `z` into the band, warning when it had to be corrected.
    pub fn clamp(&self, z: f64) -> f64 {
        if z < self.z_min {
            warn!("z = {} is invalid, using {} instead", z, self.z_min);
            self.z_min
        } else if z > self.z_max {
            warn!("z = {} is invalid, using {} instead", z, self.z_max);
            self.z_max
        } else {
            z
        }
    }
}

/// Ordered Cartesian waypoints and the speed to traverse them at.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionRequest {
    pub waypoints: Vec<Pose>,
    pub velocity_scale: f64,
}

impl MotionRequest {
    /// Whether every waypoint translation is finite.
    pub fn is_finite(&self) -> bool {
        self.waypoints
            .iter()
            .all(|pose| pose.translation.vector.iter().all(|c| c.is_finite()))
    }

    pub fn new(waypoints: Vec<Pose>, velocity_scale: f64) -> Self {
        MotionRequest {
            waypoints,
            velocity_scale,
        }
    }

    /// The same request with every waypoint z inside `band`.
    pub fn clamped(mut self, band: &SafeBand) -> Self {
        for pose in &mut self.waypoints {
            pose.translation.vector.z = band.clamp(pose.translation.vector.z);
        }
        self
    }
}

/// Wraps the external planner: homing, clamped Cartesian execution, stop and
/// the busy check. At most one trajectory is in flight; commands that arrive
/// while busy are dropped, not queued.
pub struct MotionGateway {
    planner: Box<dyn MotionPlanner>,
    status: StatusTracker,
    home_joints: Vec<f64>,
    band: SafeBand,
    base_frame: String,
    constraint: Option<Arc<PathConstraint>>,
    constraint_version: u64,
}

impl MotionGateway {
    pub fn new(
        planner: Box<dyn MotionPlanner>,
        status: StatusTracker,
        home_joints: Vec<f64>,
        band: SafeBand,
        base_frame: &str,
    ) -> Self {
        MotionGateway {
            planner,
            status,
            home_joints,
            band,
            base_frame: base_frame.to_string(),
            constraint: None,
            constraint_version: 0,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.status.current() == GoalStatus::Active
    }

    pub fn status(&self) -> GoalStatus {
        self.status.current()
    }

    pub fn band(&self) -> SafeBand {
        self.band
    }

    /// Constraint applied to Cartesian motions, installed by the last home.
    pub fn constraint(&self) -> Option<Arc<PathConstraint>> {
        self.constraint.clone()
    }

    pub fn current_pose(&self) -> Pose {
        self.planner.current_pose()
    }

    /// Move to the fixed joint-space home configuration.
    pub fn go_home(&mut self, wait: bool) -> MotionOutcome {
        if self.reject_if_busy() {
            return MotionOutcome::Busy;
        }
        self.planner.clear_pose_targets();
        let plan = match self.planner.plan_joint_target(&self.home_joints) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("could not plan trajectory from current pose to home pose: {}", e);
                return MotionOutcome::PlanningFailed;
            }
        };
        if let Err(e) = self.planner.execute(&plan, wait) {
            warn!("home trajectory failed: {}", e);
            return MotionOutcome::ExecutionFailed;
        }
        self.refresh_constraint();
        MotionOutcome::Executed
    }

    // A new Arc each time, so a constraint handed out earlier stays untouched.
    fn refresh_constraint(&mut self) {
        self.constraint_version += 1;
        let pose = self.planner.current_pose();
        let constraint = PathConstraint::yaw_only(
            self.constraint_version,
            self.planner.end_effector_link(),
            &self.base_frame,
            pose.rotation,
        );
        info!(version = constraint.version, "path constraint updated");
        self.constraint = Some(Arc::new(constraint));
    }

    /// Plan and execute a Cartesian path through `waypoints`, blocking until done.
    pub fn execute_cartesian(&mut self, waypoints: &[Pose], velocity_scale: f64) -> MotionOutcome {
        self.execute_request(MotionRequest::new(waypoints.to_vec(), velocity_scale))
    }

    pub fn execute_request(&mut self, request: MotionRequest) -> MotionOutcome {
        if self.reject_if_busy() {
            return MotionOutcome::Busy;
        }
        if !request.is_finite() {
            warn!(waypoints = ?request.waypoints, "non-finite waypoint, motion rejected");
            return MotionOutcome::Rejected;
        }
        let request = request.clamped(&self.band);
        let constraint = self.constraint.clone();
        let plan = match self.planner.plan_cartesian(
            &request.waypoints,
            EEF_STEP,
            JUMP_THRESHOLD,
            constraint.as_deref(),
        ) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("could not plan cartesian path: {}", e);
                return MotionOutcome::PlanningFailed;
            }
        };
        if plan.fraction < 1.0 {
            warn!(fraction = plan.fraction, "only part of the cartesian path could be planned");
        }
        let plan = match self.planner.retime(plan, request.velocity_scale) {
            Ok(plan) => plan,
            Err(e) => {
                warn!("could not retime cartesian path: {}", e);
                return MotionOutcome::PlanningFailed;
            }
        };
        match self.planner.execute(&plan, true) {
            Ok(()) => MotionOutcome::Executed,
            Err(e) => {
                warn!("cartesian trajectory failed: {}", e);
                MotionOutcome::ExecutionFailed
            }
        }
    }

    /// Cancel in-flight execution and drop pending pose targets.
    pub fn stop(&mut self) {
        self.planner.stop();
        self.planner.clear_pose_targets();
    }

    fn reject_if_busy(&self) -> bool {
        let status = self.status.current();
        info!(?status, "current move group status");
        if status == GoalStatus::Active {
            warn!("robot busy, another trajectory is being executed");
            return true;
        }
        false
    }
}
