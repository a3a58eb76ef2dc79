//! In-process simulated backend
//!
//! Stands in for the planner, gripper, recovery channel, transform lookup and
//! centroid estimator when no hardware is attached. Every call is appended to
//! a shared [`Journal`] so callers can inspect what the executor did and in
//! which order.

use std::sync::{Arc, Mutex};

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion};

use crate::common::{BoundingBox, DepthImage, Pose};
use crate::control::constraints::PathConstraint;
use crate::control::gripper::{GraspEpsilon, GripperService};
use crate::control::planner::{MotionPlanner, Plan, PlanTarget};
use crate::control::status::StatusTracker;
use crate::error::{CoreError, Result};
use crate::fault::{FaultFeed, RecoveryChannel, RobotMode};
use crate::perception::calibration::{CalibrationTransform, TransformLookup};
use crate::perception::centroid::{Centroid, CentroidEstimator};
use crate::perception::orientation::YawRotation;
use crate::task::executor::ExecutorBackend;

/// One call into the simulated backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    PlanJoints(Vec<f64>),
    PlanCartesian {
        waypoints: Vec<Pose>,
        constraint_version: Option<u64>,
    },
    Retime(f64),
    Execute { wait: bool },
    Stop,
    ClearPoseTargets,
    GripperMove { width: f64, speed: f64 },
    GripperGrasp { width: f64, speed: f64, force: f64 },
    RecoveryRequested,
}

impl BackendCall {
    /// Calls that plan or move the arm, or actuate the gripper.
    pub fn is_actuation(&self) -> bool {
        !matches!(
            self,
            BackendCall::Stop | BackendCall::ClearPoseTargets | BackendCall::RecoveryRequested
        )
    }
}

/// Shared, ordered record of backend calls.
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<BackendCall>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: BackendCall) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call);
        }
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.0.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut calls) = self.0.lock() {
            calls.clear();
        }
    }

    /// Waypoints of every Cartesian plan request, in order.
    pub fn cartesian_waypoints(&self) -> Vec<Vec<Pose>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BackendCall::PlanCartesian { waypoints, .. } => Some(waypoints),
                _ => None,
            })
            .collect()
    }
}

/// Planner that always succeeds and teleports the end effector to the target.
pub struct SimulatedPlanner {
    journal: Journal,
    home_pose: Pose,
    pose: Pose,
    ee_link: String,
    fail_planning: bool,
    fraction: f64,
    executions: usize,
    reflex_after: Option<(usize, FaultFeed)>,
}

impl SimulatedPlanner {
    pub fn new(journal: Journal, home_pose: Pose) -> Self {
        SimulatedPlanner {
            journal,
            home_pose,
            pose: home_pose,
            ee_link: "panda_hand_tcp".to_string(),
            fail_planning: false,
            fraction: 1.0,
            executions: 0,
            reflex_after: None,
        }
    }

    /// Report a reflex on `feed` once `executions` trajectories have run,
    /// as if the arm hit something during the last one.
    pub fn reflex_after(mut self, executions: usize, feed: FaultFeed) -> Self {
        self.reflex_after = Some((executions, feed));
        self
    }

    /// Report Cartesian plans as covering only `fraction` of the path.
    pub fn partial(mut self, fraction: f64) -> Self {
        self.fraction = fraction;
        self
    }

    /// Make every planning request fail.
    pub fn failing(mut self) -> Self {
        self.fail_planning = true;
        self
    }
}

impl MotionPlanner for SimulatedPlanner {
    fn plan_joint_target(&mut self, joints: &[f64]) -> Result<Plan> {
        self.journal.push(BackendCall::PlanJoints(joints.to_vec()));
        if self.fail_planning {
            return Err(CoreError::Planner("no joint-space path".to_string()));
        }
        Ok(Plan::new(PlanTarget::Joints(joints.to_vec()), 1.0))
    }

    fn plan_cartesian(
        &mut self,
        waypoints: &[Pose],
        _eef_step: f64,
        _jump_threshold: f64,
        constraint: Option<&PathConstraint>,
    ) -> Result<Plan> {
        self.journal.push(BackendCall::PlanCartesian {
            waypoints: waypoints.to_vec(),
            constraint_version: constraint.map(|c| c.version),
        });
        if self.fail_planning {
            return Err(CoreError::Planner("no cartesian path".to_string()));
        }
        Ok(Plan::new(PlanTarget::Cartesian(waypoints.to_vec()), self.fraction))
    }

    fn retime(&mut self, mut plan: Plan, velocity_scale: f64) -> Result<Plan> {
        self.journal.push(BackendCall::Retime(velocity_scale));
        plan.velocity_scale = velocity_scale;
        Ok(plan)
    }

    fn execute(&mut self, plan: &Plan, wait: bool) -> Result<()> {
        self.journal.push(BackendCall::Execute { wait });
        match &plan.target {
            PlanTarget::Joints(_) => self.pose = self.home_pose,
            PlanTarget::Cartesian(waypoints) => {
                if let Some(last) = waypoints.last() {
                    self.pose = *last;
                }
            }
        }
        self.executions += 1;
        if let Some((after, feed)) = &self.reflex_after {
            if self.executions >= *after {
                feed.report(RobotMode::Reflex);
            }
        }
        Ok(())
    }

    fn stop(&mut self) {
        self.journal.push(BackendCall::Stop);
    }

    fn clear_pose_targets(&mut self) {
        self.journal.push(BackendCall::ClearPoseTargets);
    }

    fn current_pose(&self) -> Pose {
        self.pose
    }

    fn end_effector_link(&self) -> &str {
        &self.ee_link
    }
}

/// Gripper that completes every command immediately.
pub struct SimulatedGripper {
    journal: Journal,
}

impl SimulatedGripper {
    pub fn new(journal: Journal) -> Self {
        SimulatedGripper { journal }
    }
}

impl GripperService for SimulatedGripper {
    fn move_to(&mut self, width: f64, speed: f64) -> Result<()> {
        self.journal.push(BackendCall::GripperMove { width, speed });
        Ok(())
    }

    fn grasp(&mut self, width: f64, speed: f64, force: f64, _epsilon: GraspEpsilon) -> Result<()> {
        self.journal.push(BackendCall::GripperGrasp {
            width,
            speed,
            force,
        });
        Ok(())
    }
}

pub struct SimulatedRecovery {
    journal: Journal,
}

impl SimulatedRecovery {
    pub fn new(journal: Journal) -> Self {
        SimulatedRecovery { journal }
    }
}

impl RecoveryChannel for SimulatedRecovery {
    fn request_recovery(&mut self) -> Result<()> {
        self.journal.push(BackendCall::RecoveryRequested);
        Ok(())
    }
}

/// Transform lookup answering with a fixed transform, or never.
pub struct StaticTransform(pub Option<Isometry3<f64>>);

impl TransformLookup for StaticTransform {
    fn try_lookup(&self, _target: &str, _source: &str) -> Option<Isometry3<f64>> {
        self.0
    }
}

/// Centroid estimator that reports the same base-frame point for every input.
pub struct FixedCentroid(pub Point3<f64>);

impl CentroidEstimator for FixedCentroid {
    fn estimate(
        &self,
        _depth: &DepthImage,
        _bbox: &BoundingBox,
        calibration: &CalibrationTransform,
    ) -> Result<Centroid> {
        let camera_xyz = calibration.extrinsic.inverse_transform_point(&self.0);
        Ok(Centroid {
            camera_xyz,
            base_xyz: self.0,
        })
    }
}

/// Gripper pointing straight down at a typical home location.
pub fn default_home_pose() -> Pose {
    Isometry3::from_parts(
        Translation3::new(0.307, 0.0, 0.487),
        UnitQuaternion::from_euler_angles(std::f64::consts::PI, 0.0, -std::f64::consts::FRAC_PI_4),
    )
}

/// A camera mounted above the workspace looking straight down.
pub fn default_extrinsic() -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(0.5, 0.0, 0.8),
        UnitQuaternion::from_euler_angles(std::f64::consts::PI, 0.0, 0.0),
    )
}

/// Backend with every collaborator simulated and a fixed perceived centroid.
pub fn backend(journal: &Journal, centroid: Point3<f64>) -> ExecutorBackend {
    ExecutorBackend {
        status: StatusTracker::new(),
        faults: FaultFeed::new(),
        planner: Box::new(SimulatedPlanner::new(journal.clone(), default_home_pose())),
        gripper: Box::new(SimulatedGripper::new(journal.clone())),
        recovery: Box::new(SimulatedRecovery::new(journal.clone())),
        transforms: Box::new(StaticTransform(Some(default_extrinsic()))),
        centroid: Box::new(FixedCentroid(centroid)),
        orientation: Box::new(YawRotation),
    }
}
