//! Pick/place task executor
//!
//! Sequences pose resolution, motion and gripper actuation for `pick` and
//! `place`, keeps the pose chain up to date, and runs fault recovery instead
//! of motion while the arm reports a reflex.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::common::{Pose, TaskInfo};
use crate::config::ExecutorConfig;
use crate::control::gateway::{MotionGateway, MotionOutcome, SafeBand};
use crate::control::gripper::{GripperController, GripperService};
use crate::control::planner::MotionPlanner;
use crate::control::status::StatusTracker;
use crate::error::{CoreError, Result};
use crate::fault::{FaultFeed, FaultMonitor, RecoveryChannel};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::perception::calibration::{CalibrationTransform, CameraIntrinsics, TransformLookup};
use crate::perception::centroid::CentroidEstimator;
use crate::perception::orientation::OrientationEstimator;
use crate::perception::{PoseResolver, ResolvedTarget};
use crate::task::chain::TaskChainTracker;

/// External collaborators the executor drives.
///
/// `status` and `faults` are shared flags written by asynchronous feeds; the
/// executor only reads them.
pub struct ExecutorBackend {
    pub status: StatusTracker,
    pub faults: FaultFeed,
    pub planner: Box<dyn MotionPlanner>,
    pub gripper: Box<dyn GripperService>,
    pub recovery: Box<dyn RecoveryChannel>,
    pub transforms: Box<dyn TransformLookup>,
    pub centroid: Box<dyn CentroidEstimator>,
    pub orientation: Box<dyn OrientationEstimator>,
}

/// Where the executor is within a pick or place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Homing,
    Approaching,
    Grasping,
    Releasing,
    Retreating,
    FaultRecovering,
}

/// How a pick or place call ended.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// All steps ran; the pose was recorded in the current chain slot.
    Completed(Pose),
    /// A fault was active, recovery ran and the remaining steps were dropped.
    Recovered,
}

/// Runs pick and place tasks on the arm.
pub struct TaskExecutor {
    base: LifecycleNodeBase,
    config: ExecutorConfig,
    gateway: MotionGateway,
    gripper: GripperController,
    faults: FaultMonitor,
    resolver: PoseResolver,
    chain: TaskChainTracker,
    transforms: Box<dyn TransformLookup>,
    calibration: Option<CalibrationTransform>,
    reference_pose: Option<Pose>,
    state: ExecutorState,
}

impl TaskExecutor {
    /// Wire up the executor. Nothing is moved or looked up until
    /// [`on_configure`](LifecycleNode::on_configure) and
    /// [`on_activate`](LifecycleNode::on_activate).
    pub fn new(config: ExecutorConfig, backend: ExecutorBackend) -> Self {
        let band = SafeBand {
            z_min: config.z_min,
            z_max: config.z_max,
        };
        let gateway = MotionGateway::new(
            backend.planner,
            backend.status,
            config.home_joints.clone(),
            band,
            &config.base_frame,
        );
        let gripper = GripperController::new(
            backend.gripper,
            config.enable_gripper,
            config.gripper.clone(),
        );
        let resolver = PoseResolver::new(
            backend.centroid,
            backend.orientation,
            config.rotation_unit_angle,
        );
        TaskExecutor {
            base: LifecycleNodeBase::new("task_executor"),
            chain: TaskChainTracker::new(config.slot_policy),
            faults: FaultMonitor::new(backend.faults, backend.recovery),
            transforms: backend.transforms,
            config,
            gateway,
            gripper,
            resolver,
            calibration: None,
            reference_pose: None,
            state: ExecutorState::Idle,
        }
    }

    /// Build, configure and activate in one go.
    pub fn start(config: ExecutorConfig, backend: ExecutorBackend) -> Result<Self> {
        let mut executor = TaskExecutor::new(config, backend);
        executor.on_configure()?;
        executor.on_activate()?;
        Ok(executor)
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    pub fn lifecycle_state(&self) -> State {
        self.base.get_state()
    }

    pub fn chain(&self) -> &TaskChainTracker {
        &self.chain
    }

    pub fn calibration(&self) -> Option<&CalibrationTransform> {
        self.calibration.as_ref()
    }

    /// End effector pose captured at the home position on activation.
    pub fn reference_pose(&self) -> Option<&Pose> {
        self.reference_pose.as_ref()
    }

    pub fn is_faulted(&self) -> bool {
        self.faults.is_faulted()
    }

    pub fn is_busy(&self) -> bool {
        self.gateway.is_busy()
    }

    pub fn gateway(&self) -> &MotionGateway {
        &self.gateway
    }

    /// Open a new chain slot for the next pick-place cycle.
    pub fn open_slot(&mut self) {
        self.chain.open_slot();
    }

    /// Drop every recorded pick and place pose.
    pub fn reset_task(&mut self) {
        self.chain.clear();
    }

    pub fn is_valid(&self) -> bool {
        self.chain.is_valid()
    }

    /// Whether the current slot holds both a pick and a place pose.
    pub fn data_exists(&self) -> bool {
        self.chain.has_current_pair()
    }

    pub fn stop(&mut self) {
        self.gateway.stop();
    }

    /// Stop motion and request fault recovery.
    pub fn recover(&mut self) {
        self.state = ExecutorState::FaultRecovering;
        self.faults.recover(&mut self.gateway);
    }

    /// Move to the home configuration, unless a fault is active.
    pub fn home(&mut self, wait: bool) -> MotionOutcome {
        if self.recover_if_faulted() {
            return MotionOutcome::Suppressed;
        }
        self.state = ExecutorState::Homing;
        self.gateway.go_home(wait)
    }

    /// Stop motion on shutdown.
    pub fn cleanup(&mut self) -> Result<()> {
        self.on_shutdown()
    }

    /// Grasp the detected object and lift it.
    pub fn pick(&mut self, task: &TaskInfo) -> Result<TaskOutcome> {
        let outcome = self.run_pick(task);
        self.settle();
        outcome
    }

    /// Move above the detected location and release the held object.
    pub fn place(&mut self, task: &TaskInfo) -> Result<TaskOutcome> {
        let outcome = self.run_place(task);
        self.settle();
        outcome
    }

    fn run_pick(&mut self, task: &TaskInfo) -> Result<TaskOutcome> {
        let (calibration, reference) = self.ready()?;
        if self.recover_if_faulted() {
            return Ok(TaskOutcome::Recovered);
        }
        self.ensure_slot()?;
        self.chain.reset_current_pick();

        // Start from home with nothing else in flight.
        self.gateway.stop();
        if self.home(true) == MotionOutcome::Suppressed {
            return Ok(TaskOutcome::Recovered);
        }

        let target = self.resolve(task, &calibration, &reference)?;
        let above = target.raised(self.config.pick_offset_up).pose();
        let below = target.raised(-self.config.pick_offset_down).pose();

        info!("moving towards pick object and opening gripper");
        self.state = ExecutorState::Approaching;
        if self.step(above, self.config.approach_scale) == MotionOutcome::Suppressed {
            return Ok(TaskOutcome::Recovered);
        }
        if !self.grip(false)? {
            return Ok(TaskOutcome::Recovered);
        }

        info!("moving down and grasping pick object");
        self.state = ExecutorState::Grasping;
        if self.step(below, self.config.descend_scale) == MotionOutcome::Suppressed {
            return Ok(TaskOutcome::Recovered);
        }
        if !self.grip(true)? {
            return Ok(TaskOutcome::Recovered);
        }

        info!("moving up again after picking object");
        self.state = ExecutorState::Retreating;
        if self.step(above, self.config.retreat_scale) == MotionOutcome::Suppressed {
            return Ok(TaskOutcome::Recovered);
        }

        let pose = target.pose();
        self.chain.record_pick(pose)?;
        Ok(TaskOutcome::Completed(pose))
    }

    fn run_place(&mut self, task: &TaskInfo) -> Result<TaskOutcome> {
        let (calibration, reference) = self.ready()?;
        if self.recover_if_faulted() {
            return Ok(TaskOutcome::Recovered);
        }
        self.ensure_slot()?;
        self.chain.reset_current_place();

        self.gateway.stop();
        if self.home(true) == MotionOutcome::Suppressed {
            return Ok(TaskOutcome::Recovered);
        }

        let target = self
            .resolve(task, &calibration, &reference)?
            .raised(self.config.place_offset_up);
        let pose = target.pose();

        info!("moving towards place location and opening gripper");
        self.state = ExecutorState::Approaching;
        if self.step(pose, self.config.place_scale) == MotionOutcome::Suppressed {
            return Ok(TaskOutcome::Recovered);
        }
        self.state = ExecutorState::Releasing;
        if !self.grip(false)? {
            return Ok(TaskOutcome::Recovered);
        }

        self.chain.record_place(pose)?;
        Ok(TaskOutcome::Completed(pose))
    }

    fn resolve(
        &self,
        task: &TaskInfo,
        calibration: &CalibrationTransform,
        reference: &Pose,
    ) -> Result<ResolvedTarget> {
        if let Some(rgb) = &task.rgb {
            debug!(width = rgb.width, height = rgb.height, "detection carries a color frame");
        }
        self.resolver.resolve(
            &task.depth,
            &task.bbox,
            task.rotation_class,
            calibration,
            &reference.rotation,
        )
    }

    // One Cartesian move, preceded by a fault check. Busy or failed moves are
    // logged by the gateway and skipped.
    fn step(&mut self, pose: Pose, velocity_scale: f64) -> MotionOutcome {
        if self.recover_if_faulted() {
            return MotionOutcome::Suppressed;
        }
        let outcome = self.gateway.execute_cartesian(&[pose], velocity_scale);
        if !outcome.is_executed() {
            warn!(?outcome, state = ?self.state, "motion step skipped");
        }
        outcome
    }

    // Close or open the gripper unless a fault came up during the last move.
    // Returns false when recovery ran instead.
    fn grip(&mut self, close: bool) -> Result<bool> {
        if self.recover_if_faulted() {
            return Ok(false);
        }
        if close {
            self.gripper.close()?;
        } else {
            self.gripper.open()?;
        }
        Ok(true)
    }

    fn recover_if_faulted(&mut self) -> bool {
        if !self.faults.is_faulted() {
            return false;
        }
        warn!("robot in reflex mode, recovering instead of moving");
        self.recover();
        true
    }

    fn ready(&self) -> Result<(CalibrationTransform, Pose)> {
        self.base.require(State::Active)?;
        let calibration = self
            .calibration
            .clone()
            .ok_or_else(|| CoreError::Lifecycle("calibration not resolved".to_string()))?;
        let reference = self
            .reference_pose
            .ok_or_else(|| CoreError::Lifecycle("home pose not captured".to_string()))?;
        Ok((calibration, reference))
    }

    // Refuse before any motion if the pose could not be recorded afterwards.
    fn ensure_slot(&self) -> Result<()> {
        if self.chain.can_record() {
            Ok(())
        } else {
            Err(CoreError::NoOpenSlot)
        }
    }

    fn settle(&mut self) {
        self.state = if self.faults.is_faulted() {
            ExecutorState::FaultRecovering
        } else {
            ExecutorState::Idle
        };
    }
}

impl LifecycleNode for TaskExecutor {
    fn on_configure(&mut self) -> Result<()> {
        self.base.require(State::Unconfigured)?;
        let calibration = CalibrationTransform::resolve(
            self.transforms.as_ref(),
            &self.config.base_frame,
            &self.config.camera_frame,
            CameraIntrinsics::default(),
            Duration::from_millis(self.config.calibration_timeout_ms),
        )?;
        self.calibration = Some(calibration);
        self.base.transition(&[State::Unconfigured], State::Inactive)
    }

    fn on_activate(&mut self) -> Result<()> {
        self.base.require(State::Inactive)?;
        let outcome = self.home(true);
        if !outcome.is_executed() {
            warn!(?outcome, "could not reach home during activation");
        }
        self.settle();
        let pose = self.gateway.current_pose();
        info!(
            "end effector pose at home location: xyz {:?}, quaternion {:?}",
            pose.translation.vector,
            pose.rotation.coords
        );
        self.reference_pose = Some(pose);
        self.base.transition(&[State::Inactive], State::Active)
    }

    fn on_deactivate(&mut self) -> Result<()> {
        self.base.transition(&[State::Active], State::Inactive)?;
        self.gateway.stop();
        Ok(())
    }

    fn on_cleanup(&mut self) -> Result<()> {
        self.base.transition(&[State::Inactive], State::Unconfigured)?;
        self.gateway.stop();
        self.chain.clear();
        self.calibration = None;
        self.reference_pose = None;
        Ok(())
    }

    fn on_shutdown(&mut self) -> Result<()> {
        self.gateway.stop();
        self.base.transition(
            &[State::Unconfigured, State::Inactive, State::Active],
            State::Finalized,
        )
    }
}
