use std::path::Path;

use approx::assert_relative_eq;
use nalgebra::{Point3, UnitQuaternion};
use pickplace_core::control::status::GoalStatus;
use pickplace_core::fault::RobotMode;
use pickplace_core::perception::centroid::AverageDepthCentroid;
use pickplace_core::sim::{self, BackendCall, Journal, SimulatedPlanner, StaticTransform};
use pickplace_core::{
    AppConfig, BoundingBox, CoreError, DepthImage, ExecutorConfig, Pose, SlotPolicy, TaskExecutor,
    TaskInfo, TaskOutcome,
};

fn detection(rotation_class: u32) -> TaskInfo {
    TaskInfo::new(
        DepthImage::filled(16, 16, 0.75),
        BoundingBox::new(4, 4, 12, 12),
        rotation_class,
    )
}

fn start(journal: &Journal, centroid: Point3<f64>, config: ExecutorConfig) -> TaskExecutor {
    let executor = TaskExecutor::start(config, sim::backend(journal, centroid)).unwrap();
    journal.clear();
    executor
}

fn completed(outcome: TaskOutcome) -> Pose {
    match outcome {
        TaskOutcome::Completed(pose) => pose,
        other => panic!("expected a completed task, got {:?}", other),
    }
}

#[test]
fn pick_then_place_fills_one_slot() {
    let journal = Journal::new();
    let mut executor = start(&journal, Point3::new(0.3, 0.0, 0.05), ExecutorConfig::default());

    executor.open_slot();
    let picked = completed(executor.pick(&detection(2)).unwrap());

    let reference = sim::default_home_pose().rotation;
    let expected = UnitQuaternion::from_euler_angles(0.0, 0.0, 20f64.to_radians()) * reference;
    assert_relative_eq!(picked.translation.vector.z, 0.05, epsilon = 1e-12);
    assert_relative_eq!(picked.rotation, expected, epsilon = 1e-9);
    assert_eq!(executor.chain().current_pick(), Some(&picked));

    // Approach, descend, retreat; every waypoint keeps the resolved orientation.
    let moves = journal.cartesian_waypoints();
    let zs: Vec<f64> = moves.iter().map(|m| m[0].translation.vector.z).collect();
    assert_eq!(moves.len(), 3);
    assert_relative_eq!(zs[0], 0.085, epsilon = 1e-12);
    assert_relative_eq!(zs[1], 0.03, epsilon = 1e-12);
    assert_relative_eq!(zs[2], 0.085, epsilon = 1e-12);

    let gripper: Vec<_> = journal
        .calls()
        .into_iter()
        .filter(|c| matches!(c, BackendCall::GripperMove { .. } | BackendCall::GripperGrasp { .. }))
        .collect();
    assert!(matches!(gripper[0], BackendCall::GripperMove { .. }));
    assert!(matches!(gripper[1], BackendCall::GripperGrasp { .. }));
    assert!(!executor.data_exists());

    journal.clear();
    let placed = completed(executor.place(&detection(0)).unwrap());
    assert_relative_eq!(placed.translation.vector.z, 0.13, epsilon = 1e-12);
    assert_relative_eq!(placed.rotation, reference, epsilon = 1e-12);
    assert_eq!(journal.cartesian_waypoints().len(), 1);
    assert_eq!(
        journal.calls().last(),
        Some(&BackendCall::GripperMove {
            width: 0.08,
            speed: 0.1
        })
    );

    assert!(executor.is_valid());
    assert!(executor.data_exists());
    assert_eq!(executor.chain().len(), 1);
}

#[test]
fn active_fault_runs_recovery_only() {
    let journal = Journal::new();
    let backend = sim::backend(&journal, Point3::new(0.3, 0.0, 0.05));
    let feed = backend.faults.clone();
    let mut executor = TaskExecutor::start(ExecutorConfig::default(), backend).unwrap();
    executor.open_slot();
    journal.clear();

    feed.report(RobotMode::Reflex);
    assert_eq!(executor.pick(&detection(0)).unwrap(), TaskOutcome::Recovered);
    assert_eq!(executor.place(&detection(0)).unwrap(), TaskOutcome::Recovered);

    assert!(journal.calls().iter().all(|c| !c.is_actuation()));
    assert_eq!(
        journal
            .calls()
            .iter()
            .filter(|c| **c == BackendCall::RecoveryRequested)
            .count(),
        2
    );
    assert_eq!(executor.chain().picks(), &[None::<Pose>]);
    assert_eq!(executor.chain().places(), &[None::<Pose>]);
}

#[test]
fn fault_between_pick_and_place_leaves_slot_incomplete() {
    let journal = Journal::new();
    let backend = sim::backend(&journal, Point3::new(0.3, 0.0, 0.05));
    let feed = backend.faults.clone();
    let mut executor = TaskExecutor::start(ExecutorConfig::default(), backend).unwrap();

    executor.open_slot();
    completed(executor.pick(&detection(1)).unwrap());
    feed.report(RobotMode::Reflex);
    assert_eq!(executor.place(&detection(0)).unwrap(), TaskOutcome::Recovered);

    assert!(executor.chain().current_pick().is_some());
    assert!(executor.chain().current_place().is_none());
    assert!(!executor.is_valid());
    assert!(!executor.data_exists());

    // Once the arm reports a normal mode again, the place can be retried.
    feed.report(RobotMode::Idle);
    completed(executor.place(&detection(0)).unwrap());
    assert!(executor.is_valid());
}

#[test]
fn reflex_during_descend_skips_grasp_and_record() {
    let journal = Journal::new();
    let mut backend = sim::backend(&journal, Point3::new(0.3, 0.0, 0.05));
    // Executions: activation home, pick home, approach, descend.
    backend.planner = Box::new(
        SimulatedPlanner::new(journal.clone(), sim::default_home_pose())
            .reflex_after(4, backend.faults.clone()),
    );
    let mut executor = TaskExecutor::start(ExecutorConfig::default(), backend).unwrap();
    executor.open_slot();
    journal.clear();

    assert_eq!(executor.pick(&detection(0)).unwrap(), TaskOutcome::Recovered);
    assert_eq!(journal.cartesian_waypoints().len(), 2);
    assert!(!journal
        .calls()
        .iter()
        .any(|c| matches!(c, BackendCall::GripperGrasp { .. })));
    assert!(executor.chain().current_pick().is_none());
}

#[test]
fn busy_arm_drops_moves_and_keeps_going() {
    let journal = Journal::new();
    let backend = sim::backend(&journal, Point3::new(0.3, 0.0, 0.05));
    let status = backend.status.clone();
    let mut executor = TaskExecutor::start(ExecutorConfig::default(), backend).unwrap();
    executor.open_slot();
    journal.clear();

    status.apply_report(&[GoalStatus::Succeeded.code(), GoalStatus::Active.code()]);
    assert!(executor.is_busy());
    completed(executor.pick(&detection(0)).unwrap());

    assert!(journal
        .calls()
        .iter()
        .all(|c| !matches!(c, BackendCall::PlanJoints(_) | BackendCall::PlanCartesian { .. })));
    // The gripper is not gated by the busy check.
    assert!(journal
        .calls()
        .iter()
        .any(|c| matches!(c, BackendCall::GripperGrasp { .. })));
}

#[test]
fn disabled_gripper_never_actuates() {
    let journal = Journal::new();
    let config = ExecutorConfig {
        enable_gripper: false,
        ..ExecutorConfig::default()
    };
    let mut executor = start(&journal, Point3::new(0.3, 0.0, 0.05), config);

    executor.open_slot();
    completed(executor.pick(&detection(0)).unwrap());
    completed(executor.place(&detection(0)).unwrap());

    assert!(!journal
        .calls()
        .iter()
        .any(|c| matches!(c, BackendCall::GripperMove { .. } | BackendCall::GripperGrasp { .. })));
    assert_eq!(journal.cartesian_waypoints().len(), 4);
    assert!(executor.is_valid());
}

#[test]
fn auto_open_records_without_explicit_slot() {
    let journal = Journal::new();
    let mut executor = start(&journal, Point3::new(0.3, 0.0, 0.05), ExecutorConfig::default());

    completed(executor.place(&detection(0)).unwrap());
    assert_eq!(executor.chain().len(), 1);
    assert!(executor.chain().current_pick().is_none());
    assert!(!executor.is_valid());
}

#[test]
fn strict_slots_reject_pick_before_any_motion() {
    let journal = Journal::new();
    let config = ExecutorConfig {
        slot_policy: SlotPolicy::RequireOpenSlot,
        ..ExecutorConfig::default()
    };
    let mut executor = start(&journal, Point3::new(0.3, 0.0, 0.05), config);

    assert!(matches!(executor.pick(&detection(0)), Err(CoreError::NoOpenSlot)));
    assert!(journal.calls().is_empty());
    assert!(executor.chain().is_empty());
}

#[test]
fn missing_camera_transform_fails_startup() {
    let journal = Journal::new();
    let mut backend = sim::backend(&journal, Point3::origin());
    backend.transforms = Box::new(StaticTransform(None));
    let config = ExecutorConfig {
        calibration_timeout_ms: 25,
        ..ExecutorConfig::default()
    };
    match TaskExecutor::start(config, backend) {
        Err(CoreError::CalibrationTimeout { source_frame, .. }) => {
            assert_eq!(source_frame, "camera_color_optical_frame")
        }
        Err(other) => panic!("unexpected error {}", other),
        Ok(_) => panic!("startup should fail without a camera transform"),
    }
}

#[test]
fn depth_centroid_drives_pick_height() {
    let journal = Journal::new();
    let mut backend = sim::backend(&journal, Point3::origin());
    backend.centroid = Box::new(AverageDepthCentroid);
    let mut executor = TaskExecutor::start(ExecutorConfig::default(), backend).unwrap();
    executor.open_slot();

    // Camera 0.8 m above the base plane, object surface at 0.75 m depth.
    let task = TaskInfo::new(
        DepthImage::filled(640, 480, 0.75),
        BoundingBox::new(332, 245, 342, 255),
        0,
    );
    let picked = completed(executor.pick(&task).unwrap());
    assert_relative_eq!(picked.translation.vector.z, 0.05, epsilon = 1e-9);
    assert_relative_eq!(picked.translation.vector.x, 0.5, epsilon = 1e-2);
}

#[test]
fn oversized_detection_box_is_clipped_to_frame() {
    let journal = Journal::new();
    let mut backend = sim::backend(&journal, Point3::origin());
    backend.centroid = Box::new(AverageDepthCentroid);
    let mut executor = TaskExecutor::start(ExecutorConfig::default(), backend).unwrap();
    executor.open_slot();

    let task = TaskInfo::new(
        DepthImage::filled(64, 48, 0.75),
        BoundingBox::new(0, 0, usize::MAX, usize::MAX),
        0,
    );
    let picked = completed(executor.pick(&task).unwrap());
    assert_relative_eq!(picked.translation.vector.z, 0.05, epsilon = 1e-9);
}

#[test]
fn missing_depth_is_a_perception_error() {
    let journal = Journal::new();
    let mut backend = sim::backend(&journal, Point3::origin());
    backend.centroid = Box::new(AverageDepthCentroid);
    let mut executor = TaskExecutor::start(ExecutorConfig::default(), backend).unwrap();
    executor.open_slot();
    journal.clear();

    let task = TaskInfo::new(DepthImage::filled(16, 16, 0.0), BoundingBox::new(4, 4, 12, 12), 0);
    assert!(matches!(executor.pick(&task), Err(CoreError::Perception(_))));
    assert!(journal.cartesian_waypoints().is_empty());
    assert!(executor.chain().current_pick().is_none());
}

#[test]
fn reset_task_clears_chain() {
    let journal = Journal::new();
    let mut executor = start(&journal, Point3::new(0.3, 0.0, 0.05), ExecutorConfig::default());
    executor.open_slot();
    completed(executor.pick(&detection(0)).unwrap());
    completed(executor.place(&detection(0)).unwrap());
    executor.open_slot();

    executor.reset_task();
    assert!(executor.chain().is_empty());
    assert!(executor.is_valid());
    assert!(!executor.data_exists());
}

#[test]
fn sample_config_file_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/taskexecutor.toml");
    let config = AppConfig::load(Some(path.as_path())).unwrap();
    let defaults = ExecutorConfig::default();
    assert_eq!(config.taskexecutor.home_joints, defaults.home_joints);
    assert_eq!(config.taskexecutor.slot_policy, SlotPolicy::AutoOpen);
    assert_eq!(config.taskexecutor.gripper.force, 5.0);
}
