//! Executor configuration: loaded from an optional TOML file, then overridden
//! by `PICKPLACE__*` environment variables (double underscore for nesting,
//! e.g. `PICKPLACE__TASKEXECUTOR__ENABLE_GRIPPER=false`).

use std::path::Path;

use serde::Deserialize;

use crate::error::Result;
use crate::task::chain::SlotPolicy;

/// Configuration root.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub taskexecutor: ExecutorConfig,
}

/// `[taskexecutor]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Gates every gripper actuation call. Disable to run without hardware.
    pub enable_gripper: bool,
    /// Yaw increment per rotation class, in degrees.
    pub rotation_unit_angle: f64,
    pub pick_offset_up: f64,
    pub pick_offset_down: f64,
    pub place_offset_up: f64,
    pub approach_scale: f64,
    pub descend_scale: f64,
    pub retreat_scale: f64,
    pub place_scale: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub home_joints: Vec<f64>,
    pub calibration_timeout_ms: u64,
    pub slot_policy: SlotPolicy,
    pub base_frame: String,
    pub camera_frame: String,
    pub gripper: GripperConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig {
            enable_gripper: true,
            rotation_unit_angle: 10.0,
            pick_offset_up: 0.035,
            pick_offset_down: 0.02,
            place_offset_up: 0.080,
            approach_scale: 0.4,
            descend_scale: 0.05,
            retreat_scale: 0.1,
            place_scale: 0.2,
            z_min: 0.01,
            z_max: 0.30,
            home_joints: vec![
                0.000_247_288_275_628_836_3,
                -0.785_446_997_115_486_5,
                0.000_207_621_823_557_195_05,
                -2.357_376_597_430_856_7,
                0.000_845_001_633_062_850_8,
                1.571_564_247_316_784_3,
                0.785_755_505_845_189_8,
            ],
            calibration_timeout_ms: 4000,
            slot_policy: SlotPolicy::AutoOpen,
            base_frame: "panda_link0".to_string(),
            camera_frame: "camera_color_optical_frame".to_string(),
            gripper: GripperConfig::default(),
        }
    }
}

/// `[taskexecutor.gripper]` section: parallel gripper parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GripperConfig {
    pub open_width: f64,
    pub open_speed: f64,
    pub close_width: f64,
    pub close_speed: f64,
    /// Grasp force in newtons (hardware limits 0.01 - 50 N).
    pub force: f64,
    pub epsilon_inner: f64,
    pub epsilon_outer: f64,
}

impl Default for GripperConfig {
    fn default() -> Self {
        GripperConfig {
            open_width: 0.08,
            open_speed: 0.1,
            close_width: 0.0,
            close_speed: 0.1,
            force: 5.0,
            epsilon_inner: 0.08,
            epsilon_outer: 0.08,
        }
    }
}

impl AppConfig {
    /// Load from `path` (if given) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("PICKPLACE")
                .separator("__")
                .try_parsing(true),
        );
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Parse a TOML document, without environment overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;
        Ok(cfg.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_hardware_setup() {
        let cfg = ExecutorConfig::default();
        assert!(cfg.enable_gripper);
        assert_eq!(cfg.rotation_unit_angle, 10.0);
        assert_eq!(cfg.home_joints.len(), 7);
        assert_eq!((cfg.z_min, cfg.z_max), (0.01, 0.30));
        assert_eq!(cfg.slot_policy, SlotPolicy::AutoOpen);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [taskexecutor]
            enable_gripper = false
            slot_policy = "require_open_slot"

            [taskexecutor.gripper]
            force = 12.5
            "#,
        )
        .unwrap();
        let te = cfg.taskexecutor;
        assert!(!te.enable_gripper);
        assert_eq!(te.slot_policy, SlotPolicy::RequireOpenSlot);
        assert_eq!(te.gripper.force, 12.5);
        assert_eq!(te.gripper.open_width, 0.08);
        assert_eq!(te.place_offset_up, 0.080);
    }

    #[test]
    fn test_empty_document_is_default() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert!(cfg.taskexecutor.enable_gripper);
        assert_eq!(cfg.taskexecutor.calibration_timeout_ms, 4000);
    }
}
