//! Orientation path constraints applied to Cartesian motions

use nalgebra::UnitQuaternion;

/// Orientation-only constraint on the end effector during a Cartesian path.
///
/// Created once per successful home and never mutated afterwards; a newer
/// home produces a new value with a higher `version`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathConstraint {
    pub name: String,
    pub version: u64,
    pub link_name: String,
    pub frame_id: String,
    pub orientation: UnitQuaternion<f64>,
    /// Absolute tolerances about x, y, z in radians.
    pub tolerance: [f64; 3],
    pub weight: f64,
}

impl PathConstraint {
    pub const YAW_ONLY: &'static str = "yawonly";

    /// Free rotation about the vertical axis, +-0.1 rad on the other two.
    pub fn yaw_only(
        version: u64,
        link_name: &str,
        frame_id: &str,
        orientation: UnitQuaternion<f64>,
    ) -> Self {
        PathConstraint {
            name: Self::YAW_ONLY.to_string(),
            version,
            link_name: link_name.to_string(),
            frame_id: frame_id.to_string(),
            orientation,
            tolerance: [0.1, 0.1, std::f64::consts::PI],
            weight: 1.0,
        }
    }
}
