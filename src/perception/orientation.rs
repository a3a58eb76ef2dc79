//! Target orientation from a reference orientation and a yaw angle

use nalgebra::{UnitQuaternion, Vector3};

/// Trait for deriving a target orientation.
pub trait OrientationEstimator: Send {
    /// Rotate `reference` by `angle_deg` degrees.
    fn orient(&self, reference: &UnitQuaternion<f64>, angle_deg: f64) -> UnitQuaternion<f64>;
}

/// Rotation about the base frame's vertical axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct YawRotation;

impl OrientationEstimator for YawRotation {
    fn orient(&self, reference: &UnitQuaternion<f64>, angle_deg: f64) -> UnitQuaternion<f64> {
        UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angle_deg.to_radians()) * reference
    }
}
