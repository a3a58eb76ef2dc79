//! Perception module: target pose derivation from detections
pub mod calibration;
pub mod centroid;
pub mod orientation;

use nalgebra::{Point3, UnitQuaternion, Vector3};
use tracing::info;

use self::calibration::CalibrationTransform;
use self::centroid::CentroidEstimator;
use self::orientation::OrientationEstimator;
use crate::common::{pose_from_parts, BoundingBox, DepthImage, Pose};
use crate::error::Result;

/// A resolved grasp or release target in the base frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedTarget {
    pub camera_xyz: Point3<f64>,
    pub target_xyz: Point3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl ResolvedTarget {
    pub fn pose(&self) -> Pose {
        pose_from_parts(self.target_xyz.coords, self.orientation)
    }

    /// The same target shifted by `dz` along the base z axis.
    pub fn raised(&self, dz: f64) -> Self {
        ResolvedTarget {
            target_xyz: self.target_xyz + Vector3::new(0.0, 0.0, dz),
            ..*self
        }
    }
}

/// Computes target poses from perception output and calibration.
pub struct PoseResolver {
    centroid: Box<dyn CentroidEstimator>,
    orientation: Box<dyn OrientationEstimator>,
    /// Degrees per rotation class.
    rotation_unit_angle: f64,
}

impl PoseResolver {
    pub fn new(
        centroid: Box<dyn CentroidEstimator>,
        orientation: Box<dyn OrientationEstimator>,
        rotation_unit_angle: f64,
    ) -> Self {
        PoseResolver {
            centroid,
            orientation,
            rotation_unit_angle,
        }
    }

    /// Resolve the target for a detection. The orientation is `reference`
    /// rotated by `rotation_class * rotation_unit_angle`.
    pub fn resolve(
        &self,
        depth: &DepthImage,
        bbox: &BoundingBox,
        rotation_class: u32,
        calibration: &CalibrationTransform,
        reference: &UnitQuaternion<f64>,
    ) -> Result<ResolvedTarget> {
        let centroid = self.centroid.estimate(depth, bbox, calibration)?;
        let angle = rotation_class as f64 * self.rotation_unit_angle;
        let orientation = self.orientation.orient(reference, angle);
        info!(
            camera_xyz = ?centroid.camera_xyz,
            target_xyz = ?centroid.base_xyz,
            angle,
            "resolved target"
        );
        Ok(ResolvedTarget {
            camera_xyz: centroid.camera_xyz,
            target_xyz: centroid.base_xyz,
            orientation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::calibration::CameraIntrinsics;
    use crate::perception::orientation::YawRotation;
    use crate::sim::{default_extrinsic, default_home_pose, FixedCentroid};
    use approx::assert_relative_eq;

    fn resolver() -> PoseResolver {
        PoseResolver::new(
            Box::new(FixedCentroid(Point3::new(0.3, 0.0, 0.05))),
            Box::new(YawRotation),
            10.0,
        )
    }

    fn resolve(rotation_class: u32) -> ResolvedTarget {
        let calibration =
            CalibrationTransform::new(default_extrinsic(), CameraIntrinsics::default());
        resolver()
            .resolve(
                &DepthImage::filled(4, 4, 0.7),
                &BoundingBox::new(0, 0, 4, 4),
                rotation_class,
                &calibration,
                &default_home_pose().rotation,
            )
            .unwrap()
    }

    #[test]
    fn test_rotation_class_zero_keeps_reference() {
        let target = resolve(0);
        assert_eq!(target.orientation, default_home_pose().rotation);
        assert_relative_eq!(target.target_xyz, Point3::new(0.3, 0.0, 0.05));
    }

    #[test]
    fn test_rotation_class_is_quantized_yaw() {
        let reference = default_home_pose().rotation;
        for class in [1u32, 2, 9, 35] {
            let target = resolve(class);
            let delta = target.orientation * reference.inverse();
            let expected = (class as f64 * 10.0).to_radians();
            let wrapped = expected.min(2.0 * std::f64::consts::PI - expected);
            assert_relative_eq!(delta.angle(), wrapped, epsilon = 1e-9);
            let axis = delta.axis().unwrap();
            assert_relative_eq!(axis.z.abs(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_raised_target_shifts_only_z() {
        let target = resolve(2);
        let raised = target.raised(0.08);
        assert_relative_eq!(raised.target_xyz, Point3::new(0.3, 0.0, 0.13), epsilon = 1e-12);
        assert_eq!(raised.orientation, target.orientation);
        assert_eq!(raised.camera_xyz, target.camera_xyz);
    }
}
