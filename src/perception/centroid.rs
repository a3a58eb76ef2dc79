//! 3D centroid estimation from a depth frame and a bounding box

use nalgebra::{Point3, Vector3};

use crate::common::{BoundingBox, DepthImage};
use crate::error::{CoreError, Result};
use crate::perception::calibration::CalibrationTransform;

/// A detection centroid in both frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Centroid {
    pub camera_xyz: Point3<f64>,
    pub base_xyz: Point3<f64>,
}

/// Trait for turning a detection into a 3D point.
///
/// Degenerate boxes and frames without usable depth are the estimator's to
/// report; the resolver passes its error through unchanged.
pub trait CentroidEstimator: Send {
    fn estimate(
        &self,
        depth: &DepthImage,
        bbox: &BoundingBox,
        calibration: &CalibrationTransform,
    ) -> Result<Centroid>;
}

/// Averages the back-projected points of every valid depth pixel in the box.
#[derive(Debug, Clone, Copy, Default)]
pub struct AverageDepthCentroid;

impl CentroidEstimator for AverageDepthCentroid {
    fn estimate(
        &self,
        depth: &DepthImage,
        bbox: &BoundingBox,
        calibration: &CalibrationTransform,
    ) -> Result<Centroid> {
        if bbox.is_empty() {
            return Err(CoreError::Perception(format!("empty bounding box {:?}", bbox)));
        }
        let region = bbox.clipped(depth.width, depth.height);
        if region.is_empty() {
            return Err(CoreError::Perception(format!(
                "bounding box {:?} is empty after clipping to {}x{}",
                bbox, depth.width, depth.height
            )));
        }

        let mut sum = Vector3::zeros();
        let mut count = 0usize;
        for (u, v) in region.pixels() {
            // Zero depth marks a missing measurement.
            let Some(z) = depth.get(u, v).filter(|z| z.is_finite() && *z > 0.0) else {
                continue;
            };
            let p = calibration.intrinsic.deproject(u as f64, v as f64, z as f64);
            sum += p.coords;
            count += 1;
        }

        if count == 0 {
            return Err(CoreError::Perception(format!(
                "no valid depth inside bounding box {:?}",
                bbox
            )));
        }

        let camera_xyz = Point3::from(sum / count as f64);
        Ok(Centroid {
            camera_xyz,
            base_xyz: calibration.camera_to_base(&camera_xyz),
        })
    }
}
