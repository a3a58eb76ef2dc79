//! Camera calibration: fixed pinhole intrinsics and the camera-to-base extrinsic

use std::thread;
use std::time::{Duration, Instant};

use nalgebra::{Isometry3, Matrix3, Point3};
use tracing::{debug, info};

use crate::error::{CoreError, Result};

const LOOKUP_POLL: Duration = Duration::from_millis(10);

/// Pinhole camera model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraIntrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Default for CameraIntrinsics {
    /// Factory calibration of the color stream at 640x480.
    fn default() -> Self {
        CameraIntrinsics {
            fx: 609.960_083_007_812_5,
            fy: 609.995_544_433_593_8,
            cx: 336.724_822_998_046_9,
            cy: 249.562_713_623_046_88,
        }
    }
}

impl CameraIntrinsics {
    pub fn matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// Back-project pixel (u, v) at depth `z` into the camera optical frame.
    pub fn deproject(&self, u: f64, v: f64, z: f64) -> Point3<f64> {
        // X = (u - cx) / fx * z, Y = (v - cy) / fy * z
        Point3::new((u - self.cx) / self.fx * z, (v - self.cy) / self.fy * z, z)
    }
}

/// Source of frame transforms, e.g. a transform tree listener.
pub trait TransformLookup: Send {
    /// The transform mapping points in `source` into `target`, if known yet.
    fn try_lookup(&self, target: &str, source: &str) -> Option<Isometry3<f64>>;
}

/// Extrinsic and intrinsic calibration, fixed after startup.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTransform {
    /// Maps camera optical frame points into the robot base frame.
    pub extrinsic: Isometry3<f64>,
    pub intrinsic: CameraIntrinsics,
}

impl CalibrationTransform {
    pub fn new(extrinsic: Isometry3<f64>, intrinsic: CameraIntrinsics) -> Self {
        CalibrationTransform {
            extrinsic,
            intrinsic,
        }
    }

    /// Poll `lookup` for the `camera_frame` to `base_frame` transform until it
    /// appears or `timeout` elapses. Timing out is a startup failure.
    pub fn resolve(
        lookup: &dyn TransformLookup,
        base_frame: &str,
        camera_frame: &str,
        intrinsic: CameraIntrinsics,
        timeout: Duration,
    ) -> Result<Self> {
        let started = Instant::now();
        loop {
            if let Some(extrinsic) = lookup.try_lookup(base_frame, camera_frame) {
                info!("camera intrinsic: {:?}", intrinsic.matrix());
                info!(
                    "camera-to-base extrinsic: xyz {:?}, quaternion {:?}",
                    extrinsic.translation.vector,
                    extrinsic.rotation.coords
                );
                return Ok(CalibrationTransform::new(extrinsic, intrinsic));
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(CoreError::CalibrationTimeout {
                    target: base_frame.to_string(),
                    source_frame: camera_frame.to_string(),
                    waited,
                });
            }
            debug!(?waited, "waiting for camera transform");
            thread::sleep(LOOKUP_POLL.min(timeout - waited));
        }
    }

    pub fn camera_to_base(&self, point: &Point3<f64>) -> Point3<f64> {
        self.extrinsic.transform_point(point)
    }
}
