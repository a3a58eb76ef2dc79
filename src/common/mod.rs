//! Common types shared across the executor

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};

/// A Cartesian pose of the tool center point, expressed in the robot base frame.
pub type Pose = Isometry3<f64>;

/// Build a pose from a position and an orientation.
pub fn pose_from_parts(xyz: Vector3<f64>, orientation: UnitQuaternion<f64>) -> Pose {
    Pose::from_parts(Translation3::from(xyz), orientation)
}

/// Depth frame in meters, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl DepthImage {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        DepthImage {
            width,
            height,
            data,
        }
    }

    /// A frame with every pixel at the same depth.
    pub fn filled(width: usize, height: usize, depth: f32) -> Self {
        DepthImage::new(width, height, vec![depth; width * height])
    }

    /// Depth at pixel (u, v), or `None` outside the frame.
    pub fn get(&self, u: usize, v: usize) -> Option<f32> {
        if u >= self.width || v >= self.height {
            return None;
        }
        self.data.get(v * self.width + u).copied()
    }
}

/// Color frame, packed RGB8, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

/// Axis-aligned image-space box, inclusive min and exclusive max pixel bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x_min: usize,
    pub y_min: usize,
    pub x_max: usize,
    pub y_max: usize,
}

impl BoundingBox {
    pub fn new(x_min: usize, y_min: usize, x_max: usize, y_max: usize) -> Self {
        BoundingBox {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x_max <= self.x_min || self.y_max <= self.y_min
    }

    /// The part of the box inside a `width` x `height` frame.
    pub fn clipped(&self, width: usize, height: usize) -> Self {
        BoundingBox {
            x_min: self.x_min.min(width),
            y_min: self.y_min.min(height),
            x_max: self.x_max.min(width),
            y_max: self.y_max.min(height),
        }
    }

    /// Iterate over all pixel coordinates inside the box.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.y_min..self.y_max).flat_map(move |v| (self.x_min..self.x_max).map(move |u| (u, v)))
    }
}

/// One perception result: the input to a single pick or place call.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub depth: DepthImage,
    pub bbox: BoundingBox,
    /// Discrete yaw index; the yaw angle is `rotation_class * rotation_unit_angle`.
    pub rotation_class: u32,
    /// Color frame the detection was made on. Not used for pose derivation.
    pub rgb: Option<RgbImage>,
}

impl TaskInfo {
    pub fn new(depth: DepthImage, bbox: BoundingBox, rotation_class: u32) -> Self {
        TaskInfo {
            depth,
            bbox,
            rotation_class,
            rgb: None,
        }
    }

    pub fn with_rgb(mut self, rgb: RgbImage) -> Self {
        self.rgb = Some(rgb);
        self
    }
}
