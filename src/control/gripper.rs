//! Parallel gripper control

use tracing::{debug, info};

use crate::config::GripperConfig;
use crate::error::Result;

/// Tolerance on the grasp width for the grasp to count as successful.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraspEpsilon {
    pub inner: f64,
    pub outer: f64,
}

/// Trait for the external actuation service. Both calls block until the
/// service reports a result.
pub trait GripperService: Send {
    fn move_to(&mut self, width: f64, speed: f64) -> Result<()>;

    fn grasp(&mut self, width: f64, speed: f64, force: f64, epsilon: GraspEpsilon) -> Result<()>;
}

/// Opens and closes the gripper, or does nothing when actuation is disabled.
pub struct GripperController {
    service: Box<dyn GripperService>,
    enabled: bool,
    params: GripperConfig,
}

impl GripperController {
    pub fn new(service: Box<dyn GripperService>, enabled: bool, params: GripperConfig) -> Self {
        if !enabled {
            info!("gripper actuation disabled by configuration");
        }
        GripperController {
            service,
            enabled,
            params,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn open(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        debug!(width = self.params.open_width, "opening gripper");
        self.service
            .move_to(self.params.open_width, self.params.open_speed)
    }

    /// Grasp by closing the fingers with the configured force.
    pub fn close(&mut self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        debug!(force = self.params.force, "closing gripper");
        self.service.grasp(
            self.params.close_width,
            self.params.close_speed,
            self.params.force,
            GraspEpsilon {
                inner: self.params.epsilon_inner,
                outer: self.params.epsilon_outer,
            },
        )
    }
}
