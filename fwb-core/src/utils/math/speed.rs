//! Encoder tick to wheel speed conversion.
//!
//! The board reports how many ticks each wheel moved during its own fixed
//! sample window. Speed is `(ticks / ticks_per_rev) * 60 / interval_s`.
//!
//! # Example
//! ```rust
//! use fwb_core::utils::math::speed::SpeedModel;
//! let model = SpeedModel::new(2340, 0.01).unwrap();
//! assert!((model.rpm(1170) - 3000.0).abs() < 1e-3);
//! ```

use crate::utils::config::{Calibration, ConfigError, MotorConfig};

/// Validated constants for turning tick deltas into RPM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedModel {
    ticks_per_revolution: f32,
    sample_interval_s: f32,
}

impl SpeedModel {
    /// Build a model, rejecting constants that would divide by zero.
    pub fn new(
        ticks_per_revolution: u32,
        sample_interval_s: f32,
    ) -> Result<Self, ConfigError> {
        if ticks_per_revolution == 0 {
            return Err(ConfigError::ZeroTicksPerRevolution);
        }
        if !(sample_interval_s.is_finite() && sample_interval_s > 0.0) {
            return Err(ConfigError::ZeroSampleInterval);
        }
        Ok(Self {
            ticks_per_revolution: ticks_per_revolution as f32,
            sample_interval_s,
        })
    }

    /// Build a model from the motor written to the board.
    pub fn from_config(
        motor: &MotorConfig,
        calibration: &Calibration,
    ) -> Result<Self, ConfigError> {
        Self::new(
            calibration.ticks_per_revolution(motor),
            calibration.sample_interval_s,
        )
    }

    /// Wheel speed in RPM for one sample window's tick delta.
    pub fn rpm(
        &self,
        ticks: i32,
    ) -> f32 {
        (ticks as f32 / self.ticks_per_revolution) * 60.0 / self.sample_interval_s
    }

    /// Convert all four wheel deltas at once.
    pub fn wheel_rpm(
        &self,
        deltas: [i16; 4],
    ) -> [f32; 4] {
        deltas.map(|t| self.rpm(t as i32))
    }

    pub fn ticks_per_revolution(&self) -> f32 {
        self.ticks_per_revolution
    }

    pub fn sample_interval_s(&self) -> f32 {
        self.sample_interval_s
    }
}
