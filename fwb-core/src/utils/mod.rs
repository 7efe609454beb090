//! Utility re-exports for the Four-Wheel Bot.
//!
//! - `config`: motor board, calibration and loop parameters
//! - `controllers`: motor board driver, speed loop and run log
//! - `math`: tick/RPM and voltage/PWM conversions, PI law

pub mod config;
pub mod controllers;
pub mod math;

pub use config::{Calibration, ConfigError, ControlConfig, MotorConfig};
pub use controllers::{MotorBoard, SpeedController};
pub use math::speed::SpeedModel;
