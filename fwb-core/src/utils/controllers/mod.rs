//! Module Exports
//!
//! This file exports the modules that talk to the motor board and run the
//! speed loop.
//!
//! - `codec`: byte layouts of the board registers.
//! - `i2c`: register map and the motor board driver.
//! - `control`: the fixed-period speed loop.
//! - `log`: per-period speed log.

pub mod codec;
pub mod control;
/// Module for managing the I2C motor board.
pub mod i2c;
pub mod log;

pub use control::{Clock, ControlError, ControlState, RunOutcome, RunReport, RunSpec, SpeedController};
pub use i2c::{DeviceError, MotorBoard, Register, Wheel, MOTOR_BOARD_ADDRESS};
pub use log::{LogRecord, LogSink};
