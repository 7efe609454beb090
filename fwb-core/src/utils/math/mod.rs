//! Math utilities for the Four-Wheel Bot.
//!
//! This module provides the numeric conversions shared with the motor board
//! (ticks to RPM, volts to PWM) and the speed control law.

pub mod actuation;
pub mod pi;
pub mod speed;
