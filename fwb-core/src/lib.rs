//! Closed-loop wheel speed control for the Four-Wheel Bot.
//!
//! The crate talks to the I2C motor board through any `embedded_hal::i2c::I2c`
//! bus, converts encoder ticks to RPM and drives all four wheels from a
//! fixed-period speed loop. Builds without `std`; the `std` feature adds the
//! file-backed CSV run log.
#![cfg_attr(not(feature = "std"), no_std)]

pub mod utils;
