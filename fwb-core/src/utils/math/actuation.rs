//! Voltage to PWM conversion for the motor board.
//!
//! The board accepts a signed PWM word per wheel in `[-PWM_MAX, PWM_MAX]`,
//! with `PWM_MAX` corresponding to the full supply of `V_MAX` volts. The
//! magnitude conversion is one-sided; direction travels next to it.

use serde::{Deserialize, Serialize};

/// Motor supply voltage reached at full PWM (V).
pub const V_MAX: f32 = 7.34;
/// Largest PWM magnitude the board accepts.
pub const PWM_MAX: u16 = 2000;
/// Volts per PWM step.
pub const V_PER_PWM: f32 = V_MAX / PWM_MAX as f32;

/// Convert a voltage magnitude to a PWM magnitude in `[0, PWM_MAX]`.
///
/// Negative (and NaN) voltages give 0, voltages at or above `V_MAX` give
/// `PWM_MAX`, everything in between is truncated toward zero.
pub fn voltage_to_pwm(voltage: f32) -> u16 {
    if !(voltage > 0.0) {
        return 0;
    }
    if voltage >= V_MAX {
        return PWM_MAX;
    }
    let pwm = libm::truncf(voltage / V_PER_PWM) as u16;
    pwm.min(PWM_MAX)
}

/// Clamp a commanded voltage to `[-V_MAX, V_MAX]`.
pub fn saturate(voltage: f32) -> f32 {
    if voltage.is_nan() {
        return 0.0;
    }
    voltage.clamp(-V_MAX, V_MAX)
}

/// Spin direction of one wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Reverse,
}

/// Command for one wheel: a direction and a PWM magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WheelCommand {
    pub direction: Direction,
    pub magnitude: u16,
}

impl WheelCommand {
    pub const STOP: WheelCommand = WheelCommand {
        direction: Direction::Forward,
        magnitude: 0,
    };

    /// Split a signed voltage into direction and PWM magnitude.
    pub fn from_voltage(voltage: f32) -> Self {
        let direction = if voltage < 0.0 {
            Direction::Reverse
        } else {
            Direction::Forward
        };
        Self {
            direction,
            magnitude: voltage_to_pwm(libm::fabsf(voltage)),
        }
    }

    /// The signed PWM word sent to the board.
    pub fn signed_pwm(&self) -> i16 {
        let m = self.magnitude.min(PWM_MAX) as i16;
        match self.direction {
            Direction::Forward => m,
            Direction::Reverse => -m,
        }
    }
}

/// One command per wheel, always built from a saturated voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuationCommand {
    pub wheels: [WheelCommand; 4],
}

impl ActuationCommand {
    pub const ZERO: ActuationCommand = ActuationCommand {
        wheels: [WheelCommand::STOP; 4],
    };

    /// Apply the same saturated voltage to every wheel.
    pub fn broadcast(voltage: f32) -> Self {
        Self {
            wheels: [WheelCommand::from_voltage(saturate(voltage)); 4],
        }
    }

    /// Per-wheel saturated voltages.
    pub fn from_voltages(voltages: [f32; 4]) -> Self {
        Self {
            wheels: voltages.map(|v| WheelCommand::from_voltage(saturate(v))),
        }
    }

    pub fn pwm_words(&self) -> [i16; 4] {
        self.wheels.map(|w| w.signed_pwm())
    }
}
