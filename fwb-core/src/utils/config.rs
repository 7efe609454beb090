//! Startup configuration for the motor board and the speed loop.
//!
//! Everything here is validated once before a run starts. The periodic loop
//! only ever sees values that passed `validate()`.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::utils::controllers::i2c::Wheel;

/// Quadrature decoding counts both edges of both channels.
pub const QUADRATURE_EDGES: u32 = 4;

/// Errors raised while validating configuration at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    ZeroTicksPerRevolution,
    ZeroSampleInterval,
    ZeroPeriod,
    NegativeDuration,
    NonFiniteGain,
    NonFiniteSetpoint,
}

impl fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ConfigError::ZeroTicksPerRevolution => f.write_str("ticks per revolution must be non-zero"),
            ConfigError::ZeroSampleInterval => f.write_str("sample interval must be positive"),
            ConfigError::ZeroPeriod => f.write_str("control period must be non-zero"),
            ConfigError::NegativeDuration => f.write_str("run duration must be finite and non-negative"),
            ConfigError::NonFiniteGain => f.write_str("controller gains must be finite"),
            ConfigError::NonFiniteSetpoint => f.write_str("setpoint must be a finite RPM value"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}

/// Parameters written to the motor board once at startup.
///
/// Defaults describe the TT encoder motor (type 3) with a 65 mm wheel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    pub motor_type: u8,
    /// PWM threshold below which the board treats the command as stopped.
    pub deadzone: u16,
    pub pulses_per_line: u16,
    /// Gear reduction, named after the board register that stores it.
    pub phase_count: u16,
    pub wheel_diameter_mm: f32,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            motor_type: 3,
            deadzone: 1250,
            pulses_per_line: 13,
            phase_count: 45,
            wheel_diameter_mm: 65.0,
        }
    }
}

impl MotorConfig {
    /// Encoder ticks per wheel revolution implied by this motor.
    ///
    /// `pulses_per_line × phase_count × 4`, i.e. 2340 for the default motor.
    pub fn ticks_per_revolution(&self) -> u32 {
        self.pulses_per_line as u32 * self.phase_count as u32 * QUADRATURE_EDGES
    }
}

/// Constants that turn encoder deltas into RPM.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Calibration {
    /// Length of the board's encoder delta window (s).
    pub sample_interval_s: f32,
    /// Explicit ticks/rev; derived from `MotorConfig` when absent.
    pub ticks_per_revolution: Option<u32>,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            sample_interval_s: 0.01,
            ticks_per_revolution: None,
        }
    }
}

impl Calibration {
    pub fn ticks_per_revolution(
        &self,
        motor: &MotorConfig,
    ) -> u32 {
        self.ticks_per_revolution
            .unwrap_or_else(|| motor.ticks_per_revolution())
    }
}

/// Which measured wheel closes the loop, and where its command goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrivePolicy {
    /// One wheel is measured and its command is broadcast to all four.
    LeaderBroadcast { leader: Wheel },
}

impl Default for DrivePolicy {
    fn default() -> Self {
        DrivePolicy::LeaderBroadcast { leader: Wheel::W1 }
    }
}

/// Speed loop gains and timing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Proportional gain (V/rpm).
    pub kp: f32,
    /// Integral gain (V/(rpm·s)), only applied when `integral_enabled`.
    pub ki: f32,
    pub integral_enabled: bool,
    pub period_ms: u32,
    pub policy: DrivePolicy,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            kp: 0.034,
            ki: 0.32,
            integral_enabled: false,
            period_ms: 20,
            policy: DrivePolicy::default(),
        }
    }
}

impl ControlConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::ZeroPeriod);
        }
        if !self.kp.is_finite() || !self.ki.is_finite() {
            return Err(ConfigError::NonFiniteGain);
        }
        Ok(())
    }

    pub fn period_s(&self) -> f32 {
        self.period_ms as f32 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_motor_gives_2340_ticks() {
        assert_eq!(MotorConfig::default().ticks_per_revolution(), 2340);
    }

    #[test]
    fn calibration_override_wins() {
        let motor = MotorConfig::default();
        let cal = Calibration {
            ticks_per_revolution: Some(1000),
            ..Default::default()
        };
        assert_eq!(cal.ticks_per_revolution(&motor), 1000);
        assert_eq!(Calibration::default().ticks_per_revolution(&motor), 2340);
    }

    #[test]
    fn zero_period_is_rejected() {
        let cfg = ControlConfig {
            period_ms: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroPeriod));
    }

    #[test]
    fn nan_gain_is_rejected() {
        let cfg = ControlConfig {
            kp: f32::NAN,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::NonFiniteGain));
        assert_eq!(ControlConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: ControlConfig = serde_json::from_str(
            r#"{"kp": 0.05, "policy": {"leader_broadcast": {"leader": "w2"}}}"#,
        )
        .unwrap();
        assert_eq!(cfg.kp, 0.05);
        assert_eq!(cfg.period_ms, 20);
        assert!(!cfg.integral_enabled);
        assert_eq!(cfg.policy, DrivePolicy::LeaderBroadcast { leader: Wheel::W2 });

        let motor: MotorConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(motor, MotorConfig::default());
    }
}
