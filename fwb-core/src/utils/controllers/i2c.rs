//! I2C motor board driver for the Four-Wheel Bot.
//!
//! This module mirrors the board's fixed register map and provides encoder
//! reads, PWM writes and the one-time motor configuration over an owned
//! `embedded_hal::i2c::I2c` bus. A shared bus can be passed in as an
//! `embedded_hal_bus::i2c::RefCellDevice`.

use core::fmt;

use embedded_hal::{delay::DelayNs, i2c::I2c};
use serde::{Deserialize, Serialize};

use crate::utils::{
    config::MotorConfig,
    controllers::codec,
    math::actuation::{ActuationCommand, PWM_MAX},
};

/// 7-bit address of the motor board.
pub const MOTOR_BOARD_ADDRESS: u8 = 0x26;
/// Pause after each configuration write so the board can apply it.
pub const SETTLE_MS: u32 = 50;
/// Widest register payload (PWM and SPEED).
const MAX_WIDTH: usize = 8;

/// Errors that can occur when talking to the motor board.
#[derive(Debug)]
pub enum DeviceError<E: fmt::Debug> {
    /// The underlying bus reported a failure.
    Bus(E),
    /// No bus has been bound to the board yet.
    NotInitialized,
    /// Payload length does not match the register's fixed width.
    RegisterWidth {
        register: Register,
        expected: usize,
        actual: usize,
    },
}

impl<E: fmt::Debug> fmt::Display for DeviceError<E> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            DeviceError::Bus(e) => write!(f, "I2C bus error: {:?}", e),
            DeviceError::NotInitialized => {
                f.write_str("I2C transport not initialized, bind a bus first")
            }
            DeviceError::RegisterWidth {
                register,
                expected,
                actual,
            } => write!(
                f,
                "register {:?} takes {} bytes, got {}",
                register, expected, actual
            ),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for DeviceError<E> {}

/// One of the four driven wheels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Wheel {
    W1,
    W2,
    W3,
    W4,
}

impl Wheel {
    pub const ALL: [Wheel; 4] = [Wheel::W1, Wheel::W2, Wheel::W3, Wheel::W4];

    pub fn index(self) -> usize {
        match self {
            Wheel::W1 => 0,
            Wheel::W2 => 1,
            Wheel::W3 => 2,
            Wheel::W4 => 3,
        }
    }
}

/// The board's register map. Addresses and widths are fixed by firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Type,
    Deadzone,
    PulsePerLine,
    PhaseCount,
    WheelDiameter,
    Speed,
    Pwm,
    EncoderDelta(Wheel),
    EncoderHigh(Wheel),
    EncoderLow(Wheel),
}

impl Register {
    pub fn addr(self) -> u8 {
        match self {
            Register::Type => 0x01,
            Register::Deadzone => 0x02,
            Register::PulsePerLine => 0x03,
            Register::PhaseCount => 0x04,
            Register::WheelDiameter => 0x05,
            Register::Speed => 0x06,
            Register::Pwm => 0x07,
            Register::EncoderDelta(w) => 0x10 + w.index() as u8,
            Register::EncoderHigh(w) => 0x20 + 2 * w.index() as u8,
            Register::EncoderLow(w) => 0x21 + 2 * w.index() as u8,
        }
    }

    /// Payload width in bytes.
    pub fn width(self) -> usize {
        match self {
            Register::Type => 1,
            Register::Deadzone | Register::PulsePerLine | Register::PhaseCount => 2,
            Register::WheelDiameter => 4,
            Register::Speed | Register::Pwm => 8,
            Register::EncoderDelta(_) | Register::EncoderHigh(_) | Register::EncoderLow(_) => 2,
        }
    }
}

/// Register-level driver for the four-channel encoder motor board.
pub struct MotorBoard<I2C> {
    i2c: Option<I2C>,
    address: u8,
}

impl<I2C> Default for MotorBoard<I2C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I2C> MotorBoard<I2C> {
    /// A board with no bus bound; every register access fails until `bind`.
    pub fn new() -> Self {
        MotorBoard {
            i2c: None,
            address: MOTOR_BOARD_ADDRESS,
        }
    }

    /// A board bound to `i2c` at the default address.
    pub fn with_bus(i2c: I2C) -> Self {
        MotorBoard {
            i2c: Some(i2c),
            address: MOTOR_BOARD_ADDRESS,
        }
    }

    pub fn bind(
        &mut self,
        i2c: I2C,
    ) {
        self.i2c = Some(i2c);
    }

    /// Detach and return the bus.
    pub fn release(&mut self) -> Option<I2C> {
        self.i2c.take()
    }

    pub fn is_bound(&self) -> bool {
        self.i2c.is_some()
    }
}

impl<I2C, E> MotorBoard<I2C>
where
    I2C: I2c<Error = E>,
    E: fmt::Debug,
{
    fn bus(&mut self) -> Result<&mut I2C, DeviceError<E>> {
        self.i2c.as_mut().ok_or(DeviceError::NotInitialized)
    }

    fn check_width(
        register: Register,
        actual: usize,
    ) -> Result<(), DeviceError<E>> {
        let expected = register.width();
        if expected != actual {
            return Err(DeviceError::RegisterWidth {
                register,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Write exactly `register.width()` bytes to `register`.
    pub fn write_register(
        &mut self,
        register: Register,
        data: &[u8],
    ) -> Result<(), DeviceError<E>> {
        let address = self.address;
        let bus = self.bus()?;
        Self::check_width(register, data.len())?;

        let mut frame = [0u8; MAX_WIDTH + 1];
        frame[0] = register.addr();
        frame[1..=data.len()].copy_from_slice(data);
        bus.write(address, &frame[..=data.len()])
            .map_err(DeviceError::Bus)
    }

    /// Read exactly `N` bytes from `register`.
    pub fn read_register<const N: usize>(
        &mut self,
        register: Register,
    ) -> Result<[u8; N], DeviceError<E>> {
        let address = self.address;
        let bus = self.bus()?;
        Self::check_width(register, N)?;

        let mut buf = [0u8; N];
        bus.write_read(address, &[register.addr()], &mut buf)
            .map_err(DeviceError::Bus)?;
        Ok(buf)
    }

    /// Write the motor parameters, pausing `SETTLE_MS` after each register.
    pub fn configure<D: DelayNs>(
        &mut self,
        config: &MotorConfig,
        delay: &mut D,
    ) -> Result<(), DeviceError<E>> {
        self.write_register(Register::Type, &[config.motor_type])?;
        delay.delay_ms(SETTLE_MS);
        self.write_register(Register::PhaseCount, &codec::encode_u16(config.phase_count))?;
        delay.delay_ms(SETTLE_MS);
        self.write_register(
            Register::PulsePerLine,
            &codec::encode_u16(config.pulses_per_line),
        )?;
        delay.delay_ms(SETTLE_MS);
        self.write_register(
            Register::WheelDiameter,
            &codec::encode_f32(config.wheel_diameter_mm),
        )?;
        delay.delay_ms(SETTLE_MS);
        self.write_register(Register::Deadzone, &codec::encode_u16(config.deadzone))?;
        delay.delay_ms(SETTLE_MS);

        tracing::info!(
            motor_type = config.motor_type,
            deadzone = config.deadzone,
            pulses_per_line = config.pulses_per_line,
            phase_count = config.phase_count,
            wheel_diameter_mm = config.wheel_diameter_mm,
            "motor board configured"
        );
        Ok(())
    }

    /// Ticks each wheel moved during the board's last sample window.
    pub fn read_encoder_deltas(&mut self) -> Result<[i16; 4], DeviceError<E>> {
        let mut ticks = [0i16; 4];
        for wheel in Wheel::ALL {
            let buf = self.read_register::<2>(Register::EncoderDelta(wheel))?;
            ticks[wheel.index()] = codec::decode_i16(buf);
        }
        Ok(ticks)
    }

    /// Cumulative tick count (wheel position) for each wheel.
    pub fn read_total_encoder_counts(&mut self) -> Result<[i32; 4], DeviceError<E>> {
        let mut counts = [0i32; 4];
        for wheel in Wheel::ALL {
            let high = self.read_register::<2>(Register::EncoderHigh(wheel))?;
            let low = self.read_register::<2>(Register::EncoderLow(wheel))?;
            counts[wheel.index()] = codec::decode_i32_halves(high, low);
        }
        Ok(counts)
    }

    /// Send raw signed PWM words, clamped to `[-PWM_MAX, PWM_MAX]`.
    pub fn control_motor_pwm(
        &mut self,
        pwm: [i16; 4],
    ) -> Result<(), DeviceError<E>> {
        let max = PWM_MAX as i16;
        let words = pwm.map(|p| p.clamp(-max, max));
        tracing::trace!(?words, "pwm write");
        self.write_register(Register::Pwm, &codec::encode_pwm(words))
    }

    /// Drive each wheel with a signed voltage, saturated to `±V_MAX`.
    pub fn control_motor_voltage(
        &mut self,
        voltages: [f32; 4],
    ) -> Result<(), DeviceError<E>> {
        self.apply(&ActuationCommand::from_voltages(voltages))
    }

    pub fn apply(
        &mut self,
        command: &ActuationCommand,
    ) -> Result<(), DeviceError<E>> {
        self.control_motor_pwm(command.pwm_words())
    }

    /// Command every wheel to zero.
    pub fn stop_all(&mut self) -> Result<(), DeviceError<E>> {
        self.apply(&ActuationCommand::ZERO)
    }
}
