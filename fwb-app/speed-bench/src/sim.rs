//! In-process stand-in for the I2C motor board.
//!
//! Answers the same registers as the real board: configuration writes are
//! stored, PWM writes set each wheel's target speed, and encoder registers
//! report ticks from a first-order wheel model advanced in wall-clock time.

use std::time::Instant;

use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, Operation};
use fwb_core::utils::{config::QUADRATURE_EDGES, controllers::codec, controllers::MOTOR_BOARD_ADDRESS};

/// Wheel speed at full PWM (rpm).
const NO_LOAD_RPM: f32 = 330.0;
/// Wheel response time constant (s).
const TAU_S: f32 = 0.08;
/// The board's encoder delta window (s).
const WINDOW_S: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFault {
    /// Injected after the configured number of transactions.
    Injected,
    NoAcknowledge,
    /// A read was issued without a register pointer.
    NoRegister,
}

impl i2c::Error for SimFault {
    fn kind(&self) -> ErrorKind {
        match self {
            SimFault::NoAcknowledge => {
                ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address)
            }
            SimFault::Injected | SimFault::NoRegister => ErrorKind::Other,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct SimWheel {
    pwm: i16,
    rpm: f32,
    position_ticks: f64,
}

pub struct SimBoard {
    motor_type: u8,
    deadzone: u16,
    pulses_per_line: u16,
    phase_count: u16,
    wheel_diameter_mm: f32,
    wheels: [SimWheel; 4],
    transactions: u64,
    fault_after: Option<u64>,
    last_update: Instant,
}

impl SimBoard {
    pub fn new(fault_after: Option<u64>) -> Self {
        Self {
            motor_type: 0,
            deadzone: 0,
            pulses_per_line: 13,
            phase_count: 45,
            wheel_diameter_mm: 0.0,
            wheels: [SimWheel::default(); 4],
            transactions: 0,
            fault_after,
            last_update: Instant::now(),
        }
    }

    fn ticks_per_revolution(&self) -> f32 {
        (self.pulses_per_line as u32 * self.phase_count as u32 * QUADRATURE_EDGES) as f32
    }

    fn advance(&mut self) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f32();
        self.last_update = now;

        let tpr = self.ticks_per_revolution();
        let blend = 1.0 - (-dt / TAU_S).exp();
        for w in &mut self.wheels {
            let target = w.pwm as f32 / 2000.0 * NO_LOAD_RPM;
            w.rpm += (target - w.rpm) * blend;
            w.position_ticks += (w.rpm / 60.0 * tpr * dt) as f64;
        }
    }

    fn store(
        &mut self,
        reg: u8,
        data: &[u8],
    ) {
        match (reg, data) {
            (0x01, [t]) => self.motor_type = *t,
            (0x02, [hi, lo]) => self.deadzone = u16::from_be_bytes([*hi, *lo]),
            (0x03, [hi, lo]) => self.pulses_per_line = u16::from_be_bytes([*hi, *lo]),
            (0x04, [hi, lo]) => self.phase_count = u16::from_be_bytes([*hi, *lo]),
            (0x05, [a, b, c, d]) => self.wheel_diameter_mm = codec::decode_f32([*a, *b, *c, *d]),
            (0x07, bytes) if bytes.len() == 8 => {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(bytes);
                for (w, p) in self.wheels.iter_mut().zip(codec::decode_pwm(buf)) {
                    w.pwm = p;
                }
            }
            _ => tracing::warn!(reg, len = data.len(), "sim: ignored register write"),
        }
        tracing::trace!(
            motor_type = self.motor_type,
            deadzone = self.deadzone,
            wheel_diameter_mm = self.wheel_diameter_mm,
            "sim: register {:#04x} written",
            reg
        );
    }

    fn load(
        &self,
        reg: u8,
        buf: &mut [u8],
    ) {
        let tpr = self.ticks_per_revolution();
        let bytes = match reg {
            0x10..=0x13 => {
                let w = &self.wheels[(reg - 0x10) as usize];
                let ticks = (w.rpm / 60.0 * tpr * WINDOW_S).round() as i16;
                codec::encode_i16(ticks)
            }
            0x20..=0x27 => {
                let w = &self.wheels[((reg - 0x20) / 2) as usize];
                let total = w.position_ticks.round() as i32 as u32;
                if reg % 2 == 0 {
                    codec::encode_u16((total >> 16) as u16)
                } else {
                    codec::encode_u16(total as u16)
                }
            }
            _ => [0, 0],
        };
        for (dst, src) in buf.iter_mut().zip(bytes) {
            *dst = src;
        }
    }
}

impl ErrorType for SimBoard {
    type Error = SimFault;
}

impl I2c for SimBoard {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), SimFault> {
        self.transactions += 1;
        if self.fault_after.is_some_and(|n| self.transactions > n) {
            return Err(SimFault::Injected);
        }
        if address != MOTOR_BOARD_ADDRESS {
            return Err(SimFault::NoAcknowledge);
        }

        self.advance();
        let mut pointer = None;
        for op in operations {
            match op {
                Operation::Write(bytes) => {
                    if let Some((&reg, data)) = bytes.split_first() {
                        pointer = Some(reg);
                        if !data.is_empty() {
                            self.store(reg, data);
                        }
                    }
                }
                Operation::Read(buf) => {
                    let reg = pointer.ok_or(SimFault::NoRegister)?;
                    self.load(reg, buf);
                }
            }
        }
        Ok(())
    }
}
