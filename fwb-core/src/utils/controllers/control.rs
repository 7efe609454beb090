//! Fixed-period wheel speed loop.
//!
//! Every period the loop reads the encoder deltas, turns the leader wheel's
//! delta into RPM, runs the PI law against the setpoint, broadcasts the
//! saturated command to all four wheels and appends a log row. Whatever ends
//! the run (duration elapsed, stop signal, bus fault) the wheels are
//! commanded to zero before `run` returns.

use core::fmt;

use embassy_sync::{blocking_mutex::raw::RawMutex, signal::Signal};
use embedded_hal::{delay::DelayNs, i2c::I2c};

use crate::utils::{
    config::{ConfigError, ControlConfig, DrivePolicy},
    controllers::{
        i2c::{DeviceError, MotorBoard},
        log::{LogRecord, LogSink},
    },
    math::{
        actuation::{ActuationCommand, V_MAX},
        pi::PiController,
        speed::SpeedModel,
    },
};

/// Monotonic millisecond time source that can also block until later.
pub trait Clock: DelayNs {
    fn now_ms(&mut self) -> u64;
}

/// Errors that end a run early.
#[derive(Debug)]
pub enum ControlError<E: fmt::Debug> {
    Device(DeviceError<E>),
}

impl<E: fmt::Debug> From<DeviceError<E>> for ControlError<E> {
    fn from(e: DeviceError<E>) -> Self {
        ControlError::Device(e)
    }
}

impl<E: fmt::Debug> fmt::Display for ControlError<E> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ControlError::Device(e) => write!(f, "speed loop aborted: {}", e),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for ControlError<E> {}

/// Setpoint and length of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSpec {
    setpoint_rpm: f32,
    duration_ms: u64,
}

impl RunSpec {
    pub fn new(
        setpoint_rpm: f32,
        duration_s: f32,
    ) -> Result<Self, ConfigError> {
        if !setpoint_rpm.is_finite() {
            return Err(ConfigError::NonFiniteSetpoint);
        }
        if !(duration_s.is_finite() && duration_s >= 0.0) {
            return Err(ConfigError::NegativeDuration);
        }
        Ok(Self {
            setpoint_rpm,
            duration_ms: libm::roundf(duration_s * 1000.0) as u64,
        })
    }

    pub fn setpoint_rpm(&self) -> f32 {
        self.setpoint_rpm
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }
}

/// Lifecycle of the loop. `Stopped` means the wheels were last told zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Idle,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The configured duration elapsed.
    Completed,
    /// The stop signal was raised.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub periods: u32,
    pub log_failures: u32,
}

/// What one period measured and commanded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodSample {
    pub rpm: [f32; 4],
    pub error: f32,
    pub voltage: f32,
    pub command: ActuationCommand,
}

/// Closed-loop speed controller owning the motor board.
pub struct SpeedController<I2C> {
    board: MotorBoard<I2C>,
    model: SpeedModel,
    config: ControlConfig,
    pi: PiController,
    state: ControlState,
}

impl<I2C, E> SpeedController<I2C>
where
    I2C: I2c<Error = E>,
    E: fmt::Debug,
{
    pub fn new(
        board: MotorBoard<I2C>,
        model: SpeedModel,
        config: ControlConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let pi = PiController::new(config.kp, config.ki, config.period_s(), V_MAX)
            .with_integral(config.integral_enabled);
        Ok(Self {
            board,
            model,
            config,
            pi,
            state: ControlState::Idle,
        })
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn board(&mut self) -> &mut MotorBoard<I2C> {
        &mut self.board
    }

    pub fn into_board(self) -> MotorBoard<I2C> {
        self.board
    }

    /// Sample, compute and actuate once.
    pub fn step(
        &mut self,
        setpoint_rpm: f32,
    ) -> Result<PeriodSample, DeviceError<E>> {
        let deltas = self.board.read_encoder_deltas()?;
        let rpm = self.model.wheel_rpm(deltas);

        let (voltage, error, command) = match self.config.policy {
            DrivePolicy::LeaderBroadcast { leader } => {
                let error = setpoint_rpm - rpm[leader.index()];
                let voltage = self.pi.update(error);
                (voltage, error, ActuationCommand::broadcast(voltage))
            }
        };

        self.board.apply(&command)?;
        Ok(PeriodSample {
            rpm,
            error,
            voltage,
            command,
        })
    }

    /// Run the loop until `spec`'s duration elapses or `stop` is signaled.
    ///
    /// `stop` is checked at the top of every period, never mid-transfer.
    /// Log failures are counted and reported but do not stop actuation.
    pub fn run<C, L, M>(
        &mut self,
        spec: &RunSpec,
        clock: &mut C,
        log: &mut L,
        stop: &Signal<M, ()>,
    ) -> Result<RunReport, ControlError<E>>
    where
        C: Clock,
        L: LogSink,
        M: RawMutex,
    {
        self.pi.reset();
        self.state = ControlState::Running;
        tracing::info!(
            setpoint_rpm = spec.setpoint_rpm,
            duration_ms = spec.duration_ms,
            period_ms = self.config.period_ms,
            "speed loop started"
        );

        let period = self.config.period_ms as u64;
        let start = clock.now_ms();
        let mut next = start;
        let mut periods = 0u32;
        let mut log_failures = 0u32;

        let result = loop {
            if stop.try_take().is_some() {
                break Ok(RunOutcome::Cancelled);
            }
            if clock.now_ms().saturating_sub(start) >= spec.duration_ms {
                break Ok(RunOutcome::Completed);
            }

            let sample = match self.step(spec.setpoint_rpm) {
                Ok(sample) => sample,
                Err(e) => break Err(e),
            };
            tracing::debug!(
                setpoint = spec.setpoint_rpm,
                rpm = ?sample.rpm,
                u = sample.voltage,
                "period {}",
                periods
            );

            let record = LogRecord {
                elapsed_ms: clock.now_ms().saturating_sub(start),
                rpm: sample.rpm,
            };
            if let Err(e) = log.append(&record) {
                log_failures += 1;
                tracing::warn!(?e, "speed log append failed");
            }
            periods += 1;

            next += period;
            let now = clock.now_ms();
            if now < next {
                clock.delay_ms((next - now) as u32);
            } else {
                tracing::warn!(overrun_ms = now - next, "control period overrun");
                next = now;
            }
        };

        let zeroed = self.board.stop_all();
        self.state = ControlState::Stopped;

        match result {
            Ok(outcome) => {
                zeroed?;
                tracing::info!(?outcome, periods, log_failures, "speed loop stopped");
                Ok(RunReport {
                    outcome,
                    periods,
                    log_failures,
                })
            }
            Err(e) => {
                tracing::error!(error = ?e, "bus fault, stopping wheels");
                if let Err(z) = zeroed {
                    tracing::error!(error = ?z, "failed to zero wheels after bus fault");
                }
                Err(ControlError::Device(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_spec_rejects_bad_input() {
        assert_eq!(RunSpec::new(f32::NAN, 1.0), Err(ConfigError::NonFiniteSetpoint));
        assert_eq!(RunSpec::new(250.0, -1.0), Err(ConfigError::NegativeDuration));
        assert_eq!(RunSpec::new(250.0, f32::INFINITY), Err(ConfigError::NegativeDuration));
        assert_eq!(RunSpec::new(250.0, 5.0).unwrap().duration_ms(), 5000);
    }
}
