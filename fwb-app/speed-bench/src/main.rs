mod sim;

use std::{
    error::Error,
    fmt,
    path::{Path, PathBuf},
    process::ExitCode,
    thread,
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};
use embedded_hal::{delay::DelayNs, i2c::I2c};
use fwb_core::utils::{
    controllers::{
        log::{CsvLog, LogError},
        Clock, ControlError, DeviceError, MotorBoard, RunSpec, SpeedController,
    },
    Calibration, ConfigError, ControlConfig, MotorConfig, SpeedModel,
};
use serde::{Deserialize, Serialize};
use sim::SimBoard;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Raised by Ctrl-C; the speed loop checks it at every period boundary.
static STOP: Signal<CriticalSectionRawMutex, ()> = Signal::new();

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts
{
    /// JSON file with `motor`, `calibration`, `control` and `log_path`
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    /// make the simulated board fail after this many I2C transactions
    #[clap(long, global = true)]
    fault_after: Option<u64>,
    /// drive a real board on this I2C device (e.g. /dev/i2c-1) instead of
    /// the simulator; needs the `hardware` feature
    #[clap(long, global = true)]
    device: Option<PathBuf>,
    #[clap(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd
{
    /// Run the closed speed loop for a fixed duration
    Run {
        /// target speed of the leader wheel (rpm)
        #[clap(long, default_value_t = 250.0, allow_hyphen_values = true)]
        setpoint: f32,
        /// run length (s)
        #[clap(long, default_value_t = 5.0)]
        duration: f32,
        /// CSV log path, overrides the config file
        #[clap(long)]
        log: Option<PathBuf>,
        /// accumulate the integral term
        #[clap(long)]
        integral: bool,
    },
    /// Print the cumulative encoder count of every wheel
    Counts,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct BenchConfig
{
    motor: MotorConfig,
    calibration: Calibration,
    control: ControlConfig,
    log_path: PathBuf,
}

impl Default for BenchConfig
{
    fn default() -> Self
    {
        Self {
            motor: MotorConfig::default(),
            calibration: Calibration::default(),
            control: ControlConfig::default(),
            log_path: PathBuf::from("logs/speed_log0.csv"),
        }
    }
}

#[derive(Debug)]
enum BenchError
{
    Load(PathBuf, String),
    Open(PathBuf, String),
    Config(ConfigError),
    Log(LogError),
    Control(Box<dyn Error + Send + Sync>),
}

impl fmt::Display for BenchError
{
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result
    {
        match self {
            BenchError::Load(path, e) => write!(f, "cannot load {}: {}", path.display(), e),
            BenchError::Open(path, e) => write!(f, "cannot open {}: {}", path.display(), e),
            BenchError::Config(e) => write!(f, "invalid configuration: {}", e),
            BenchError::Log(e) => write!(f, "{}", e),
            BenchError::Control(e) => write!(f, "{}", e),
        }
    }
}

impl From<ConfigError> for BenchError
{
    fn from(e: ConfigError) -> Self
    {
        BenchError::Config(e)
    }
}

impl From<LogError> for BenchError
{
    fn from(e: LogError) -> Self
    {
        BenchError::Log(e)
    }
}

impl<E> From<ControlError<E>> for BenchError
where
    E: fmt::Debug + Send + Sync + 'static,
{
    fn from(e: ControlError<E>) -> Self
    {
        BenchError::Control(Box::new(e))
    }
}

impl<E> From<DeviceError<E>> for BenchError
where
    E: fmt::Debug + Send + Sync + 'static,
{
    fn from(e: DeviceError<E>) -> Self
    {
        BenchError::Control(Box::new(ControlError::Device(e)))
    }
}

impl BenchError
{
    fn exit_code(&self) -> ExitCode
    {
        match self {
            BenchError::Control(_) | BenchError::Open(..) => ExitCode::from(1),
            _ => ExitCode::from(2),
        }
    }
}

/// Wall-clock time source for the host.
struct HostClock
{
    start: Instant,
}

impl DelayNs for HostClock
{
    fn delay_ns(
        &mut self,
        ns: u32,
    )
    {
        thread::sleep(Duration::from_nanos(ns as u64));
    }

    fn delay_ms(
        &mut self,
        ms: u32,
    )
    {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}

impl Clock for HostClock
{
    fn now_ms(&mut self) -> u64
    {
        self.start.elapsed().as_millis() as u64
    }
}

fn load_config(path: Option<&Path>) -> Result<BenchConfig, BenchError>
{
    let Some(path) = path else {
        return Ok(BenchConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| BenchError::Load(path.to_path_buf(), e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| BenchError::Load(path.to_path_buf(), e.to_string()))
}

#[cfg(feature = "hardware")]
fn open_device(path: &Path) -> Result<linux_embedded_hal::I2cdev, BenchError>
{
    let bus = linux_embedded_hal::I2cdev::new(path)
        .map_err(|e| BenchError::Open(path.to_path_buf(), e.to_string()))?;
    info!(device = %path.display(), "driving hardware bus");
    Ok(bus)
}

fn bench(opts: Opts) -> Result<(), BenchError>
{
    let config = load_config(opts.config.as_deref())?;
    match opts.device {
        #[cfg(feature = "hardware")]
        Some(path) => drive(open_device(&path)?, config, opts.cmd),
        #[cfg(not(feature = "hardware"))]
        Some(path) => Err(BenchError::Open(
            path,
            "built without the `hardware` feature".to_string(),
        )),
        None => drive(SimBoard::new(opts.fault_after), config, opts.cmd),
    }
}

fn drive<I2C>(
    bus: I2C,
    mut bench: BenchConfig,
    cmd: Cmd,
) -> Result<(), BenchError>
where
    I2C: I2c,
    I2C::Error: Send + Sync + 'static,
{
    let model = SpeedModel::from_config(&bench.motor, &bench.calibration)?;
    let mut clock = HostClock {
        start: Instant::now(),
    };

    let mut board = MotorBoard::with_bus(bus);
    board.configure(&bench.motor, &mut clock)?;

    match cmd {
        Cmd::Counts => {
            let counts = board.read_total_encoder_counts()?;
            for (i, c) in counts.iter().enumerate() {
                println!("wheel {}: {} ticks", i + 1, c);
            }
            Ok(())
        }
        Cmd::Run {
            setpoint,
            duration,
            log,
            integral,
        } => {
            if integral {
                bench.control.integral_enabled = true;
            }
            let spec = RunSpec::new(setpoint, duration)?;
            let mut ctrl = SpeedController::new(board, model, bench.control)?;
            let mut csv = CsvLog::create(log.unwrap_or(bench.log_path))?;

            info!(
                setpoint,
                duration,
                kp = bench.control.kp,
                integral = bench.control.integral_enabled,
                "control active"
            );
            let report = ctrl.run(&spec, &mut clock, &mut csv, &STOP)?;
            info!(
                outcome = ?report.outcome,
                periods = report.periods,
                log_failures = report.log_failures,
                "wheels stopped"
            );
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode
{
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let opts: Opts = Opts::parse();

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, stopping wheels");
            STOP.signal(());
        }
    });

    match tokio::task::spawn_blocking(move || bench(opts)).await {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(e)) => {
            error!("{}", e);
            e.exit_code()
        }
        Err(e) => {
            error!("speed loop task failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
