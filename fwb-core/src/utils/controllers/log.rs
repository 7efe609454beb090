//! Per-period speed log.
//!
//! Each control period appends one `LogRecord`. With the `std` feature,
//! `CsvLog` writes them as `time_ms, V1_rpm, V2_rpm, V3_rpm, V4_rpm` rows.

use core::fmt;

/// Header row of the CSV run log.
pub const HEADER: &str = "time_ms, V1_rpm, V2_rpm, V3_rpm, V4_rpm";

/// Elapsed time and the four measured wheel speeds for one period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogRecord {
    pub elapsed_ms: u64,
    pub rpm: [f32; 4],
}

impl fmt::Display for LogRecord {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let [v1, v2, v3, v4] = self.rpm;
        // Shortest f32 round-trip form, so about 7 significant digits.
        write!(f, "{}, {:?}, {:?}, {:?}, {:?}", self.elapsed_ms, v1, v2, v3, v4)
    }
}

/// Append-only destination for log records.
pub trait LogSink {
    type Error: fmt::Debug;

    fn append(
        &mut self,
        record: &LogRecord,
    ) -> Result<(), Self::Error>;
}

impl<S: LogSink + ?Sized> LogSink for &mut S {
    type Error = S::Error;

    fn append(
        &mut self,
        record: &LogRecord,
    ) -> Result<(), Self::Error> {
        (**self).append(record)
    }
}

#[cfg(feature = "std")]
pub use csv::{CsvLog, LogError};

#[cfg(feature = "std")]
mod csv {
    use std::{
        fs::{self, File},
        io::{self, LineWriter, Write},
        path::Path,
    };

    use super::{LogRecord, LogSink, HEADER};

    /// Failure to create or append to the run log.
    #[derive(Debug)]
    pub struct LogError(pub io::Error);

    impl core::fmt::Display for LogError {
        fn fmt(
            &self,
            f: &mut core::fmt::Formatter<'_>,
        ) -> core::fmt::Result {
            write!(f, "speed log write failed: {}", self.0)
        }
    }

    impl std::error::Error for LogError {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    impl From<io::Error> for LogError {
        fn from(e: io::Error) -> Self {
            LogError(e)
        }
    }

    /// CSV log over any writer; rows are written whole, one per append.
    pub struct CsvLog<W: Write> {
        out: W,
    }

    impl CsvLog<LineWriter<File>> {
        /// Create the parent directory if needed and start a fresh log.
        ///
        /// Truncates any existing file at `path`, so call it once per run.
        pub fn create<P: AsRef<Path>>(path: P) -> Result<Self, LogError> {
            let path = path.as_ref();
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let file = File::create(path)?;
            tracing::info!(path = %path.display(), "speed log initialized");
            CsvLog::new(LineWriter::new(file))
        }
    }

    impl<W: Write> CsvLog<W> {
        /// Wrap `out` and write the header row.
        pub fn new(mut out: W) -> Result<Self, LogError> {
            writeln!(out, "{}", HEADER)?;
            out.flush()?;
            Ok(Self { out })
        }

        pub fn into_inner(self) -> W {
            self.out
        }
    }

    impl<W: Write> LogSink for CsvLog<W> {
        type Error = LogError;

        fn append(
            &mut self,
            record: &LogRecord,
        ) -> Result<(), LogError> {
            let line = format!("{}\n", record);
            self.out.write_all(line.as_bytes())?;
            self.out.flush()?;
            Ok(())
        }
    }
}
