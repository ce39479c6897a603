//! Scoped duration logging.
//!
//! A [`ScopeTimer`] measures the wall-clock time between its creation and its
//! drop, then appends one line of the form
//! `"<name> Elapsed time: <value> <unit>"` to a per-name log file. It is a
//! diagnostics utility with no role in pool correctness; the pool wraps task
//! execution in one when [`PoolConfig::timing_scope`](crate::PoolConfig) is
//! set.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Default directory for timer log files.
const DEFAULT_LOG_DIR: &str = "Log/Timer";

/// Unit used to report an elapsed duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    /// Whole seconds.
    Seconds,
    /// Milliseconds.
    Milliseconds,
    /// Microseconds.
    Microseconds,
    /// Nanoseconds.
    Nanoseconds,
}

impl TimeUnit {
    fn label(self) -> &'static str {
        match self {
            Self::Seconds => "seconds",
            Self::Milliseconds => "milliseconds",
            Self::Microseconds => "microseconds",
            Self::Nanoseconds => "nanoseconds",
        }
    }

    fn value(self, elapsed: Duration) -> u128 {
        match self {
            Self::Seconds => u128::from(elapsed.as_secs()),
            Self::Milliseconds => elapsed.as_millis(),
            Self::Microseconds => elapsed.as_micros(),
            Self::Nanoseconds => elapsed.as_nanos(),
        }
    }
}

/// Scoped wall-clock timer that logs its elapsed time on drop.
///
/// The log line is appended to `<dir>/<name>.log`, creating the directory as
/// needed. A failure to write is reported via [`tracing`] and otherwise
/// ignored; timing must never take a caller down.
#[derive(Debug)]
pub struct ScopeTimer {
    name: String,
    unit: TimeUnit,
    dir: PathBuf,
    started: Instant,
}

impl ScopeTimer {
    /// Start a timer logging to the default directory (`Log/Timer`).
    #[must_use]
    pub fn start(name: impl Into<String>, unit: TimeUnit) -> Self {
        Self::start_in(DEFAULT_LOG_DIR, name, unit)
    }

    /// Start a timer logging to an explicit directory.
    #[must_use]
    pub fn start_in(dir: impl AsRef<Path>, name: impl Into<String>, unit: TimeUnit) -> Self {
        let mut name = name.into();
        if name.is_empty() {
            name = "timer".to_string();
        }
        Self {
            name,
            unit,
            dir: dir.as_ref().to_path_buf(),
            started: Instant::now(),
        }
    }

    /// Change the reporting unit of a running timer.
    pub fn set_unit(&mut self, unit: TimeUnit) {
        self.unit = unit;
    }

    fn append_line(&self, elapsed: Duration) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.log", self.name));
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(
            file,
            "{} Elapsed time: {} {}",
            self.name,
            self.unit.value(elapsed),
            self.unit.label()
        )
    }
}

impl Drop for ScopeTimer {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed();
        if let Err(error) = self.append_line(elapsed) {
            warn!(name = %self.name, %error, "failed to write timer log");
        }
    }
}
