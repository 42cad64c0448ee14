//! Leveled logging for calcflow.
//!
//! Log levels:
//! - ERROR: Failures that abort a request or the process (bind errors, config errors)
//! - WARN: Rejected worker reports, expired leases, transport errors in the agent
//! - INFO: Expression lifecycle (submitted, done, failed), startup, shutdown
//! - DEBUG: Dispatches, completions, HTTP request traces
//! - TRACE: Lease sweeps and empty polls
//!
//! Lines go to `~/.calcflow/calcflow.log` and, for the long-running `serve` and
//! `agent` commands, to stderr as well.
//!
//! `--debug` or `CALCFLOW_DEBUG=1` lowers the threshold to DEBUG.
//! `CALCFLOW_LOG=<level>` sets it explicitly and wins over both.

use std::fmt;
use std::fs::File;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};

const LOG_FILE: &str = "calcflow.log";

static THRESHOLD: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static SINK: OnceLock<Sink> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|level| level.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown log level '{}'", wanted))
    }
}

/// Where formatted lines end up.
struct Sink {
    file: Option<Mutex<File>>,
    echo_stderr: bool,
}

impl Sink {
    fn open(echo_stderr: bool) -> Self {
        let file = dirs::home_dir()
            .map(|home| home.join(".calcflow"))
            .and_then(|dir| {
                std::fs::create_dir_all(&dir).ok()?;
                File::create(dir.join(LOG_FILE)).ok()
            })
            .map(Mutex::new);
        Self { file, echo_stderr }
    }

    fn write_line(&self, line: &str) {
        if self.echo_stderr {
            eprintln!("{}", line);
        }
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = writeln!(file, "{}", line);
            }
        }
    }
}

/// Pick the threshold and open the log file. Only the first call opens a sink.
pub fn init_with_debug(debug: bool, echo_stderr: bool) {
    set_threshold(threshold_from_env(debug));
    let _ = SINK.set(Sink::open(echo_stderr));
}

fn threshold_from_env(debug: bool) -> LogLevel {
    if let Some(level) = std::env::var("CALCFLOW_LOG")
        .ok()
        .and_then(|v| v.parse().ok())
    {
        return level;
    }
    let env_debug = std::env::var("CALCFLOW_DEBUG")
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE"))
        .unwrap_or(false);
    if debug || env_debug {
        LogLevel::Debug
    } else {
        LogLevel::Info
    }
}

pub fn set_threshold(level: LogLevel) {
    THRESHOLD.store(level as u8, Ordering::Relaxed);
}

pub fn enabled(level: LogLevel) -> bool {
    level as u8 <= THRESHOLD.load(Ordering::Relaxed)
}

fn format_line(level: LogLevel, args: fmt::Arguments<'_>) -> String {
    let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
    format!("{} {:<5} {}", timestamp, level, args)
}

/// Write one line at `level`. Called through the `clog*` macros.
pub fn write(level: LogLevel, args: fmt::Arguments<'_>) {
    if !enabled(level) {
        return;
    }
    if let Some(sink) = SINK.get() {
        sink.write_line(&format_line(level, args));
    }
}

#[macro_export]
macro_rules! clog {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::LogLevel::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! clog_error {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::LogLevel::Error, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! clog_warn {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::LogLevel::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! clog_debug {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::LogLevel::Debug, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! clog_trace {
    ($($arg:tt)*) => {
        $crate::log::write($crate::log::LogLevel::Trace, format_args!($($arg)*))
    };
}
