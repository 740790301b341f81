//! Leveled file logging for taskflow.
//!
//! Log levels:
//! - ERROR: Remote calls or compilations that failed
//! - WARN: Recoverable oddities (logout failures, results for unknown tasks)
//! - INFO: Session transitions, submissions, job state changes
//! - DEBUG: Compile summaries, every remote call
//! - TRACE: Poll iterations and per-task wiring
//!
//! Debug mode can be enabled with `--debug` flag or `TASKFLOW_DEBUG=1` env var.
//! Nothing is written until `init` (or `init_to`) has been called.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;

static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Log levels for filtering messages.
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
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Error,
            1 => LogLevel::Warn,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// Whether `TASKFLOW_DEBUG` asks for debug output.
fn env_debug() -> bool {
    std::env::var("TASKFLOW_DEBUG")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Initialize logging to ~/.taskflow/taskflow.log at INFO level.
pub fn init() {
    init_with_debug(false);
}

/// Initialize logging to ~/.taskflow/taskflow.log, at DEBUG when `debug`
/// is set or the environment asks for it.
pub fn init_with_debug(debug: bool) {
    let level = if debug || env_debug() {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    if let Some(dir) = dirs::home_dir().map(|h| h.join(".taskflow")) {
        init_to(&dir.join("taskflow.log"), level);
    } else {
        set_level(level);
    }
}

/// Initialize logging to an explicit file. The file is truncated.
///
/// Only the first call picks the path; later calls only change the level.
pub fn init_to(path: &Path, level: LogLevel) {
    set_level(level);
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if LOG_PATH.get().is_none() {
        let _ = std::fs::write(path, "");
        LOG_PATH.set(path.to_path_buf()).ok();
    }
}

/// Set the minimum log level for output.
pub fn set_level(level: LogLevel) {
    LOG_LEVEL.store(level as u8, Ordering::SeqCst);
}

/// Get the current log level.
pub fn get_level() -> LogLevel {
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Log a message at the specified level.
pub fn log_at(level: LogLevel, msg: &str) {
    if level > get_level() {
        return;
    }

    if let Some(path) = LOG_PATH.get() {
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
            let _ = writeln!(file, "[{}] [{}] {}", timestamp, level.as_str(), msg);
        }
    }
}

pub fn error(msg: &str) {
    log_at(LogLevel::Error, msg);
}

pub fn warn(msg: &str) {
    log_at(LogLevel::Warn, msg);
}

pub fn info(msg: &str) {
    log_at(LogLevel::Info, msg);
}

pub fn debug(msg: &str) {
    log_at(LogLevel::Debug, msg);
}

pub fn trace(msg: &str) {
    log_at(LogLevel::Trace, msg);
}

/// Log macro for INFO level.
#[macro_export]
macro_rules! tlog {
    ($($arg:tt)*) => {
        $crate::log::info(&format!($($arg)*))
    };
}

/// Log macro for ERROR level.
#[macro_export]
macro_rules! tlog_error {
    ($($arg:tt)*) => {
        $crate::log::error(&format!($($arg)*))
    };
}

/// Log macro for WARN level.
#[macro_export]
macro_rules! tlog_warn {
    ($($arg:tt)*) => {
        $crate::log::warn(&format!($($arg)*))
    };
}

/// Log macro for DEBUG level (only logs when debug mode is enabled).
#[macro_export]
macro_rules! tlog_debug {
    ($($arg:tt)*) => {
        $crate::log::debug(&format!($($arg)*))
    };
}

/// Log macro for TRACE level.
#[macro_export]
macro_rules! tlog_trace {
    ($($arg:tt)*) => {
        $crate::log::trace(&format!($($arg)*))
    };
}
