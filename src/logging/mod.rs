//! Leveled logging onto the process channels
//!
//! A thin convenience layer for programs that want tagged log lines on the
//! standard channels. Every accepted message goes to the log channel and to
//! stdout; critical messages are also copied to stderr. Combined with a
//! redirected log channel this gives "log to file, echo to console".

use crate::redirect::sink::{self, StreamSink};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    /// Diagnostic detail
    Debug = 0,
    Info = 1,
    /// Audit trail events
    Audit = 2,
    Warning = 3,
    Error = 4,
    /// The program may not be able to continue
    Critical = 5,
}

impl LogLevel {
    /// Prefix written before each message
    pub fn tag(self) -> &'static str {
        match self {
            LogLevel::Debug => "[debug] ",
            LogLevel::Info => "[info] ",
            LogLevel::Audit => "[audit] ",
            LogLevel::Warning => "[warn] ",
            LogLevel::Error => "[error] ",
            LogLevel::Critical => "[crit] ",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Debug,
            1 => LogLevel::Info,
            2 => LogLevel::Audit,
            3 => LogLevel::Warning,
            4 => LogLevel::Error,
            _ => LogLevel::Critical,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Audit => "audit",
            LogLevel::Warning => "warn",
            LogLevel::Error => "error",
            LogLevel::Critical => "crit",
        };
        f.write_str(name)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "audit" => Ok(LogLevel::Audit),
            "warn" | "warning" => Ok(LogLevel::Warning),
            "error" => Ok(LogLevel::Error),
            "crit" | "critical" => Ok(LogLevel::Critical),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

static MIN_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Debug as u8);

/// Set the process-wide minimum level, returning the previous one.
pub fn set_min_level(level: LogLevel) -> LogLevel {
    LogLevel::from_u8(MIN_LEVEL.swap(level as u8, Ordering::AcqRel))
}

pub fn min_level() -> LogLevel {
    LogLevel::from_u8(MIN_LEVEL.load(Ordering::Acquire))
}

/// Writes tagged lines to a set of channels.
#[derive(Debug, Clone)]
pub struct Logger {
    stdout: Arc<StreamSink>,
    stderr: Arc<StreamSink>,
    log: Arc<StreamSink>,
}

impl Logger {
    /// Logger over the process's standard channels
    pub fn standard() -> Self {
        Self::new(sink::stdout(), sink::stderr(), sink::log())
    }

    pub fn new(stdout: Arc<StreamSink>, stderr: Arc<StreamSink>, log: Arc<StreamSink>) -> Self {
        Self {
            stdout,
            stderr,
            log,
        }
    }

    /// Whether a message at `level` passes the global minimum
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= min_level()
    }

    /// Write `message` at `level`. Messages below the minimum are dropped.
    ///
    /// Channel write errors are ignored: logging never fails the caller.
    pub fn log(&self, level: LogLevel, message: impl fmt::Display) {
        if !self.enabled(level) {
            return;
        }

        let line = format!("{}{}", level.tag(), message);
        if level == LogLevel::Critical {
            let _ = self.stderr.write_line(&line);
        }
        let _ = self.log.write_line(&line);
        let _ = self.stdout.write_line(&line);
    }
}

pub fn debug(message: impl fmt::Display) {
    Logger::standard().log(LogLevel::Debug, message);
}

pub fn info(message: impl fmt::Display) {
    Logger::standard().log(LogLevel::Info, message);
}

pub fn audit(message: impl fmt::Display) {
    Logger::standard().log(LogLevel::Audit, message);
}

pub fn warn(message: impl fmt::Display) {
    Logger::standard().log(LogLevel::Warning, message);
}

pub fn error(message: impl fmt::Display) {
    Logger::standard().log(LogLevel::Error, message);
}

pub fn critical(message: impl fmt::Display) {
    Logger::standard().log(LogLevel::Critical, message);
}
