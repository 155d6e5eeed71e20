//! Configuration for redirection and the launcher
//!
//! Values come from, in increasing priority: built-in defaults, a TOML file,
//! `LINETAP_*` environment variables, then command-line flags (applied by
//! the binary).

#[cfg(test)]
mod tests;

use crate::buffer::DEFAULT_CAPACITY;
use crate::redirect::Channel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_LOG_FILE: &str = "LINETAP_LOG_FILE";
pub const ENV_FLUSH_INTERVAL_SECS: &str = "LINETAP_FLUSH_INTERVAL_SECS";
pub const ENV_INITIAL_CAPACITY: &str = "LINETAP_INITIAL_CAPACITY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Per-redirector settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Initial line buffer size in bytes; the buffer doubles as needed.
    pub initial_capacity: usize,

    /// Deliver an unterminated trailing line when the redirection stops.
    /// Off by default: only newline-terminated lines are delivered.
    pub flush_partial_on_shutdown: bool,

    /// Also strip a `\r` preceding the `\n` terminator.
    pub strip_carriage_return: bool,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            flush_partial_on_shutdown: false,
            strip_carriage_return: false,
        }
    }
}

impl RedirectConfig {
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    pub fn with_flush_partial_on_shutdown(mut self, flush: bool) -> Self {
        self.flush_partial_on_shutdown = flush;
        self
    }

    pub fn with_strip_carriage_return(mut self, strip: bool) -> Self {
        self.strip_carriage_return = strip;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capacity == 0 {
            return Err(ConfigError::Validation(
                "initial_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_log_file() -> PathBuf {
    PathBuf::from("logfile.txt")
}

fn default_flush_interval_secs() -> u64 {
    10
}

fn default_line_ending() -> String {
    "\n".to_string()
}

fn default_capture() -> Vec<Channel> {
    vec![Channel::Stderr, Channel::Log]
}

/// Settings for the `linetap` launcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// File that captured lines are appended to
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,

    /// Seconds between background flushes of the log file
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Terminator written after each captured line
    #[serde(default = "default_line_ending")]
    pub line_ending: String,

    /// Channels whose lines are written to the log file
    #[serde(default = "default_capture")]
    pub capture: Vec<Channel>,

    #[serde(default)]
    pub redirect: RedirectConfig,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            flush_interval_secs: default_flush_interval_secs(),
            line_ending: default_line_ending(),
            capture: default_capture(),
            redirect: RedirectConfig::default(),
        }
    }
}

impl LauncherConfig {
    /// Load from a TOML file; missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Apply `LINETAP_*` overrides from the process environment.
    pub fn apply_env_overrides(self) -> Result<Self, ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up through `lookup`, keyed by environment
    /// variable name.
    pub fn apply_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_LOG_FILE) {
            self.log_file = PathBuf::from(path);
        }
        if let Some(value) = lookup(ENV_FLUSH_INTERVAL_SECS) {
            self.flush_interval_secs = parse_value(ENV_FLUSH_INTERVAL_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_INITIAL_CAPACITY) {
            self.redirect.initial_capacity = parse_value(ENV_INITIAL_CAPACITY, &value)?;
        }
        Ok(self)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.redirect.validate()?;
        if self.flush_interval_secs == 0 {
            return Err(ConfigError::Validation(
                "flush_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.log_file.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "log_file must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
