//! Swappable output channels
//!
//! A sink is a line-oriented text destination whose underlying write target
//! can be replaced and later restored, the way a stream's buffer can be
//! swapped out from under it. Application code writes through the sink;
//! whoever holds the installed target sees the bytes.

use once_cell::sync::Lazy;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// The write destination a sink currently forwards to
pub type SinkTarget = Box<dyn Write + Send>;

/// A channel whose write destination can be exchanged at runtime
pub trait Sink: Send + Sync {
    /// Human-readable channel name, used for thread names and logs
    fn name(&self) -> &str;

    /// Install `target` and hand back whatever was installed before.
    fn replace(&self, target: SinkTarget) -> SinkTarget;
}

/// Process-wide text channel backed by a mutex-guarded target
pub struct StreamSink {
    name: String,
    target: Mutex<SinkTarget>,
}

impl StreamSink {
    pub fn new(name: impl Into<String>, target: SinkTarget) -> Self {
        Self {
            name: name.into(),
            target: Mutex::new(target),
        }
    }

    /// Lock the channel for a sequence of writes.
    ///
    /// Everything written through one `SinkWriter` reaches the current target
    /// without interleaving with other threads.
    pub fn lock(&self) -> SinkWriter<'_> {
        SinkWriter {
            target: self.target.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    /// Write `line` followed by a newline and flush.
    pub fn write_line(&self, line: &str) -> io::Result<()> {
        let mut writer = self.lock();
        writeln!(writer, "{line}")?;
        writer.flush()
    }
}

impl Sink for StreamSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn replace(&self, target: SinkTarget) -> SinkTarget {
        let mut current = self.target.lock().unwrap_or_else(PoisonError::into_inner);
        // Push anything the old target buffered before it is detached.
        if let Err(e) = current.flush() {
            tracing::debug!(sink = %self.name, error = %e, "flush before replace failed");
        }
        std::mem::replace(&mut *current, target)
    }
}

impl fmt::Debug for StreamSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSink")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Exclusive write access to a [`StreamSink`]
pub struct SinkWriter<'a> {
    target: MutexGuard<'a, SinkTarget>,
}

impl Write for SinkWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.target.write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.target.write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.target.flush()
    }
}

static STDOUT: Lazy<Arc<StreamSink>> =
    Lazy::new(|| Arc::new(StreamSink::new("stdout", Box::new(io::stdout()))));
static STDERR: Lazy<Arc<StreamSink>> =
    Lazy::new(|| Arc::new(StreamSink::new("stderr", Box::new(io::stderr()))));
// The log channel shares the error descriptor but is a separate stream.
static LOG: Lazy<Arc<StreamSink>> =
    Lazy::new(|| Arc::new(StreamSink::new("log", Box::new(io::stderr()))));

/// The process's standard output channel
pub fn stdout() -> Arc<StreamSink> {
    Arc::clone(&STDOUT)
}

/// The process's standard error channel
pub fn stderr() -> Arc<StreamSink> {
    Arc::clone(&STDERR)
}

/// The process's log channel
pub fn log() -> Arc<StreamSink> {
    Arc::clone(&LOG)
}
