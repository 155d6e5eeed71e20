//! Observer that appends captured lines to a file

use crate::error::Result;
use crate::redirect::StreamObserver;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(10);

struct FileState {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    line_ending: String,
    terminate: bool,
}

impl FileState {
    fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                warn!(path = %self.path.display(), error = %e, "failed to flush log file");
                self.writer = None;
            }
        }
    }
}

struct Shared {
    state: Mutex<FileState>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, FileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn open_append(path: &Path) -> std::io::Result<BufWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

/// Appends every line it observes to a file.
///
/// Writes go through a buffer that a background thread flushes every
/// `flush_interval`; dropping the writer stops that thread and flushes what
/// is left.
pub struct LogFileWriter {
    shared: Arc<Shared>,
    flusher: Option<JoinHandle<()>>,
}

impl LogFileWriter {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_flush_interval(path, DEFAULT_FLUSH_INTERVAL)
    }

    pub fn with_flush_interval(path: impl Into<PathBuf>, flush_interval: Duration) -> Result<Self> {
        let path = path.into();
        let writer = open_append(&path)?;

        let shared = Arc::new(Shared {
            state: Mutex::new(FileState {
                path,
                writer: Some(writer),
                line_ending: "\n".to_string(),
                terminate: false,
            }),
            wake: Condvar::new(),
        });

        let flusher = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("linetap-log-flush".to_string())
                .spawn(move || flush_periodically(&shared, flush_interval))?
        };

        Ok(Self {
            shared,
            flusher: Some(flusher),
        })
    }

    /// Use `ending` instead of `"\n"` after each line.
    pub fn with_line_ending(self, ending: impl Into<String>) -> Self {
        self.shared.lock().line_ending = ending.into();
        self
    }

    pub fn path(&self) -> PathBuf {
        self.shared.lock().path.clone()
    }

    pub fn flush(&self) {
        self.shared.lock().flush();
    }

    /// Flush the current file and continue appending to `path` instead.
    pub fn reopen(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let writer = open_append(&path)?;

        let mut state = self.shared.lock();
        state.flush();
        debug!(from = %state.path.display(), to = %path.display(), "switching log file");
        state.path = path;
        state.writer = Some(writer);
        Ok(())
    }
}

impl StreamObserver for LogFileWriter {
    fn on_line(&self, line: &str) {
        let mut state = self.shared.lock();
        if state.writer.is_none() {
            match open_append(&state.path) {
                Ok(writer) => state.writer = Some(writer),
                Err(e) => {
                    warn!(path = %state.path.display(), error = %e, "log file is not open");
                    return;
                }
            }
        }

        let FileState {
            writer,
            line_ending,
            path,
            ..
        } = &mut *state;
        if let Some(out) = writer.as_mut() {
            let written = out
                .write_all(line.as_bytes())
                .and_then(|()| out.write_all(line_ending.as_bytes()));
            if let Err(e) = written {
                warn!(path = %path.display(), error = %e, "failed to write log line");
                *writer = None;
            }
        }
    }
}

impl Drop for LogFileWriter {
    fn drop(&mut self) {
        self.shared.lock().terminate = true;
        self.shared.wake.notify_all();
        if let Some(flusher) = self.flusher.take() {
            let _ = flusher.join();
        }
        self.shared.lock().flush();
    }
}

impl std::fmt::Debug for LogFileWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogFileWriter")
            .field("path", &self.path())
            .finish_non_exhaustive()
    }
}

fn flush_periodically(shared: &Shared, interval: Duration) {
    let mut state = shared.lock();
    loop {
        state = shared
            .wake
            .wait_timeout_while(state, interval, |s| !s.terminate)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
        if state.terminate {
            break;
        }
        state.flush();
    }
}
