//! Channel redirection and line monitoring
//!
//! A [`Redirector`] swaps a [`Sink`]'s write target for a [`LineBuffer`] and
//! runs one monitor thread that cuts the buffered bytes into lines and hands
//! each line to the attached observers.

pub mod channel;
pub mod observer;
pub mod sink;


pub use channel::{Channel, RedirectGuard};
pub use observer::{ObserverRegistry, StreamObserver};
pub use sink::{Sink, SinkTarget, SinkWriter, StreamSink};

use crate::buffer::{BufferWriter, LineBuffer};
use crate::config::{ConfigError, RedirectConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace};

#[derive(Debug, thiserror::Error)]
pub enum RedirectError {
    #[error("Failed to spawn monitor thread for {sink}: {source}")]
    Spawn {
        sink: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid redirect configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Active redirection of one sink.
///
/// Construction installs the buffer and starts the monitor thread; dropping
/// (or [`stop`](Self::stop)) terminates the buffer, joins the thread and
/// puts the original target back.
pub struct Redirector {
    sink: Arc<dyn Sink>,
    original: Mutex<Option<SinkTarget>>,
    buffer: Option<Arc<LineBuffer>>,
    registry: Arc<ObserverRegistry>,
    running: Arc<AtomicBool>,
    monitor: Option<JoinHandle<()>>,
}

impl Redirector {
    /// Redirect `sink` into a fresh line buffer and start monitoring it.
    pub fn start(sink: Arc<dyn Sink>, config: RedirectConfig) -> Result<Self, RedirectError> {
        config.validate()?;

        let buffer = Arc::new(LineBuffer::new(config.initial_capacity));
        let registry = Arc::new(ObserverRegistry::new());
        let running = Arc::new(AtomicBool::new(true));

        let original = sink.replace(Box::new(BufferWriter::new(Arc::clone(&buffer))));

        let monitor = {
            let buffer = Arc::clone(&buffer);
            let registry = Arc::clone(&registry);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name(format!("linetap-{}", sink.name()))
                .spawn(move || monitor_lines(&buffer, &registry, &running, &config))
        };

        let monitor = match monitor {
            Ok(handle) => handle,
            Err(source) => {
                sink.replace(original);
                return Err(RedirectError::Spawn {
                    sink: sink.name().to_string(),
                    source,
                });
            }
        };

        debug!(sink = %sink.name(), "redirection started");
        Ok(Self {
            sink,
            original: Mutex::new(Some(original)),
            buffer: Some(buffer),
            registry,
            running,
            monitor: Some(monitor),
        })
    }

    pub fn attach<O>(&self, observer: &Arc<O>)
    where
        O: StreamObserver + 'static,
    {
        self.registry.attach(observer);
    }

    /// Stop notifying `observer`. A line already being delivered may still
    /// reach it.
    pub fn detach<O>(&self, observer: &Arc<O>) -> usize
    where
        O: StreamObserver + ?Sized,
    {
        self.registry.detach(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.registry.len()
    }

    pub fn sink_name(&self) -> &str {
        self.sink.name()
    }

    pub fn is_running(&self) -> bool {
        self.monitor.is_some()
    }

    /// Tear down the redirection. Safe to call more than once.
    ///
    /// The buffer is terminated before the join so a reader blocked on an
    /// empty buffer always wakes, and the sink is only restored after the
    /// monitor thread has exited. When called from an observer on the monitor
    /// thread itself there is nothing to join; the sink is restored right away
    /// and the thread finishes draining on its own.
    pub fn stop(&mut self) {
        let Some(monitor) = self.monitor.take() else {
            return;
        };

        self.running.store(false, Ordering::Release);
        if let Some(buffer) = &self.buffer {
            buffer.terminate();
        }

        if monitor.thread().id() == thread::current().id() {
            // Stopped from an observer callback. The loop ends by itself once
            // the callback returns and the terminated buffer drains.
            debug!(sink = %self.sink.name(), "redirection stopped from its own monitor thread");
        } else if monitor.join().is_err() {
            error!(sink = %self.sink.name(), "monitor thread panicked; lines after the panic were not delivered");
        }

        {
            // Same lock notification snapshots under.
            let _observers = self.registry.lock();
            let original = self
                .original
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(original) = original {
                self.sink.replace(original);
            }
        }

        self.buffer = None;
        debug!(sink = %self.sink.name(), "redirection stopped");
    }
}

impl Drop for Redirector {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Redirector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Redirector")
            .field("sink", &self.sink.name())
            .field("running", &self.is_running())
            .field("observers", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Monitor thread body: cut the byte stream into lines until end of data.
///
/// The loop only exits when `read_byte` returns `None`, i.e. the buffer is
/// terminated and drained. `running` is cleared by `stop` before it
/// terminates the buffer; it is read afterwards to tell a requested stop
/// from a buffer terminated by someone else.
fn monitor_lines(
    buffer: &LineBuffer,
    registry: &ObserverRegistry,
    running: &AtomicBool,
    config: &RedirectConfig,
) {
    let mut line = Vec::new();

    while let Some(byte) = buffer.read_byte() {
        if byte != b'\n' {
            line.push(byte);
            continue;
        }

        if config.strip_carriage_return && line.last() == Some(&b'\r') {
            line.pop();
        }
        registry.notify_all(&String::from_utf8_lossy(&line));
        line.clear();
    }

    if running.load(Ordering::Acquire) {
        debug!("line buffer terminated while redirection still running");
    } else {
        trace!("line buffer drained");
    }

    if line.is_empty() {
        return;
    }
    if config.flush_partial_on_shutdown {
        registry.notify_all(&String::from_utf8_lossy(&line));
    } else {
        debug!(bytes = line.len(), "discarding unterminated line at shutdown");
    }
}
