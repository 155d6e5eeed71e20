//! # linetap
//!
//! Intercept a process's line-oriented output channels and fan every
//! completed line out to observers in real time.
//!
//! ## Usage
//!
//! ```no_run
//! use linetap::{channel, Channel, LineRecorder, RedirectGuard};
//! use std::io::Write;
//! use std::sync::Arc;
//!
//! let recorder = Arc::new(LineRecorder::new());
//! let guard = RedirectGuard::acquire(Channel::Stdout)?;
//! guard.attach(&recorder)?;
//!
//! writeln!(linetap::sink::stdout().lock(), "captured")?;
//!
//! channel::shutdown(Channel::Stdout);
//! assert_eq!(recorder.lines(), vec!["captured"]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Modules
//!
//! - `buffer` - Growable, thread-safe line buffer with one blocking reader
//! - `redirect` - Sink redirection, the monitor thread and observer fan-out
//! - `observers` - Log file and in-memory observers
//! - `logging` - Leveled logging onto the process channels
//! - `launcher` - Run a child process with its output captured to a log file
//! - `config` - Redirect and launcher configuration
pub mod buffer;
pub mod config;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod observers;
pub mod redirect;

pub use buffer::{BufferError, BufferWriter, LineBuffer};
pub use config::{LauncherConfig, RedirectConfig};
pub use error::{Error, Result};
pub use observers::{LineRecorder, LogFileWriter};
pub use redirect::{
    channel, sink, Channel, ObserverRegistry, RedirectError, RedirectGuard, Redirector, Sink,
    StreamObserver, StreamSink,
};
