//! In-memory observer

use crate::redirect::StreamObserver;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Keeps every line it is notified with, in arrival order.
#[derive(Debug, Default)]
pub struct LineRecorder {
    lines: Mutex<Vec<String>>,
    arrived: Condvar,
}

impl LineRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the lines recorded so far
    pub fn lines(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the recorded lines, leaving the recorder empty.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    /// Block until at least `count` lines are recorded or `timeout` elapses.
    ///
    /// Returns whether the count was reached.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut lines = self.lock();
        while lines.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            lines = self
                .arrived
                .wait_timeout(lines, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

impl StreamObserver for LineRecorder {
    fn on_line(&self, line: &str) {
        self.lock().push(line.to_string());
        self.arrived.notify_all();
    }
}
