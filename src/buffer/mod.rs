//! Synchronous line buffer bridging output writers and the monitor thread
//!
//! The buffer is a single contiguous `Vec<u8>` split into an unread region
//! (`read_cursor..read_limit`) and a writable region (`write_cursor..write_limit`).
//! Every append is followed by a reconciliation step that moves the unread bytes
//! to the front of the storage with the new bytes directly after them, so
//! "data available" is just `read_cursor != read_limit` and no ring-buffer
//! arithmetic is needed.

pub mod writer;


pub use writer::BufferWriter;

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Default size of a freshly created buffer, in bytes
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("Failed to grow line buffer to {requested} bytes")]
    AllocationFailed { requested: usize },

    #[error("Line buffer has been terminated")]
    Terminated,
}

/// Offsets and storage, only ever touched with the buffer lock held
#[derive(Debug)]
struct Regions {
    storage: Vec<u8>,
    read_cursor: usize,
    read_limit: usize,
    write_base: usize,
    write_cursor: usize,
    write_limit: usize,
    terminated: bool,
}

impl Regions {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0; capacity],
            read_cursor: 0,
            read_limit: 0,
            write_base: 0,
            write_cursor: 0,
            write_limit: capacity,
            terminated: false,
        }
    }

    fn has_unread(&self) -> bool {
        self.read_cursor != self.read_limit
    }

    fn writable(&self) -> usize {
        self.write_limit - self.write_cursor
    }

    /// Double the storage until `incoming` more bytes fit in the put area.
    ///
    /// Offsets are indices, so they stay valid across the reallocation; only
    /// the write limit moves.
    fn grow_for(&mut self, incoming: usize) -> Result<(), BufferError> {
        let needed = self.write_cursor + incoming;
        let mut capacity = self.storage.len();
        while capacity < needed {
            capacity = capacity
                .checked_mul(2)
                .ok_or(BufferError::AllocationFailed { requested: needed })?;
        }

        let additional = capacity - self.storage.len();
        self.storage
            .try_reserve_exact(additional)
            .map_err(|_| BufferError::AllocationFailed {
                requested: capacity,
            })?;
        self.storage.resize(capacity, 0);
        self.write_limit = capacity;

        tracing::trace!(capacity, "line buffer grew");
        Ok(())
    }

    /// Merge the unread bytes and the pending put-area bytes into one
    /// contiguous unread region starting at offset zero.
    fn sync(&mut self) {
        let unread = self.read_limit - self.read_cursor;
        let pending = self.write_cursor - self.write_base;

        self.storage
            .copy_within(self.read_cursor..self.read_limit, 0);
        self.storage
            .copy_within(self.write_base..self.write_cursor, unread);

        self.read_cursor = 0;
        self.read_limit = unread + pending;
        self.write_base = self.read_limit;
        self.write_cursor = self.read_limit;
        self.write_limit = self.storage.len();
    }
}

/// Growable, thread-safe byte buffer with one blocking reader.
///
/// Any number of threads may [`append`](Self::append); exactly one thread is
/// expected to drain it with [`read_byte`](Self::read_byte). All operations
/// serialize on one mutex, so bytes come out in the order their `append`
/// calls acquired the lock and one call is never split by another.
#[derive(Debug)]
pub struct LineBuffer {
    regions: Mutex<Regions>,
    data_ready: Condvar,
}

impl LineBuffer {
    /// Create a buffer with `initial_capacity` bytes of storage (at least one).
    pub fn new(initial_capacity: usize) -> Self {
        Self {
            regions: Mutex::new(Regions::with_capacity(initial_capacity.max(1))),
            data_ready: Condvar::new(),
        }
    }

    // A panicking observer can't poison this lock (it's never held across
    // observer calls), and every critical section leaves the offsets valid.
    fn lock(&self) -> MutexGuard<'_, Regions> {
        self.regions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy `bytes` into the buffer and wake the reader.
    ///
    /// Returns the number of bytes accepted, which is always `bytes.len()` on
    /// success. Fails if the buffer was terminated or growth could not
    /// allocate; in both cases nothing is stored.
    pub fn append(&self, bytes: &[u8]) -> Result<usize, BufferError> {
        let mut regions = self.lock();
        if regions.terminated {
            return Err(BufferError::Terminated);
        }

        if regions.writable() < bytes.len() {
            regions.grow_for(bytes.len())?;
        }

        let start = regions.write_cursor;
        regions.storage[start..start + bytes.len()].copy_from_slice(bytes);
        regions.write_cursor += bytes.len();

        regions.sync();
        drop(regions);

        self.data_ready.notify_all();
        Ok(bytes.len())
    }

    /// Take the next unread byte, blocking until one exists.
    ///
    /// Returns `None` once the buffer is terminated and fully drained.
    /// Bytes still buffered at termination are handed out first.
    pub fn read_byte(&self) -> Option<u8> {
        let guard = self.lock();
        let mut regions = self
            .data_ready
            .wait_while(guard, |r| !r.has_unread() && !r.terminated)
            .unwrap_or_else(PoisonError::into_inner);

        if regions.has_unread() {
            let byte = regions.storage[regions.read_cursor];
            regions.read_cursor += 1;
            Some(byte)
        } else {
            None
        }
    }

    /// Signal end of data and wake every waiter.
    ///
    /// Safe to call repeatedly from any thread; returns `true` only for the
    /// call that flipped the flag.
    pub fn terminate(&self) -> bool {
        let mut regions = self.lock();
        let first = !regions.terminated;
        regions.terminated = true;
        drop(regions);

        self.data_ready.notify_all();
        first
    }

    pub fn is_terminated(&self) -> bool {
        self.lock().terminated
    }

    /// Current size of the backing storage
    pub fn capacity(&self) -> usize {
        self.lock().storage.len()
    }

    /// Bytes appended but not yet read
    pub fn unread_len(&self) -> usize {
        let regions = self.lock();
        regions.read_limit - regions.read_cursor
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
