//! `io::Write` adapter that feeds a [`LineBuffer`]

use super::{BufferError, LineBuffer};
use std::io::{self, Write};
use std::sync::Arc;

/// Write destination installed into a sink while it is redirected.
///
/// Each `write` call is one atomic insertion into the shared buffer.
#[derive(Debug, Clone)]
pub struct BufferWriter {
    buffer: Arc<LineBuffer>,
}

impl BufferWriter {
    pub fn new(buffer: Arc<LineBuffer>) -> Self {
        Self { buffer }
    }
}

impl From<BufferError> for io::Error {
    fn from(err: BufferError) -> Self {
        let kind = match err {
            BufferError::AllocationFailed { .. } => io::ErrorKind::OutOfMemory,
            BufferError::Terminated => io::ErrorKind::BrokenPipe,
        };
        io::Error::new(kind, err)
    }
}

impl Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.buffer.append(buf)?)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.buffer.append(buf)?;
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Every append already wakes the reader.
        Ok(())
    }
}
