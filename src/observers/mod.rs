//! Ready-made line observers

pub mod log_file;
pub mod recorder;

pub use log_file::LogFileWriter;
pub use recorder::LineRecorder;
