//! Write-ahead logging of page images.
//!
//! The buffer pool logs a before/after image of every page it writes and
//! forces the log before the page reaches the heap file.

mod log_file;
mod log_record;

pub use log_file::LogFile;
pub use log_record::{LogRecord, LogSink, MemoryLog};
