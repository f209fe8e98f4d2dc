//! # serial-logger
//!
//! Line-oriented logging of a device's serial console.
//!
//! Bytes read from the port are split into lines, written to a log file that
//! rolls over at midnight, and optionally mirrored into a bounded queue that
//! another thread can poll while it waits for a particular message.
//!
//! ## Example
//!
//! ```rust,no_run
//! use serial_logger::{LineLog, LineQueue, SerialLogger};
//!
//! let log = LineLog::in_dir("logs/board")?;
//! let queue = LineQueue::with_capacity(256).ok_or("zero capacity")?;
//! let logger = SerialLogger::open("/dev/ttyUSB0", 115200, log)?.with_queue(queue.clone());
//! let thread = logger.spawn();
//!
//! queue.start_logging();
//! // ... poll queue.pop() ...
//! thread.stop()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod line;
mod logger;
mod queue;
mod rolling;

pub use line::{LineAssembler, RESET_MARKER};
pub use logger::{LoggerError, LoggerThread, READ_TIMEOUT, Result, SerialLogger, StopHandle};
pub use queue::LineQueue;
pub use rolling::{DEFAULT_BACKUP_COUNT, LineLog, RollingFile, Severity, format_line};

#[macro_use]
extern crate log;
