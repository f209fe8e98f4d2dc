use std::{
    io::{ErrorKind, Read},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use serialport::SerialPort;

use crate::{
    line::LineAssembler,
    queue::LineQueue,
    rolling::{LineLog, Severity},
};

/// Read timeout applied to opened ports; bounds how long [`StopHandle::stop`] takes.
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

const READ_CHUNK: usize = 1024;

#[derive(thiserror::Error, Debug)]
pub enum LoggerError {
    #[error("failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },
    #[error("serial read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("log write failed: {0}")]
    Log(#[source] std::io::Error),
    #[error("logger thread panicked")]
    Panicked,
}

pub type Result<T> = std::result::Result<T, LoggerError>;

/// Cooperative stop flag, checked once per read iteration.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Reads lines from a serial stream into a [`LineLog`] and, optionally, a [`LineQueue`].
///
/// The reader is owned for the lifetime of the run loop and dropped (closing the
/// port) on every exit path.
pub struct SerialLogger<R> {
    rx: R,
    log: LineLog,
    queue: Option<LineQueue>,
    assembler: LineAssembler,
    stop: StopHandle,
    source: String,
}

impl SerialLogger<Box<dyn SerialPort>> {
    pub fn open(port: &str, baud_rate: u32, log: LineLog) -> Result<Self> {
        let rx = serialport::new(port, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| LoggerError::Open {
                port: port.to_string(),
                source,
            })?;
        info!("Opened {port} @ {baud_rate}");
        Ok(Self::new(rx, log).with_source(format!("port {port} baud rate {baud_rate}")))
    }
}

impl<R: Read> SerialLogger<R> {
    pub fn new(rx: R, log: LineLog) -> Self {
        Self {
            rx,
            log,
            queue: None,
            assembler: LineAssembler::default(),
            stop: StopHandle::default(),
            source: "stream".to_string(),
        }
    }

    /// Describes the reader in the line log's start entry.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn with_queue(mut self, queue: LineQueue) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn with_reset_marker(mut self, marker: impl Into<String>) -> Self {
        self.assembler = LineAssembler::new(marker);
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs until stopped, end of stream, or a read error.
    pub fn run(mut self) -> Result<()> {
        debug!("Serial logger loop started, log: {}", self.log.path().display());
        let res = self
            .log
            .log(Severity::Debug, &format!("logging {}", self.source))
            .map_err(LoggerError::Log)
            .and_then(|_| self.read_loop());

        if let Err(e) = &res {
            error!("FAIL: {e}");
            let _ = self.log.log(Severity::Fatal, &format!("FAIL: {e}"));
        }
        let _ = self.log.flush();
        debug!("Serial logger loop finished");
        res
    }

    fn read_loop(&mut self) -> Result<()> {
        let mut buf = [0u8; READ_CHUNK];

        while !self.stop.is_stopped() {
            let n = match self.rx.read(&mut buf) {
                Ok(0) => {
                    debug!("Serial stream closed");
                    return Ok(());
                }
                Ok(n) => n,
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) =>
                {
                    continue;
                }
                Err(e) => return Err(LoggerError::Read(e)),
            };

            for line in self.assembler.push(&buf[..n]) {
                self.log
                    .log(Severity::Info, &line)
                    .map_err(LoggerError::Log)?;
                if let Some(queue) = &self.queue {
                    queue.push(line);
                }
            }
        }
        Ok(())
    }
}

impl<R: Read + Send + 'static> SerialLogger<R> {
    /// Moves the logger onto its own thread.
    pub fn spawn(self) -> LoggerThread {
        let stop = self.stop_handle();
        let handle = thread::spawn(move || self.run());
        LoggerThread { stop, handle }
    }
}

pub struct LoggerThread {
    stop: StopHandle,
    handle: thread::JoinHandle<Result<()>>,
}

impl LoggerThread {
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Requests a stop and waits for the loop to exit.
    pub fn stop(self) -> Result<()> {
        self.stop.stop();
        self.join()
    }

    pub fn join(self) -> Result<()> {
        self.handle.join().map_err(|_| LoggerError::Panicked)?
    }
}
