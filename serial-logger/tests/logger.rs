use std::{
    collections::VecDeque,
    fs,
    io::{self, Read},
    thread,
    time::Duration,
};

use ntest::timeout;
use serial_logger::{LineLog, LineQueue, LoggerError, SerialLogger};

/// Hands out one scripted chunk per read, then reports end of stream.
struct Chunks(VecDeque<io::Result<Vec<u8>>>);

impl Chunks {
    fn new<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Self {
        Self(chunks.into_iter().map(|c| Ok(c.to_vec())).collect())
    }
}

impl Read for Chunks {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.pop_front() {
            Some(Ok(chunk)) => {
                buf[..chunk.len()].copy_from_slice(&chunk);
                Ok(chunk.len())
            }
            Some(Err(e)) => Err(e),
            None => Ok(0),
        }
    }
}

/// Never yields data, like an idle port with a read timeout.
struct Idle;

impl Read for Idle {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        thread::sleep(Duration::from_millis(10));
        Err(io::ErrorKind::TimedOut.into())
    }
}

fn logged_messages(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|l| l.split_once("[INFO] ").map(|(_, m)| m.to_string()))
        .collect()
}

#[test]
fn test_lines_split_across_reads() {
    let dir = tempfile::tempdir().unwrap();
    let log = LineLog::in_dir(dir.path().join("dev")).unwrap();
    let log_path = log.path().to_path_buf();

    let rx = Chunks::new([b"A\r".as_slice(), b"\nB\r\n".as_slice()]);
    SerialLogger::new(rx, log).run().unwrap();

    let text = fs::read_to_string(log_path).unwrap();
    assert_eq!(logged_messages(&text), vec!["A", "B"]);
}

#[test]
fn test_reset_marker_discards_partial_data() {
    let dir = tempfile::tempdir().unwrap();
    let log = LineLog::in_dir(dir.path().join("dev")).unwrap();
    let log_path = log.path().to_path_buf();

    let rx = Chunks::new([
        b"before\r\nhalf-".as_slice(),
        b"line ------\r\n".as_slice(),
        b"after\r\n".as_slice(),
    ]);
    SerialLogger::new(rx, log).run().unwrap();

    let text = fs::read_to_string(log_path).unwrap();
    assert_eq!(logged_messages(&text), vec!["before", "after"]);
}

#[test]
fn test_custom_reset_marker() {
    let dir = tempfile::tempdir().unwrap();
    let log = LineLog::in_dir(dir.path().join("dev")).unwrap();
    let log_path = log.path().to_path_buf();

    let rx = Chunks::new([b"keep\r\njunk *** BOOT ***\r\n------\r\n".as_slice()]);
    SerialLogger::new(rx, log)
        .with_reset_marker("*** BOOT ***")
        .run()
        .unwrap();

    let text = fs::read_to_string(log_path).unwrap();
    assert_eq!(logged_messages(&text), vec!["keep", "------"]);
}

#[test]
fn test_start_entry_names_source() {
    let dir = tempfile::tempdir().unwrap();
    let log = LineLog::in_dir(dir.path().join("dev")).unwrap();
    let log_path = log.path().to_path_buf();

    let rx = Chunks::new([b"hello\n".as_slice()]);
    SerialLogger::new(rx, log)
        .with_source("port COM7 baud rate 115200")
        .run()
        .unwrap();

    let text = fs::read_to_string(log_path).unwrap();
    let first = text.lines().next().unwrap();
    assert!(first.ends_with("[DEBUG] logging port COM7 baud rate 115200"));
    assert_eq!(logged_messages(&text), vec!["hello"]);
}

#[test]
fn test_queue_only_fed_while_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let log = LineLog::in_dir(dir.path().join("dev")).unwrap();
    let queue = LineQueue::with_capacity(2).unwrap();
    queue.start_logging();

    let rx = Chunks::new([b"one\ntwo\nthree\n".as_slice()]);
    SerialLogger::new(rx, log)
        .with_queue(queue.clone())
        .run()
        .unwrap();

    assert_eq!(queue.len(), 2);
    assert_eq!(queue.pop().as_deref(), Some("two"));
    assert_eq!(queue.last().as_deref(), Some("three"));

    queue.stop_logging();
    assert!(queue.is_empty());
}

#[test]
fn test_read_error_is_logged_as_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let log = LineLog::in_dir(dir.path().join("dev")).unwrap();
    let log_path = log.path().to_path_buf();

    let mut rx = Chunks::new([b"ok\n".as_slice()]);
    rx.0
        .push_back(Err(io::Error::new(io::ErrorKind::BrokenPipe, "unplugged")));

    let err = SerialLogger::new(rx, log).run().unwrap_err();
    assert!(matches!(err, LoggerError::Read(_)));

    let text = fs::read_to_string(log_path).unwrap();
    assert!(text.contains("[INFO] ok"));
    assert!(text.contains("[FATAL] FAIL: serial read failed: unplugged"));
}

#[test]
#[timeout(5000)]
fn test_stop_idle_logger_thread() {
    let dir = tempfile::tempdir().unwrap();
    let log = LineLog::in_dir(dir.path().join("dev")).unwrap();

    let thread = SerialLogger::new(Idle, log).spawn();
    thread::sleep(Duration::from_millis(50));
    assert!(!thread.is_finished());

    thread.stop().unwrap();
}
