use std::{
    fmt,
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local, NaiveDate};

/// Rotated files kept next to the active log.
pub const DEFAULT_BACKUP_COUNT: usize = 90;

const ROTATED_DATE_FMT: &str = "%Y-%m-%d";

/// Append-only log file that rolls over at local midnight.
///
/// The active file keeps its name; on the first write of a new day it is renamed
/// to `<name>.<YYYY-MM-DD>` (the day it covered) and a fresh file is opened.
/// Only the newest `backup_count` rotated files are kept.
#[derive(Debug)]
pub struct RollingFile {
    path: PathBuf,
    backup_count: usize,
    file: Option<File>,
    day: NaiveDate,
}

impl RollingFile {
    pub fn open(path: impl AsRef<Path>, backup_count: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        let day = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => DateTime::<Local>::from(modified).date_naive(),
            Err(_) => Local::now().date_naive(),
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            backup_count,
            file: Some(file),
            day,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.write_line_at(Local::now(), line)
    }

    pub fn write_line_at(&mut self, now: DateTime<Local>, line: &str) -> io::Result<()> {
        if now.date_naive() > self.day {
            self.rotate(now.date_naive())?;
        }

        let file = match self.file.as_mut() {
            Some(f) => f,
            None => return Err(io::Error::other("log file closed")),
        };
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(f) => f.flush(),
            None => Ok(()),
        }
    }

    fn rotated_path(&self, day: NaiveDate) -> PathBuf {
        let mut name = self.file_name();
        name.push('.');
        name.push_str(&day.format(ROTATED_DATE_FMT).to_string());
        self.path.with_file_name(name)
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    fn rotate(&mut self, today: NaiveDate) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush()?;
        }

        let rotated = self.rotated_path(self.day);
        if rotated.exists() {
            fs::remove_file(&rotated)?;
        }
        if self.path.exists() {
            fs::rename(&self.path, &rotated)?;
        }
        debug!("Rotated {} -> {}", self.path.display(), rotated.display());

        self.file = Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?,
        );
        self.day = today;
        self.prune()
    }

    /// Rotated files next to the active one, oldest first.
    pub fn backups(&self) -> io::Result<Vec<PathBuf>> {
        let prefix = format!("{}.", self.file_name());
        let dir = match self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            Some(d) => d.to_path_buf(),
            None => PathBuf::from("."),
        };

        let mut found = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(suffix) = name.strip_prefix(&prefix)
                && let Ok(day) = NaiveDate::parse_from_str(suffix, ROTATED_DATE_FMT)
            {
                found.push((day, entry.path()));
            }
        }
        found.sort();
        Ok(found.into_iter().map(|(_, p)| p).collect())
    }

    fn prune(&self) -> io::Result<()> {
        let backups = self.backups()?;
        if backups.len() <= self.backup_count {
            return Ok(());
        }
        let excess = backups.len() - self.backup_count;
        for old in &backups[..excess] {
            debug!("Removing expired log {}", old.display());
            fs::remove_file(old)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Fatal => "FATAL",
        };
        f.write_str(s)
    }
}

pub fn format_line(now: DateTime<Local>, severity: Severity, msg: &str) -> String {
    format!("{} [{severity}] {msg}", now.format("%Y-%m-%d %H:%M:%S%.3f"))
}

/// Line log owned by one logger: a rolling file plus an optional console mirror.
///
/// Flushed when dropped.
#[derive(Debug)]
pub struct LineLog {
    file: RollingFile,
    console: bool,
}

impl LineLog {
    pub fn new(file: RollingFile) -> Self {
        Self {
            file,
            console: false,
        }
    }

    /// Opens `<dir>/<dir name>.log` with the default retention.
    pub fn in_dir(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "serial".to_string());
        let file = RollingFile::open(dir.join(format!("{name}.log")), DEFAULT_BACKUP_COUNT)?;
        Ok(Self::new(file))
    }

    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn log(&mut self, severity: Severity, msg: &str) -> io::Result<()> {
        self.log_at(Local::now(), severity, msg)
    }

    pub fn log_at(&mut self, now: DateTime<Local>, severity: Severity, msg: &str) -> io::Result<()> {
        let line = format_line(now, severity, msg);
        if self.console {
            println!("{line}");
        }
        self.file.write_line_at(now, &line)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl Drop for LineLog {
    fn drop(&mut self) {
        let _ = self.file.flush();
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_format_line() {
        let now = at(2024, 3, 7, 9);
        assert_eq!(
            format_line(now, Severity::Info, "hello"),
            "2024-03-07 09:00:00.000 [INFO] hello"
        );
    }

    #[test]
    fn test_rotates_on_new_day() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.log");
        let mut file = RollingFile::open(&path, 5).unwrap();
        file.day = at(2024, 3, 7, 0).date_naive();

        file.write_line_at(at(2024, 3, 7, 10), "first").unwrap();
        file.write_line_at(at(2024, 3, 8, 1), "second").unwrap();
        file.flush().unwrap();

        let rotated = dir.path().join("board.log.2024-03-07");
        assert_eq!(fs::read_to_string(&rotated).unwrap(), "first\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
    }

    #[test]
    fn test_prunes_old_backups() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.log");
        let mut file = RollingFile::open(&path, 2).unwrap();
        file.day = at(2024, 1, 1, 0).date_naive();

        for day in 1..=5 {
            file.write_line_at(at(2024, 1, day, 12), "x").unwrap();
        }

        let backups = file.backups().unwrap();
        let names: Vec<_> = backups
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["board.log.2024-01-03", "board.log.2024-01-04"]);
    }

    #[test]
    fn test_line_log_in_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("fw_v1");
        let mut log = LineLog::in_dir(&log_dir).unwrap();
        log.log(Severity::Info, "up").unwrap();
        log.flush().unwrap();

        let text = fs::read_to_string(log_dir.join("fw_v1.log")).unwrap();
        assert!(text.ends_with("[INFO] up\n"));
    }
}
