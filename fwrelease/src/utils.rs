use std::{
    ffi::OsStr,
    fmt, io,
    io::Read,
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
    process::{ExitStatus, Output, Stdio},
    thread,
    time::{Duration, Instant},
};

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

pub const WORKSPACE_VAR: &str = "${workspaceFolder}";

/// External programs the pipeline shells out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Signer,
    HttpClient,
    Commander,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tool::Signer => "image signer",
            Tool::HttpClient => "sign server client",
            Tool::Commander => "probe commander",
        };
        f.write_str(s)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("{tool}: failed to start `{program}`: {source}")]
    Spawn {
        tool: Tool,
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{tool} failed with {status}: {stderr}")]
    Failed {
        tool: Tool,
        status: ExitStatus,
        stderr: String,
    },
    #[error("{tool} timed out after {}s", .timeout.as_secs())]
    Timeout { tool: Tool, timeout: Duration },
    #[error("{tool}: {source}")]
    Io {
        tool: Tool,
        #[source]
        source: io::Error,
    },
}

impl ToolError {
    pub fn tool(&self) -> Tool {
        match self {
            ToolError::Spawn { tool, .. }
            | ToolError::Failed { tool, .. }
            | ToolError::Timeout { tool, .. }
            | ToolError::Io { tool, .. } => *tool,
        }
    }
}

/// Replaces `${workspaceFolder}` with `workdir`.
pub fn replace_vars(value: &str, workdir: &Path) -> String {
    value.replace(WORKSPACE_VAR, &workdir.display().to_string())
}

/// Resolves a configured path: variables substituted, relative paths joined to `workdir`.
pub fn resolve_path(value: &str, workdir: &Path) -> PathBuf {
    let path = PathBuf::from(replace_vars(value, workdir));
    if path.is_absolute() {
        path
    } else {
        workdir.join(path)
    }
}

pub struct Command {
    inner: std::process::Command,
    workdir: PathBuf,
    tool: Tool,
}

impl Deref for Command {
    type Target = std::process::Command;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Command {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl Command {
    pub fn new<S>(program: S, workdir: &Path, tool: Tool) -> Command
    where
        S: AsRef<OsStr>,
    {
        let program = replace_vars(&program.as_ref().to_string_lossy(), workdir);
        let mut cmd = std::process::Command::new(program);
        cmd.current_dir(workdir);

        Self {
            workdir: workdir.to_path_buf(),
            inner: cmd,
            tool,
        }
    }

    /// Builds a command from an argv-style list, e.g. `["python", "imgtool.py"]`.
    pub fn from_argv<S>(argv: &[S], workdir: &Path, tool: Tool) -> Result<Command, ToolError>
    where
        S: AsRef<str>,
    {
        let (program, rest) = argv.split_first().ok_or_else(|| ToolError::Spawn {
            tool,
            program: String::new(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
        })?;
        let mut cmd = Command::new(program.as_ref(), workdir, tool);
        cmd.args(rest.iter().map(|a| a.as_ref()));
        Ok(cmd)
    }

    pub fn cmd_line(&self) -> String {
        let mut cmd_str = self.get_program().to_string_lossy().to_string();

        for arg in self.get_args() {
            cmd_str += " ";
            cmd_str += arg.to_string_lossy().as_ref();
        }
        cmd_str
    }

    pub fn print_cmd(&self) {
        println!("{}", self.cmd_line().purple().bold());
    }

    fn spawn_error(&self, source: io::Error) -> ToolError {
        ToolError::Spawn {
            tool: self.tool,
            program: self.get_program().to_string_lossy().to_string(),
            source,
        }
    }

    fn check(&self, out: Output) -> Result<Output, ToolError> {
        let stdout = String::from_utf8_lossy(&out.stdout);
        let stderr = String::from_utf8_lossy(&out.stderr);
        if !stdout.trim().is_empty() {
            debug!("{} stdout:\n{}", self.tool, stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            debug!("{} stderr:\n{}", self.tool, stderr.trim_end());
        }

        if !out.status.success() {
            return Err(ToolError::Failed {
                tool: self.tool,
                status: out.status,
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(out)
    }

    /// Runs with captured output and checks the exit status.
    pub fn output_checked(&mut self) -> Result<Output, ToolError> {
        self.print_cmd();
        let out = self.output().map_err(|e| self.spawn_error(e))?;
        self.check(out)
    }

    /// Like [`Command::output_checked`], killing the child once `timeout` elapses.
    pub fn output_timeout(&mut self, timeout: Duration) -> Result<Output, ToolError> {
        self.print_cmd();
        let mut child = self
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(format!("waiting for {}", self.tool));
        pb.enable_steady_tick(Duration::from_millis(100));

        let tool = self.tool;
        let io_err = |source: io::Error| ToolError::Io { tool, source };
        let start = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait().map_err(io_err)? {
                break status;
            }
            if start.elapsed() >= timeout {
                pb.abandon_with_message(format!("{tool} timed out"));
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::Timeout { tool, timeout });
            }
            thread::sleep(Duration::from_millis(20));
        };
        pb.finish_and_clear();

        let out = Output {
            status,
            stdout: stdout.map(join_drain).unwrap_or_default(),
            stderr: stderr.map(join_drain).unwrap_or_default(),
        };
        self.check(out)
    }

    fn value_replace_with_var<S>(&self, value: S) -> String
    where
        S: AsRef<OsStr>,
    {
        replace_vars(&value.as_ref().to_string_lossy(), &self.workdir)
    }

    pub fn arg<S>(&mut self, arg: S) -> &mut Command
    where
        S: AsRef<OsStr>,
    {
        self.inner.arg(self.value_replace_with_var(arg));
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg.as_ref());
        }
        self
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_drain(handle: thread::JoinHandle<Vec<u8>>) -> Vec<u8> {
    handle.join().unwrap_or_default()
}

/// Parses `0x`-prefixed hex or plain decimal.
pub fn parse_hex_u32(s: &str) -> Result<u32, std::num::ParseIntError> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse::<u32>()
    }
}
