//! J-Link Commander wrapper.
//!
//! Every operation writes a short command script to a temporary `*.jlink` file
//! and runs the commander on it with a bounded wait.

use std::{
    io::Write,
    path::{Path, PathBuf},
    process::Output,
    time::Duration,
};

use crate::{
    config::ProbeConfig,
    utils::{Command, Tool, ToolError},
};

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// A commander script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOp<'a> {
    Reset,
    ResetErase,
    Program {
        file: &'a Path,
        addr: u32,
        erase: bool,
    },
}

impl ProbeOp<'_> {
    pub fn script(&self) -> Vec<String> {
        let mut lines: Vec<String> = Vec::new();
        match self {
            ProbeOp::Reset => {
                lines.push("r".into());
            }
            ProbeOp::ResetErase => {
                lines.extend(["r", "h", "erase", "r"].map(String::from));
            }
            ProbeOp::Program { file, addr, erase } => {
                lines.extend(["r", "h"].map(String::from));
                if *erase {
                    lines.push("erase".into());
                }
                lines.push(format!("loadbin {},0x{addr:08X}", file.display()));
                lines.push(format!("verifybin {},0x{addr:08X}", file.display()));
                lines.extend(["r", "g"].map(String::from));
            }
        }
        lines.push("q".into());
        lines
    }

    fn describe(&self) -> String {
        match self {
            ProbeOp::Reset => "reset".to_string(),
            ProbeOp::ResetErase => "reset + erase".to_string(),
            ProbeOp::Program { file, addr, erase } => format!(
                "{}program {} at 0x{addr:08X}",
                if *erase { "erase + " } else { "" },
                file.display()
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Commander {
    pub program: String,
    pub device: String,
    pub interface: String,
    pub speed_khz: u32,
    pub timeout: Duration,
    workdir: PathBuf,
}

impl Commander {
    pub fn from_config(config: &ProbeConfig, workdir: &Path) -> Self {
        Self {
            program: config.program.clone(),
            device: config.device.clone(),
            interface: config.interface.clone(),
            speed_khz: config.speed_khz,
            timeout: Duration::from_secs(config.timeout_secs),
            workdir: workdir.to_path_buf(),
        }
    }

    pub fn reset(&self) -> Result<Output, ToolError> {
        self.execute(ProbeOp::Reset)
    }

    pub fn reset_erase(&self) -> Result<Output, ToolError> {
        self.execute(ProbeOp::ResetErase)
    }

    pub fn reset_program_verify_reset(&self, file: &Path, addr: u32) -> Result<Output, ToolError> {
        self.execute(ProbeOp::Program {
            file,
            addr,
            erase: false,
        })
    }

    pub fn reset_erase_program_verify_reset(
        &self,
        file: &Path,
        addr: u32,
    ) -> Result<Output, ToolError> {
        self.execute(ProbeOp::Program {
            file,
            addr,
            erase: true,
        })
    }

    fn command(&self, script: &Path) -> Command {
        let mut cmd = Command::new(&self.program, &self.workdir, Tool::Commander);
        cmd.arg("-device")
            .arg(&self.device)
            .arg("-if")
            .arg(&self.interface)
            .arg("-speed")
            .arg(self.speed_khz.to_string())
            .arg("-autoconnect")
            .arg("1")
            .arg("-CommanderScript")
            .arg(script);
        cmd
    }

    pub fn execute(&self, op: ProbeOp<'_>) -> Result<Output, ToolError> {
        let io_err = |source: std::io::Error| ToolError::Io {
            tool: Tool::Commander,
            source,
        };

        // removed when `script` drops, on every path
        let mut script = tempfile::Builder::new()
            .prefix("fwrelease-")
            .suffix(".jlink")
            .tempfile()
            .map_err(io_err)?;
        let mut text = op.script().join("\n");
        text.push('\n');
        script.write_all(text.as_bytes()).map_err(io_err)?;
        script.flush().map_err(io_err)?;

        debug!("commander script for {}:\n{text}", op.describe());
        self.command(script.path()).output_timeout(self.timeout)
    }
}
