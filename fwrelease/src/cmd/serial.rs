use std::{fs, path::PathBuf};

use clap::*;
use fwrelease::{ctx::AppContext, release::find_app_image, ui};
use serial_logger::{LineLog, LoggerThread, RESET_MARKER, SerialLogger};

#[derive(Args, Debug)]
pub struct LogCmd {
    /// Serial port, e.g. /dev/ttyUSB0 or COM3
    pub port: String,
    pub baud: u32,
    pub log_dir: PathBuf,
    /// Echo logged lines to the console
    #[arg(long)]
    pub console: bool,
    /// Text the firmware prints on reset; buffered partial data is dropped when seen
    #[arg(long, default_value = RESET_MARKER)]
    pub reset_marker: String,
}

/// Stops `thread` on Ctrl-C and waits for it.
fn run_until_ctrlc(thread: LoggerThread) -> anyhow::Result<()> {
    let stop = thread.stop_handle();
    ctrlc::set_handler(move || stop.stop())?;
    println!("logging, press Ctrl-C to stop");
    thread.join()?;
    Ok(())
}

impl LogCmd {
    pub fn run(&self, _ctx: &AppContext) -> anyhow::Result<()> {
        let log = LineLog::in_dir(&self.log_dir)?.with_console(self.console);
        info!("logging {} to {}", self.port, log.path().display());
        let logger = SerialLogger::open(&self.port, self.baud, log)?
            .with_reset_marker(self.reset_marker.as_str());
        run_until_ctrlc(logger.spawn())
    }
}

#[derive(Args, Debug)]
pub struct MonitorCmd {
    /// Release directory of the firmware running on the target
    pub fw_dir: PathBuf,
    pub port: String,
    pub baud: u32,
    /// Parent of the per-firmware log directory
    pub log_dir: PathBuf,
}

impl MonitorCmd {
    pub fn run(&self, ctx: &AppContext) -> anyhow::Result<()> {
        let app = find_app_image(&self.fw_dir)?;
        let stem = app
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| anyhow!("can not name log after {}", app.display()))?;

        let dir = self.log_dir.join(&stem);
        if dir.exists() {
            fs::remove_dir_all(&dir)?;
        }
        fs::create_dir_all(&dir)?;

        let log = LineLog::in_dir(&dir)?.with_console(true);
        let thread = SerialLogger::open(&self.port, self.baud, log)?.spawn();

        if let Err(e) = ui::phase("Reset target", || Ok(ctx.commander().reset()?)) {
            thread.stop()?;
            return Err(e);
        }
        run_until_ctrlc(thread)
    }
}
