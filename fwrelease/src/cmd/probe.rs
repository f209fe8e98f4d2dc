use std::path::PathBuf;

use clap::*;
use fwrelease::{
    ctx::AppContext,
    release::{find_app_image, find_signed_image},
    ui,
    utils::parse_hex_u32,
};

#[derive(Args, Debug)]
pub struct Cmd {
    #[command(subcommand)]
    pub op: ProbeOp,
}

#[derive(Subcommand, Debug)]
pub enum ProbeOp {
    /// Reset and run
    Reset,
    /// Reset, halt and erase the whole flash
    Erase,
    /// Load a binary, verify it, reset and run
    Program {
        bin: PathBuf,
        #[arg(value_parser = parse_hex_u32)]
        addr: u32,
        /// Erase the flash first
        #[arg(long)]
        erase: bool,
    },
}

impl Cmd {
    pub fn run(&self, ctx: &AppContext) -> anyhow::Result<()> {
        let commander = ctx.commander();
        match &self.op {
            ProbeOp::Reset => ui::phase("Reset target", || Ok(commander.reset()?))?,
            ProbeOp::Erase => ui::phase("Erase target", || Ok(commander.reset_erase()?))?,
            ProbeOp::Program { bin, addr, erase } => {
                ui::phase(&format!("Program {}", bin.display()), || {
                    if *erase {
                        Ok(commander.reset_erase_program_verify_reset(bin, *addr)?)
                    } else {
                        Ok(commander.reset_program_verify_reset(bin, *addr)?)
                    }
                })?
            }
        };
        Ok(())
    }
}

#[derive(Args, Debug)]
pub struct ProgCmd {
    /// Release directory
    pub fw_dir: PathBuf,
    /// Flash address of the application image
    #[arg(value_parser = parse_hex_u32)]
    pub app_addr: u32,
    /// Flash address of the signed image; not programmed when omitted
    #[arg(value_parser = parse_hex_u32)]
    pub signed_addr: Option<u32>,
}

impl ProgCmd {
    pub fn run(&self, ctx: &AppContext) -> anyhow::Result<()> {
        let commander = ctx.commander();
        let app = find_app_image(&self.fw_dir)?;
        ui::phase(&format!("Program {}", app.display()), || {
            Ok(commander.reset_erase_program_verify_reset(&app, self.app_addr)?)
        })?;

        if let Some(addr) = self.signed_addr {
            let signed = find_signed_image(&self.fw_dir)?;
            ui::phase(&format!("Program {}", signed.display()), || {
                Ok(commander.reset_program_verify_reset(&signed, addr)?)
            })?;
        }
        Ok(())
    }
}
