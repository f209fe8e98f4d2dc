use std::path::PathBuf;

use clap::*;
use colored::Colorize;
use fwrelease::{
    ctx::AppContext,
    pipeline::{SignArgs, run_sign},
    utils::parse_hex_u32,
};

#[derive(Args, Debug)]
pub struct Cmd {
    /// Build target; the `.bin` next to it is signed
    pub target: PathBuf,
    /// Image slot size, e.g. 0x60000
    #[arg(long, value_parser = parse_hex_u32)]
    pub slot_size: u32,
    /// Bootloader region length, e.g. 0x20000
    #[arg(long, value_parser = parse_hex_u32)]
    pub boot_len: u32,
    /// Also write `<stem>_Combined.hex` (bootloader + signed image)
    #[arg(long)]
    pub combined_hex: bool,
    /// Also write `<stem>_NoBoot.bin`
    #[arg(long)]
    pub no_boot: bool,
    /// Skip the boot metadata header
    #[arg(long)]
    pub no_boot_meta: bool,
}

impl Cmd {
    pub fn run(&self, ctx: &mut AppContext) -> anyhow::Result<()> {
        let args = SignArgs {
            target: self.target.clone(),
            slot_size: self.slot_size,
            boot_len: self.boot_len,
            combined_hex: self.combined_hex,
            no_boot: self.no_boot,
            boot_meta: !self.no_boot_meta,
        };
        let report = run_sign(ctx, &args)?;
        println!(
            "{}",
            format!("signed image: {}", report.signed.signed.display()).green()
        );
        Ok(())
    }
}
