use std::path::PathBuf;

use clap::*;
use colored::Colorize;
use fwrelease::{
    ctx::AppContext,
    release::{Extras, Packager},
    ui,
};

#[derive(Args, Debug)]
pub struct Cmd {
    /// Primary binary
    pub bin: PathBuf,
    #[arg(long)]
    pub fw_name: String,
    /// Defaults to the binary's file stem
    #[arg(long)]
    pub artifact: Option<String>,
    #[arg(long)]
    pub raw: bool,
    #[arg(long)]
    pub signed: bool,
    #[arg(long)]
    pub manifest: bool,
    #[arg(long)]
    pub hex: bool,
    #[arg(long)]
    pub no_boot: bool,
}

impl Cmd {
    pub fn run(&self, ctx: &mut AppContext) -> anyhow::Result<()> {
        let artifact = match &self.artifact {
            Some(a) => a.clone(),
            None => self
                .bin
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .ok_or_else(|| anyhow!("can not name artifact after {}", self.bin.display()))?,
        };
        let extras = Extras {
            raw: self.raw,
            signed: self.signed,
            manifest: self.manifest,
            combined_hex: self.hex,
            no_boot: self.no_boot,
        };

        let meta = ctx.build_metadata()?.clone();
        let packager = Packager::new(&meta, artifact, &self.fw_name, extras)?;
        let release = ui::phase(&format!("Package {}", packager.dir_name()), || {
            packager.package(&self.bin)
        })?;

        for file in &release.files {
            println!("  {}", file.display());
        }
        println!("{}", format!("release: {}", release.dir.display()).green());
        Ok(())
    }
}
