use std::{env::current_dir, path::PathBuf, process::ExitCode};

use clap::*;
use colored::Colorize;
use fwrelease::ctx::AppContext;

mod cmd;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Project directory holding `.fwrelease.toml`
    #[arg(short, long)]
    workdir: Option<PathBuf>,
    #[arg(short, long)]
    verbose: bool,
    #[command(subcommand)]
    command: SubCommands,
}

#[derive(Subcommand)]
enum SubCommands {
    /// Print the build metadata header
    Metadata(cmd::metadata::Cmd),
    /// Slice, sign and describe a built image
    Sign(cmd::sign::Cmd),
    /// Copy a binary and its artifacts into a release directory
    Package(cmd::package::Cmd),
    /// Run a debug-probe operation
    Probe(cmd::probe::Cmd),
    /// Program a release directory onto the target
    Prog(cmd::probe::ProgCmd),
    /// Log a serial port to a rotating file
    Log(cmd::serial::LogCmd),
    /// Reset the target and log its serial output
    Monitor(cmd::serial::MonitorCmd),
}

fn init_logger(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let workdir = match cli.workdir {
        Some(dir) => dir,
        None => current_dir()?,
    };
    let mut ctx = AppContext::load(workdir)?;

    match cli.command {
        SubCommands::Metadata(cmd) => cmd.run(&mut ctx),
        SubCommands::Sign(cmd) => cmd.run(&mut ctx),
        SubCommands::Package(cmd) => cmd.run(&mut ctx),
        SubCommands::Probe(cmd) => cmd.run(&ctx),
        SubCommands::Prog(cmd) => cmd.run(&ctx),
        SubCommands::Log(cmd) => cmd.run(&ctx),
        SubCommands::Monitor(cmd) => cmd.run(&ctx),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", format!("FAIL: {e:#}").red());
            ExitCode::FAILURE
        }
    }
}

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;
