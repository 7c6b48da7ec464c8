// src/lib.rs

pub mod cache;
pub mod cli;
pub mod compile;
pub mod config;
pub mod errors;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod orchestrator;
pub mod protocol;
pub mod scheduler;
pub mod types;
pub mod worker;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::{BuildArgs, CliArgs, Command};
use crate::config::{check_arguments, load_optional};
use crate::fs::RealFileSystem;
use crate::orchestrator::Interrupts;
use crate::scheduler::ProcessLauncher;

/// High-level entry point used by `main.rs`.
///
/// Either serves as a worker process, or wires together:
/// - config loading and normalisation
/// - planning (scan + import graph)
/// - the scheduler over child worker processes
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    match &args.command {
        Some(Command::Worker(worker)) => {
            worker::run_process(worker.id, worker.settings()).await?;
            Ok(())
        }
        Some(Command::Build(build)) => run_build(build, &args).await,
        None => run_build(&args.build, &args).await,
    }
}

async fn run_build(build: &BuildArgs, args: &CliArgs) -> Result<()> {
    let cwd = std::env::current_dir().context("reading the working directory")?;
    let file = load_optional(build.config.as_deref(), &cwd)?;
    let config = check_arguments(build.to_raw().or(file), &cwd)?;
    let fs = Arc::new(RealFileSystem);

    if build.dry_run {
        print!("{}", orchestrator::dry_run(&config, fs)?);
        return Ok(());
    }

    let launcher = ProcessLauncher::current_exe(config.worker_settings())?
        .with_log_level(args.log_level.map(|l| l.as_str().to_string()));
    let report = orchestrator::run_build(&config, fs, launcher, Interrupts::CtrlC).await?;

    info!(
        targets = report.targets,
        workers = report.workers,
        replacements = report.replacements,
        "done"
    );
    Ok(())
}
