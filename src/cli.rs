// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::cache::DEFAULT_READ_BATCH;
use crate::compile::CompilerOptions;
use crate::config::{BuildSection, CompilerSection, RawConfig};
use crate::protocol::WorkerId;
use crate::worker::WorkerSettings;

/// Command-line arguments for `parless`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "parless",
    version,
    about = "Compile a tree of LESS stylesheets on a pool of worker processes.",
    long_about = None,
    args_conflicts_with_subcommands = true
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub build: BuildArgs,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PARLESS_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Build the affected targets (the default).
    Build(BuildArgs),

    /// Serve build jobs over stdin/stdout. Started by the controller.
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct BuildArgs {
    /// Source directory. Default: the working directory.
    #[arg(long, short = 'd', value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Output directory. Default: the source directory.
    #[arg(long, short = 'o', value_name = "DIR")]
    pub outputdir: Option<PathBuf>,

    /// Glob selecting source files, relative to the source directory.
    #[arg(long = "match", short = 'm', value_name = "GLOB")]
    pub match_pattern: Option<String>,

    /// Glob for partials that are only ever imported. Repeatable.
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Number of worker processes.
    #[arg(long, short = 'w', value_name = "N")]
    pub workers: Option<usize>,

    /// Extra import search path. Repeatable.
    #[arg(long = "paths", value_name = "DIR")]
    pub paths: Vec<PathBuf>,

    /// Only rebuild targets affected by this file. Repeatable.
    #[arg(long, value_name = "FILE")]
    pub changed: Vec<PathBuf>,

    /// Minify output.
    #[arg(long)]
    pub compress: bool,

    /// Seconds to wait for every worker to preload its cache.
    #[arg(long, value_name = "SECS")]
    pub ready_timeout: Option<u64>,

    /// Config file. Default: `Parless.toml` in the working directory, if present.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print targets and the files they need, but build nothing.
    #[arg(long)]
    pub dry_run: bool,
}

impl BuildArgs {
    /// Flags as a raw config layer; unset flags stay unset.
    pub fn to_raw(&self) -> RawConfig {
        RawConfig {
            build: BuildSection {
                directory: self.directory.clone(),
                outputdir: self.outputdir.clone(),
                match_pattern: self.match_pattern.clone(),
                exclude: self.exclude.clone(),
                workers: self.workers,
                paths: self.paths.clone(),
                changed: self.changed.clone(),
                ready_timeout: self.ready_timeout,
                read_batch: None,
            },
            compiler: CompilerSection {
                compress: self.compress.then_some(true),
            },
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct WorkerArgs {
    #[arg(long)]
    pub id: WorkerId,

    /// Last-resort import lookup directory.
    #[arg(long)]
    pub cwd: PathBuf,

    #[arg(long = "paths")]
    pub paths: Vec<PathBuf>,

    #[arg(long)]
    pub compress: bool,

    #[arg(long, default_value_t = DEFAULT_READ_BATCH)]
    pub read_batch: usize,
}

impl WorkerArgs {
    pub fn settings(&self) -> WorkerSettings {
        WorkerSettings {
            search_paths: self.paths.clone(),
            cwd: self.cwd.clone(),
            options: CompilerOptions {
                compress: self.compress,
            },
            read_batch: self.read_batch,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
