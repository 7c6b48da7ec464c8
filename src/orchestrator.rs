// src/orchestrator.rs

//! Run-to-completion entry point.
//!
//! Wires the dependency graph's output into the scheduler's job queue:
//! scan, build the import graph, pick the affected targets, map them to
//! jobs, then hand everything to a [`Scheduler`] over the given launcher.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::BuildConfig;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::graph::{scan, DependencyGraph, ImportResolver, SourceMatcher};
use crate::scheduler::{Scheduler, SchedulerCore, SchedulerInput, WorkerLauncher};
use crate::types::{BuildReport, Job};

/// What a run would do, computed without starting any worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    pub jobs: Vec<Job>,
    /// Sorted; sent to every worker in its `start` command.
    pub files_to_read: Vec<PathBuf>,
    pub import_cycles: Vec<Vec<PathBuf>>,
    /// Files matched by the scan, targets and partials alike.
    pub scanned: usize,
}

/// Whether a run listens for Ctrl-C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupts {
    CtrlC,
    Ignore,
}

/// Scan `config.directory` and decide which targets to build.
pub fn plan(config: &BuildConfig, fs: Arc<dyn FileSystem>) -> Result<BuildPlan> {
    let matcher = SourceMatcher::new(&config.match_pattern, &config.exclude)?;
    let scanned = scan(fs.as_ref(), &config.directory, &matcher)?;

    let mut resolver =
        ImportResolver::new(Arc::clone(&fs), config.paths.clone(), config.cwd.clone());
    let graph = DependencyGraph::build(fs.as_ref(), &mut resolver, &scanned)?;

    let import_cycles = graph.import_cycles();
    for cycle in &import_cycles {
        warn!(files = ?cycle, "import cycle");
    }

    let affected = graph.affected_targets(&config.changed);
    let jobs = affected
        .targets
        .iter()
        .map(|target| Job::for_target(target, &config.directory, &config.outputdir))
        .collect();

    Ok(BuildPlan {
        jobs,
        files_to_read: affected.files_to_read.into_iter().collect(),
        import_cycles,
        scanned: scanned.len(),
    })
}

/// Build every affected target on a worker pool started by `launcher`.
///
/// Resolves with a report once every job drained, or with the error that
/// aborted the run. With nothing to build no worker is started.
pub async fn run_build<L>(
    config: &BuildConfig,
    fs: Arc<dyn FileSystem>,
    launcher: L,
    interrupts: Interrupts,
) -> Result<BuildReport>
where
    L: WorkerLauncher,
{
    let plan = plan(config, fs)?;
    info!(
        scanned = plan.scanned,
        targets = plan.jobs.len(),
        files = plan.files_to_read.len(),
        "build planned"
    );

    if plan.jobs.is_empty() {
        info!("nothing to build");
        return Ok(BuildReport {
            files_read: plan.files_to_read.len(),
            ..BuildReport::default()
        });
    }

    let core = SchedulerCore::new(
        config.workers,
        plan.jobs,
        plan.files_to_read,
        config.ready_timeout,
    );
    let scheduler = Scheduler::new(core, launcher);

    let interrupt_task = match interrupts {
        Interrupts::CtrlC => {
            let tx = scheduler.input_sender();
            Some(tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    return;
                }
                let _ = tx.send(SchedulerInput::ShutdownRequested).await;
            }))
        }
        Interrupts::Ignore => None,
    };

    let result = scheduler.run().await;
    if let Some(task) = interrupt_task {
        task.abort();
    }
    result
}

/// Human-readable plan: targets with destinations, the preload set and
/// import cycles.
pub fn dry_run(config: &BuildConfig, fs: Arc<dyn FileSystem>) -> Result<String> {
    let plan = plan(config, fs)?;
    let mut out = String::new();

    let _ = writeln!(out, "parless dry-run");
    let _ = writeln!(out, "  directory = {}", config.directory.display());
    let _ = writeln!(out, "  outputdir = {}", config.outputdir.display());
    let _ = writeln!(out, "  workers   = {}", config.workers);
    let _ = writeln!(out);

    let _ = writeln!(out, "targets ({}):", plan.jobs.len());
    for job in &plan.jobs {
        let _ = writeln!(out, "  - {} -> {}", job.source.display(), job.dest.display());
    }

    let _ = writeln!(out, "files to read ({}):", plan.files_to_read.len());
    for file in &plan.files_to_read {
        let _ = writeln!(out, "  - {}", file.display());
    }

    if !plan.import_cycles.is_empty() {
        let _ = writeln!(out, "import cycles ({}):", plan.import_cycles.len());
        for cycle in &plan.import_cycles {
            let names: Vec<String> = cycle.iter().map(|p| p.display().to_string()).collect();
            let _ = writeln!(out, "  - {}", names.join(" <-> "));
        }
    }

    Ok(out)
}
