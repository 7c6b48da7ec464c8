// src/scheduler/pool.rs

//! Worker pool plumbing.
//!
//! The scheduler talks to a [`WorkerLauncher`] instead of spawning processes
//! directly, so tests can swap in in-process workers while keeping the
//! production wire path.
//!
//! - [`ProcessLauncher`] re-executes the current binary as `parless worker`
//!   with stdin/stdout piped for the JSON line protocol.
//! - [`InProcessLauncher`] runs the same [`serve`](crate::worker::serve) loop
//!   on a Tokio task, connected through in-memory duplex pipes.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::compile::Compiler;
use crate::errors::{ParlessError, Result};
use crate::fs::FileSystem;
use crate::protocol::{decode_event, LineReader, LineWriter, WorkerCommand, WorkerEvent, WorkerId};
use crate::worker::{serve, Worker, WorkerSettings};

use super::{SchedulerInput, WorkerExit};

pub type CommandSink = Box<dyn AsyncWrite + Send + Unpin>;
pub type EventSource = Box<dyn AsyncRead + Send + Unpin>;
pub type ExitFuture = Pin<Box<dyn Future<Output = WorkerExit> + Send>>;

/// Pipe pair plus exit notification for one started worker.
pub struct WorkerConnection {
    pub commands: CommandSink,
    pub events: EventSource,
    /// Resolves when the worker's process or task has ended.
    pub exit: ExitFuture,
}

/// Trait abstracting how workers are started.
pub trait WorkerLauncher: Send {
    fn launch(&mut self, id: WorkerId) -> Result<WorkerConnection>;
}

/// Starts workers as child processes of the current executable.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    settings: WorkerSettings,
    log_level: Option<String>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>, settings: WorkerSettings) -> Self {
        Self {
            program: program.into(),
            settings,
            log_level: None,
        }
    }

    /// Launch workers from the running binary.
    pub fn current_exe(settings: WorkerSettings) -> Result<Self> {
        let program = std::env::current_exe().context("locating the parless executable")?;
        Ok(Self::new(program, settings))
    }

    /// Forward a log level to every worker.
    pub fn with_log_level(mut self, level: Option<String>) -> Self {
        self.log_level = level;
        self
    }

    fn command(&self, id: WorkerId) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("worker")
            .arg("--id")
            .arg(id.to_string())
            .arg("--cwd")
            .arg(&self.settings.cwd)
            .arg("--read-batch")
            .arg(self.settings.read_batch.to_string());
        for path in &self.settings.search_paths {
            cmd.arg("--paths").arg(path);
        }
        if self.settings.options.compress {
            cmd.arg("--compress");
        }
        if let Some(level) = &self.log_level {
            cmd.arg("--log-level").arg(level);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        cmd
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&mut self, id: WorkerId) -> Result<WorkerConnection> {
        let mut child = self
            .command(id)
            .spawn()
            .with_context(|| format!("spawning worker {id} from {:?}", self.program))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ParlessError::ProtocolError(format!("worker {id}: stdin not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ParlessError::ProtocolError(format!("worker {id}: stdout not captured")))?;
        debug!(worker = id, pid = ?child.id(), "worker process spawned");

        let exit = Box::pin(async move {
            match child.wait().await {
                Ok(status) => WorkerExit {
                    success: status.success(),
                    detail: status.to_string(),
                },
                Err(e) => WorkerExit {
                    success: false,
                    detail: format!("wait failed: {e}"),
                },
            }
        });

        Ok(WorkerConnection {
            commands: Box::new(stdin),
            events: Box::new(stdout),
            exit,
        })
    }
}

/// Runs workers as Tokio tasks in the current process.
///
/// Each worker gets its own cache and resolver; only the filesystem and the
/// compiler are shared.
#[derive(Debug, Clone)]
pub struct InProcessLauncher {
    fs: Arc<dyn FileSystem>,
    compiler: Arc<dyn Compiler>,
    settings: WorkerSettings,
}

impl InProcessLauncher {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        compiler: Arc<dyn Compiler>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            fs,
            compiler,
            settings,
        }
    }
}

/// Pipe capacity for in-process workers.
const DUPLEX_CAPACITY: usize = 64 * 1024;

impl WorkerLauncher for InProcessLauncher {
    fn launch(&mut self, id: WorkerId) -> Result<WorkerConnection> {
        let worker = Worker::new(
            id,
            Arc::clone(&self.fs),
            Arc::clone(&self.compiler),
            self.settings.clone(),
        );
        let (commands, worker_commands) = tokio::io::duplex(DUPLEX_CAPACITY);
        let (worker_events, events) = tokio::io::duplex(DUPLEX_CAPACITY);

        let task = tokio::spawn(serve(worker, worker_commands, worker_events));
        let exit = Box::pin(async move {
            match task.await {
                Ok(Ok(())) => WorkerExit {
                    success: true,
                    detail: "task finished".to_string(),
                },
                Ok(Err(e)) => WorkerExit {
                    success: false,
                    detail: e.to_string(),
                },
                Err(e) => WorkerExit {
                    success: false,
                    detail: format!("task failed: {e}"),
                },
            }
        });

        Ok(WorkerConnection {
            commands: Box::new(commands),
            events: Box::new(events),
            exit,
        })
    }
}

/// Live connections of one run.
pub struct WorkerPool<L: WorkerLauncher> {
    launcher: L,
    writers: BTreeMap<WorkerId, LineWriter<CommandSink>>,
    watchers: JoinSet<()>,
    inputs: mpsc::Sender<SchedulerInput>,
}

impl<L: WorkerLauncher> WorkerPool<L> {
    pub fn new(launcher: L, inputs: mpsc::Sender<SchedulerInput>) -> Self {
        Self {
            launcher,
            writers: BTreeMap::new(),
            watchers: JoinSet::new(),
            inputs,
        }
    }

    /// Start worker `id` and attach its event watcher.
    pub fn launch(&mut self, id: WorkerId) -> Result<()> {
        let conn = self.launcher.launch(id)?;
        self.writers.insert(id, LineWriter::new(conn.commands));
        self.watchers
            .spawn(watch_worker(id, conn.events, conn.exit, self.inputs.clone()));
        Ok(())
    }

    pub async fn send(&mut self, id: WorkerId, command: &WorkerCommand) -> Result<()> {
        let writer = self
            .writers
            .get_mut(&id)
            .ok_or_else(|| ParlessError::ProtocolError(format!("worker {id} is not connected")))?;
        writer.send(command).await
    }

    /// Close every command stream, then wait up to `grace` for the workers
    /// to finish their current job and exit.
    pub async fn shutdown(&mut self, grace: Duration) {
        let writers = std::mem::take(&mut self.writers);
        for (id, writer) in writers {
            if let Err(e) = writer.close().await {
                debug!(worker = id, error = %e, "command stream already closed");
            }
        }

        let drained = tokio::time::timeout(grace, async {
            while self.watchers.join_next().await.is_some() {}
        })
        .await;

        match drained {
            Ok(()) => info!("all workers disconnected"),
            Err(_) => {
                warn!(
                    remaining = self.watchers.len(),
                    "workers still running after shutdown grace period"
                );
                self.watchers.abort_all();
            }
        }
    }
}

/// Forward a worker's events to the scheduler, then report its exit.
async fn watch_worker(
    id: WorkerId,
    events: EventSource,
    exit: ExitFuture,
    inputs: mpsc::Sender<SchedulerInput>,
) {
    let mut reader = LineReader::new(events);

    loop {
        let input = match reader.next_line().await {
            Ok(Some(line)) => match decode_event(&line) {
                Ok(event) if event.worker_id() == id => SchedulerInput::Event(event),
                Ok(event) => SchedulerInput::Event(WorkerEvent::Error {
                    id,
                    message: format!("event carries id {}", event.worker_id()),
                }),
                Err(e) => SchedulerInput::Event(WorkerEvent::Error {
                    id,
                    message: e.to_string(),
                }),
            },
            Ok(None) => break,
            Err(e) => {
                debug!(worker = id, error = %e, "event stream failed");
                break;
            }
        };
        if inputs.send(input).await.is_err() {
            break;
        }
    }

    let exit = exit.await;
    debug!(worker = id, success = exit.success, status = %exit.detail, "worker exited");
    let _ = inputs.send(SchedulerInput::WorkerExited { id, exit }).await;
}
