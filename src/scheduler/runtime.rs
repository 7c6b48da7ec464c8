// src/scheduler/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::errors::{ParlessError, Result};
use crate::types::BuildReport;

use super::core::SchedulerCore;
use super::pool::{WorkerLauncher, WorkerPool};
use super::{RunFailure, SchedulerCommand, SchedulerInput};

/// Time workers get to finish their current job after a disconnect.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Drives a [`SchedulerCore`] with inputs from the worker pool, the ready
/// timer and interrupts, and executes the commands it returns.
///
/// All scheduler state lives in the core; this shell only moves bytes and
/// starts workers.
pub struct Scheduler<L: WorkerLauncher> {
    core: SchedulerCore,
    pool: WorkerPool<L>,
    inputs_tx: mpsc::Sender<SchedulerInput>,
    inputs: mpsc::Receiver<SchedulerInput>,
    /// Inputs produced by the shell itself, handled before the channel.
    backlog: VecDeque<SchedulerInput>,
    outcome: Option<Option<RunFailure>>,
}

impl<L: WorkerLauncher> fmt::Debug for Scheduler<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<L: WorkerLauncher> Scheduler<L> {
    pub fn new(core: SchedulerCore, launcher: L) -> Self {
        let (inputs_tx, inputs) = mpsc::channel(64);
        Self {
            core,
            pool: WorkerPool::new(launcher, inputs_tx.clone()),
            inputs_tx,
            inputs,
            backlog: VecDeque::new(),
            outcome: None,
        }
    }

    /// Sender for external inputs such as `ShutdownRequested`.
    pub fn input_sender(&self) -> mpsc::Sender<SchedulerInput> {
        self.inputs_tx.clone()
    }

    /// Run to completion: `Ok` once every job drained, `Err` if the run was
    /// aborted. Workers are disconnected either way.
    pub async fn run(mut self) -> Result<BuildReport> {
        let start = self.core.start();
        self.execute(start.commands).await;
        self.arm_ready_timer();

        let mut keep_running = start.keep_running;
        while keep_running {
            let input = match self.backlog.pop_front() {
                Some(input) => input,
                None => match self.inputs.recv().await {
                    Some(input) => input,
                    None => {
                        warn!("scheduler input channel closed");
                        break;
                    }
                },
            };

            debug!(?input, "scheduler received input");
            let step = self.core.step(input);
            self.execute(step.commands).await;
            keep_running = step.keep_running;
        }

        // Exits reported while shutting down are not interesting any more.
        self.inputs.close();
        self.pool.shutdown(SHUTDOWN_GRACE).await;

        match self.outcome {
            Some(None) => {
                let report = self.core.report();
                info!(
                    targets = report.targets,
                    workers = report.workers,
                    "build finished"
                );
                Ok(report)
            }
            Some(Some(failure)) => Err(ParlessError::from(failure)),
            None => Err(ParlessError::ProtocolError(
                "scheduler stopped without an outcome".to_string(),
            )),
        }
    }

    async fn execute(&mut self, commands: Vec<SchedulerCommand>) {
        for command in commands {
            match command {
                SchedulerCommand::Spawn(id) => {
                    let input = match self.pool.launch(id) {
                        Ok(()) => SchedulerInput::WorkerOnline(id),
                        Err(e) => SchedulerInput::SpawnFailed {
                            id,
                            message: e.to_string(),
                        },
                    };
                    self.backlog.push_back(input);
                }
                SchedulerCommand::Send(id, command) => {
                    // A failed send means the worker is gone; its watcher
                    // reports the exit.
                    if let Err(e) = self.pool.send(id, &command).await {
                        warn!(worker = id, error = %e, "could not send command");
                    }
                }
                SchedulerCommand::Finished => {
                    info!("all targets built");
                }
                SchedulerCommand::Shutdown { failure } => {
                    if let Some(failure) = &failure {
                        error!(?failure, "run aborted");
                    }
                    self.outcome = Some(failure);
                }
            }
        }
    }

    fn arm_ready_timer(&self) {
        let tx = self.inputs_tx.clone();
        let timeout = self.core.ready_timeout();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(SchedulerInput::ReadyTimeout).await;
        });
    }
}
