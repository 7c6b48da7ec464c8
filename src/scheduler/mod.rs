// src/scheduler/mod.rs

//! Controller side of a build run.
//!
//! This module ties together:
//! - the worker pool (spawn, send commands, watch events and exits)
//! - the job queue and the ready quorum
//! - the run lifecycle `Starting -> AwaitingReady -> Running -> Draining -> Finished`
//!
//! The pure state machine lives in [`core`]; the async/IO shell that feeds
//! it and executes its commands is [`runtime`]. How workers are started is
//! pluggable through [`pool::WorkerLauncher`].

use std::path::PathBuf;

use crate::errors::ParlessError;
use crate::protocol::{WorkerCommand, WorkerEvent, WorkerId};

pub mod core;
pub mod handle;
pub mod pool;
pub mod runtime;
pub mod state;

pub use self::core::SchedulerCore;
pub use handle::WorkerHandle;
pub use pool::{InProcessLauncher, ProcessLauncher, WorkerConnection, WorkerLauncher};
pub use runtime::Scheduler;
pub use state::{RunPhase, SlotState};

/// How a worker's process or task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerExit {
    pub success: bool,
    pub detail: String,
}

/// Inputs flowing into the scheduler from the pool, timers and signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerInput {
    /// The worker was started and its event reader is attached.
    WorkerOnline(WorkerId),
    /// The worker could not be started.
    SpawnFailed { id: WorkerId, message: String },
    /// A protocol event from a worker.
    Event(WorkerEvent),
    /// The worker's process or task ended.
    WorkerExited { id: WorkerId, exit: WorkerExit },
    /// The ready timeout elapsed.
    ReadyTimeout,
    /// Operator interrupt (Ctrl-C).
    ShutdownRequested,
}

/// Command produced by the core, executed by the IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Start a worker with this id.
    Spawn(WorkerId),
    /// Send a protocol command to a worker.
    Send(WorkerId, WorkerCommand),
    /// Every job drained. Emitted at most once per run.
    Finished,
    /// Disconnect every worker and end the run. Emitted at most once.
    Shutdown { failure: Option<RunFailure> },
}

/// Decision returned by the core after handling one input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    pub commands: Vec<SchedulerCommand>,
    /// Whether the shell should keep reading inputs.
    pub keep_running: bool,
}

/// Why a run was aborted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFailure {
    WorkerFailed { id: WorkerId, message: String },
    WorkerCrashed { id: WorkerId, file: PathBuf },
    Protocol { id: WorkerId, message: String },
    QuorumLost { spawned: usize },
    ReadyTimeout { secs: u64, ready: usize, expected: usize },
    Interrupted,
}

impl From<RunFailure> for ParlessError {
    fn from(failure: RunFailure) -> Self {
        match failure {
            RunFailure::WorkerFailed { id, message } => ParlessError::WorkerFailed { id, message },
            RunFailure::WorkerCrashed { id, file } => ParlessError::WorkerCrashed { id, file },
            RunFailure::Protocol { id, message } => {
                ParlessError::ProtocolError(format!("worker {id}: {message}"))
            }
            RunFailure::QuorumLost { spawned } => ParlessError::QuorumLost { spawned },
            RunFailure::ReadyTimeout {
                secs,
                ready,
                expected,
            } => ParlessError::ReadyTimeout {
                secs,
                ready,
                expected,
            },
            RunFailure::Interrupted => ParlessError::Interrupted,
        }
    }
}
