// src/scheduler/core.rs

//! Pure scheduler state machine.
//!
//! [`SchedulerCore`] consumes [`SchedulerInput`]s and produces
//! [`SchedulerCommand`]s for the IO shell. It owns the job queue and every
//! [`WorkerHandle`], and is the only place that decides how many workers are
//! in which state. It has no channels, no Tokio types and performs no IO, so
//! every lifecycle path can be unit tested step by step.

use std::collections::{BTreeMap, VecDeque};
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::protocol::{WorkerCommand, WorkerEvent, WorkerId};
use crate::types::{BuildReport, Job};

use super::handle::WorkerHandle;
use super::state::{RunPhase, SlotState};
use super::{RunFailure, SchedulerCommand, SchedulerInput, SchedulerStep, WorkerExit};

#[derive(Debug)]
pub struct SchedulerCore {
    phase: RunPhase,
    workers: BTreeMap<WorkerId, WorkerHandle>,
    queue: VecDeque<Job>,
    files_to_read: Vec<PathBuf>,
    worker_count: usize,
    ready_timeout: Duration,
    next_id: WorkerId,
    /// Jobs sent and not yet drained.
    outstanding: usize,
    /// Workers that were ready when the quorum was reached.
    quorum: usize,
    replacements: usize,
    targets: usize,
    shutdown_sent: bool,
}

impl SchedulerCore {
    pub fn new(
        worker_count: usize,
        jobs: Vec<Job>,
        files_to_read: Vec<PathBuf>,
        ready_timeout: Duration,
    ) -> Self {
        Self {
            phase: RunPhase::Starting,
            workers: BTreeMap::new(),
            targets: jobs.len(),
            queue: jobs.into(),
            files_to_read,
            worker_count,
            ready_timeout,
            next_id: 0,
            outstanding: 0,
            quorum: 0,
            replacements: 0,
            shutdown_sent: false,
        }
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn handle(&self, id: WorkerId) -> Option<&WorkerHandle> {
        self.workers.get(&id)
    }

    pub fn ready_timeout(&self) -> Duration {
        self.ready_timeout
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn replacements(&self) -> usize {
        self.replacements
    }

    /// Pool workers (spares excluded) currently in `state`.
    pub fn count(&self, state: SlotState) -> usize {
        self.workers
            .values()
            .filter(|w| !w.spare && w.state == state)
            .count()
    }

    pub fn report(&self) -> BuildReport {
        BuildReport {
            targets: self.targets,
            files_read: self.files_to_read.len(),
            workers: self.quorum,
            replacements: self.replacements,
            jobs_per_worker: self
                .workers
                .values()
                .filter(|w| !w.spare)
                .map(|w| (w.id, w.jobs_completed))
                .collect(),
        }
    }

    /// Request the initial pool. Only the first call has any effect.
    pub fn start(&mut self) -> SchedulerStep {
        if self.phase != RunPhase::Starting || !self.workers.is_empty() {
            warn!(phase = ?self.phase, "scheduler already started");
            return self.finish_step(Vec::new());
        }

        info!(
            workers = self.worker_count,
            jobs = self.queue.len(),
            files = self.files_to_read.len(),
            "starting worker pool"
        );
        let commands = (0..self.worker_count)
            .map(|_| SchedulerCommand::Spawn(self.allocate(false)))
            .collect();
        self.finish_step(commands)
    }

    /// Handle one input, updating state and returning commands for the shell.
    pub fn step(&mut self, input: SchedulerInput) -> SchedulerStep {
        let mut out = Vec::new();

        match input {
            SchedulerInput::WorkerOnline(id) => self.on_online(id, &mut out),
            SchedulerInput::SpawnFailed { id, message } => {
                self.on_spawn_failed(id, &message, &mut out)
            }
            SchedulerInput::Event(WorkerEvent::Ready { id }) => self.on_ready(id, &mut out),
            SchedulerInput::Event(WorkerEvent::Drain { id }) => self.on_drain(id, &mut out),
            SchedulerInput::Event(WorkerEvent::Error { id, message }) => {
                self.on_error(id, message, &mut out)
            }
            SchedulerInput::WorkerExited { id, exit } => self.on_exit(id, exit, &mut out),
            SchedulerInput::ReadyTimeout => {
                if self.phase.is_pre_ready() {
                    let failure = RunFailure::ReadyTimeout {
                        secs: self.ready_timeout.as_secs(),
                        ready: self.count(SlotState::Ready),
                        expected: self.pool_size(),
                    };
                    self.abort(failure, &mut out);
                }
            }
            SchedulerInput::ShutdownRequested => {
                info!(phase = ?self.phase, "shutdown requested");
                self.abort(RunFailure::Interrupted, &mut out);
            }
        }

        self.finish_step(out)
    }

    fn on_online(&mut self, id: WorkerId, out: &mut Vec<SchedulerCommand>) {
        let Some(handle) = self.workers.get_mut(&id) else {
            warn!(worker = id, "online signal from unknown worker");
            return;
        };
        if handle.state != SlotState::Spawning {
            warn!(worker = id, state = ?handle.state, "unexpected online signal");
            return;
        }
        handle.state = SlotState::Online;
        debug!(worker = id, spare = handle.spare, "worker online");

        if !handle.spare && self.phase == RunPhase::Starting {
            self.check_quorum(out);
        }
    }

    fn on_spawn_failed(&mut self, id: WorkerId, message: &str, out: &mut Vec<SchedulerCommand>) {
        let Some(handle) = self.workers.get_mut(&id) else {
            return;
        };
        handle.state = SlotState::Gone;
        warn!(worker = id, error = message, spare = handle.spare, "worker failed to start");

        if !handle.spare && self.phase.is_pre_ready() {
            self.check_quorum(out);
        }
    }

    fn on_ready(&mut self, id: WorkerId, out: &mut Vec<SchedulerCommand>) {
        let loading = self.phase == RunPhase::AwaitingReady
            && self
                .workers
                .get(&id)
                .is_some_and(|h| h.state == SlotState::Loading);
        if !loading {
            warn!(worker = id, phase = ?self.phase, "ignoring unexpected ready");
            return;
        }

        if let Some(handle) = self.workers.get_mut(&id) {
            handle.state = SlotState::Ready;
        }
        debug!(worker = id, "worker ready");
        self.check_quorum(out);
    }

    fn on_drain(&mut self, id: WorkerId, out: &mut Vec<SchedulerCommand>) {
        if self.phase != RunPhase::Running {
            debug!(worker = id, phase = ?self.phase, "ignoring drain outside running phase");
            return;
        }
        let busy = self
            .workers
            .get(&id)
            .is_some_and(|h| h.state == SlotState::Busy);
        if !busy {
            self.abort(
                RunFailure::Protocol {
                    id,
                    message: "drain without an assigned job".to_string(),
                },
                out,
            );
            return;
        }
        let Some(handle) = self.workers.get_mut(&id) else {
            return;
        };

        if let Some(done) = handle.complete() {
            debug!(worker = id, file = ?done.source, "job drained");
        }
        self.outstanding -= 1;

        match self.queue.pop_front() {
            Some(job) => {
                out.push(build_command(id, &job));
                handle.assign(job);
                self.outstanding += 1;
            }
            None => {
                debug!(worker = id, "queue empty; worker idle");
                handle.state = SlotState::Empty;
            }
        }

        if self.outstanding == 0 {
            self.finish(out);
        }
    }

    fn on_error(&mut self, id: WorkerId, message: String, out: &mut Vec<SchedulerCommand>) {
        if self.phase.is_terminal() {
            debug!(worker = id, "ignoring error after shutdown");
            return;
        }
        let file = self
            .workers
            .get(&id)
            .and_then(|h| h.job.as_ref())
            .map(|job| job.source.clone());
        error!(worker = id, file = ?file, error = %message, "worker reported an error; aborting run");
        self.abort(RunFailure::WorkerFailed { id, message }, out);
    }

    fn on_exit(&mut self, id: WorkerId, exit: WorkerExit, out: &mut Vec<SchedulerCommand>) {
        let phase = self.phase;
        let Some(handle) = self.workers.get_mut(&id) else {
            warn!(worker = id, "exit of unknown worker");
            return;
        };
        let held = handle.job.take();
        let spare = handle.spare;
        handle.state = SlotState::Gone;

        if phase.is_terminal() {
            debug!(worker = id, status = %exit.detail, "worker exited after shutdown");
            return;
        }
        if spare {
            warn!(worker = id, status = %exit.detail, "replacement worker exited");
            return;
        }
        if phase.is_pre_ready() {
            warn!(
                worker = id,
                status = %exit.detail,
                "worker exited before ready; dropping it from the quorum"
            );
            self.check_quorum(out);
            return;
        }

        let replacement = self.allocate(true);
        self.replacements += 1;
        error!(
            worker = id,
            status = %exit.detail,
            replacement,
            "worker exited unexpectedly; spawning replacement"
        );
        out.push(SchedulerCommand::Spawn(replacement));

        if let Some(job) = held {
            self.outstanding -= 1;
            self.abort(
                RunFailure::WorkerCrashed {
                    id,
                    file: job.source,
                },
                out,
            );
        }
    }

    /// Advance past `Starting` or `AwaitingReady` once every pool worker has
    /// caught up; abort if the pool is empty.
    fn check_quorum(&mut self, out: &mut Vec<SchedulerCommand>) {
        if self.pool_size() == 0 {
            self.abort(
                RunFailure::QuorumLost {
                    spawned: self.worker_count,
                },
                out,
            );
            return;
        }

        let wanted = match self.phase {
            RunPhase::Starting => SlotState::Online,
            RunPhase::AwaitingReady => SlotState::Ready,
            _ => return,
        };
        let caught_up = self
            .workers
            .values()
            .filter(|w| w.in_pool())
            .all(|w| w.state == wanted);
        if !caught_up {
            return;
        }

        if self.phase == RunPhase::Starting {
            self.dispatch(out);
        } else if self.transition(RunPhase::Running) {
            self.quorum = self.pool_size();
            info!(workers = self.quorum, "ready quorum reached");
            self.run_queue(out);
        }
    }

    /// Broadcast `start` with the file batch to every online worker.
    fn dispatch(&mut self, out: &mut Vec<SchedulerCommand>) {
        if !self.transition(RunPhase::AwaitingReady) {
            return;
        }
        for handle in self.workers.values_mut().filter(|w| w.in_pool()) {
            out.push(SchedulerCommand::Send(
                handle.id,
                WorkerCommand::Start {
                    data: self.files_to_read.clone(),
                },
            ));
            handle.state = SlotState::Loading;
        }
    }

    /// Hand one job to every ready worker; workers left without one are
    /// marked empty.
    fn run_queue(&mut self, out: &mut Vec<SchedulerCommand>) {
        self.outstanding = 0;
        for handle in self
            .workers
            .values_mut()
            .filter(|w| w.in_pool() && w.state == SlotState::Ready)
        {
            match self.queue.pop_front() {
                Some(job) => {
                    out.push(build_command(handle.id, &job));
                    handle.assign(job);
                    self.outstanding += 1;
                }
                None => handle.state = SlotState::Empty,
            }
        }

        if self.outstanding == 0 {
            self.finish(out);
        }
    }

    fn finish(&mut self, out: &mut Vec<SchedulerCommand>) {
        if self.transition(RunPhase::Draining) && self.transition(RunPhase::Finished) {
            info!(targets = self.targets, "all jobs drained");
            out.push(SchedulerCommand::Finished);
            self.shutdown(None, out);
        }
    }

    fn abort(&mut self, failure: RunFailure, out: &mut Vec<SchedulerCommand>) {
        if self.transition(RunPhase::Aborted) {
            self.shutdown(Some(failure), out);
        }
    }

    fn shutdown(&mut self, failure: Option<RunFailure>, out: &mut Vec<SchedulerCommand>) {
        if self.shutdown_sent {
            return;
        }
        self.shutdown_sent = true;
        out.push(SchedulerCommand::Shutdown { failure });
    }

    fn transition(&mut self, next: RunPhase) -> bool {
        if !self.phase.can_transition_to(next) {
            debug!(from = ?self.phase, to = ?next, "phase transition refused");
            return false;
        }
        debug!(from = ?self.phase, to = ?next, "phase transition");
        self.phase = next;
        true
    }

    fn allocate(&mut self, spare: bool) -> WorkerId {
        let id = self.next_id;
        self.next_id += 1;
        let handle = if spare {
            WorkerHandle::spare(id)
        } else {
            WorkerHandle::new(id)
        };
        self.workers.insert(id, handle);
        id
    }

    fn pool_size(&self) -> usize {
        self.workers.values().filter(|w| w.in_pool()).count()
    }

    fn finish_step(&self, commands: Vec<SchedulerCommand>) -> SchedulerStep {
        SchedulerStep {
            commands,
            keep_running: !self.shutdown_sent,
        }
    }
}

fn build_command(id: WorkerId, job: &Job) -> SchedulerCommand {
    SchedulerCommand::Send(
        id,
        WorkerCommand::Build {
            file: job.source.clone(),
            dest: job.dest.clone(),
        },
    )
}
