// src/scheduler/handle.rs

use crate::protocol::WorkerId;
use crate::types::Job;

use super::state::SlotState;

/// Scheduler-side record of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerHandle {
    pub id: WorkerId,
    pub state: SlotState,
    /// The job this worker is compiling, if any.
    pub job: Option<Job>,
    pub jobs_completed: usize,
    /// Replacement spawned after a crash. Spares never join the quorum or
    /// receive jobs from the run that spawned them.
    pub spare: bool,
}

impl WorkerHandle {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            state: SlotState::Spawning,
            job: None,
            jobs_completed: 0,
            spare: false,
        }
    }

    pub fn spare(id: WorkerId) -> Self {
        Self {
            spare: true,
            ..Self::new(id)
        }
    }

    /// Counts toward the ready quorum and the job queue.
    pub fn in_pool(&self) -> bool {
        !self.spare && self.state.is_live()
    }

    pub fn assign(&mut self, job: Job) {
        self.job = Some(job);
        self.state = SlotState::Busy;
    }

    /// Record that the current job drained.
    pub fn complete(&mut self) -> Option<Job> {
        let job = self.job.take();
        if job.is_some() {
            self.jobs_completed += 1;
        }
        job
    }
}
