// src/worker/state.rs

//! Worker lifecycle states and the transitions allowed between them.

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// No job; cache may or may not be populated yet.
    Idle,
    /// Preloading the file batch from a `start` command.
    Loading,
    /// Compiling one job.
    Building,
    /// Finished a job and reported `drain`; waiting for the next one.
    Draining,
    /// Shut down; accepts no further commands.
    Stopped,
}

impl WorkerState {
    /// Transition table.
    ///
    /// ```text
    /// Idle | Draining  -> Loading | Building
    /// Loading          -> Idle
    /// Building         -> Draining (job done) | Idle (job failed)
    /// any but Stopped  -> Stopped
    /// ```
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        use WorkerState::*;
        matches!(
            (self, next),
            (Idle | Draining, Loading)
                | (Idle | Draining, Building)
                | (Loading, Idle)
                | (Building, Draining)
                | (Building, Idle)
                | (Idle | Loading | Building | Draining, Stopped)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::WorkerState::*;

    #[test]
    fn build_cycle_is_allowed() {
        assert!(Idle.can_transition_to(Building));
        assert!(Building.can_transition_to(Draining));
        assert!(Draining.can_transition_to(Building));
        assert!(Building.can_transition_to(Idle));
    }

    #[test]
    fn no_second_job_while_building() {
        assert!(!Building.can_transition_to(Building));
        assert!(!Loading.can_transition_to(Building));
    }

    #[test]
    fn stopped_is_terminal() {
        for next in [Idle, Loading, Building, Draining, Stopped] {
            assert!(!Stopped.can_transition_to(next));
        }
    }
}
