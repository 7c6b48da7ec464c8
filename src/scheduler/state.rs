// src/scheduler/state.rs

//! Run phases and per-worker slot states.

/// Phase of one build run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Workers are being spawned.
    Starting,
    /// `start` was broadcast; waiting for every worker's `ready`.
    AwaitingReady,
    /// Jobs are being handed out.
    Running,
    /// Queue exhausted and no job outstanding.
    Draining,
    /// Every job drained. Terminal.
    Finished,
    /// A fatal failure or an interrupt ended the run. Terminal.
    Aborted,
}

impl RunPhase {
    /// Transition table.
    ///
    /// ```text
    /// Starting      -> AwaitingReady
    /// AwaitingReady -> Running
    /// Running       -> Draining
    /// Draining      -> Finished
    /// any non-terminal phase -> Aborted
    /// ```
    pub fn can_transition_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        match (self, next) {
            (Starting, AwaitingReady)
            | (AwaitingReady, Running)
            | (Running, Draining)
            | (Draining, Finished) => true,
            (from, Aborted) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Finished | RunPhase::Aborted)
    }

    /// Phases before the ready quorum was reached.
    pub fn is_pre_ready(self) -> bool {
        matches!(self, RunPhase::Starting | RunPhase::AwaitingReady)
    }
}

/// Scheduler-side view of one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Spawn requested; the event reader is not attached yet.
    Spawning,
    /// Connected; no `start` sent yet.
    Online,
    /// `start` sent; waiting for `ready`.
    Loading,
    /// Reported `ready`; no job assigned yet.
    Ready,
    /// Holding exactly one job.
    Busy,
    /// Queue was empty when this worker asked for work.
    Empty,
    /// Spawn failed, or the worker exited.
    Gone,
}

impl SlotState {
    pub fn is_live(self) -> bool {
        !matches!(self, SlotState::Gone)
    }
}

#[cfg(test)]
mod tests {
    use super::RunPhase::*;

    #[test]
    fn phases_advance_in_order_only() {
        assert!(Starting.can_transition_to(AwaitingReady));
        assert!(AwaitingReady.can_transition_to(Running));
        assert!(Running.can_transition_to(Draining));
        assert!(Draining.can_transition_to(Finished));

        assert!(!Starting.can_transition_to(Running));
        assert!(!Running.can_transition_to(Finished));
        assert!(!Running.can_transition_to(AwaitingReady));
    }

    #[test]
    fn abort_only_from_non_terminal_phases() {
        for phase in [Starting, AwaitingReady, Running, Draining] {
            assert!(phase.can_transition_to(Aborted), "{phase:?}");
        }
        assert!(!Finished.can_transition_to(Aborted));
        assert!(!Aborted.can_transition_to(Aborted));
        assert!(!Finished.can_transition_to(Finished));
    }
}
