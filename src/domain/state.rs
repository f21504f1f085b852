//! Per-job pipeline state machine
//!
//! `Matched -> Running -> Collecting -> Reported`. A failure at any stage
//! jumps straight to `Reported` carrying a failure result. There are no
//! backward edges; the pipeline never retries a job.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Received from a poll
    Matched,
    /// Container executor invoked
    Running,
    /// Executor returned; harvesting outputs
    Collecting,
    /// Result handed to the reporting collaborator
    Reported,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Reported)
    }

    /// Check whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (*self, next),
            (Matched, Running) | (Running, Collecting) | (Collecting, Reported) | (Matched | Running, Reported)
        )
    }

    /// Advance to `next`, returning the new state, or `None` if illegal
    pub fn advance(self, next: JobState) -> Option<JobState> {
        self.can_transition_to(next).then_some(next)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Matched => "MATCHED",
            Self::Running => "RUNNING",
            Self::Collecting => "COLLECTING",
            Self::Reported => "REPORTED",
        };
        write!(f, "{}", s)
    }
}
