//! Raw container termination status.

/// Result of running one job's container to completion.
///
/// Only produced when the container actually ran; runtime failures are
/// reported as errors instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Exit status reported by the container runtime
    pub exit_code: i64,
    /// Last bytes of the container's standard output
    pub stdout_tail: String,
    /// Last bytes of the container's standard error
    pub stderr_tail: String,
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}
