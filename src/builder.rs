//! Result assembly.
//!
//! Pure functions turning executor/collector output or an error message
//! into the ResultMetadata reported to the coordinator.

use std::time::Duration;

use crate::domain::{Artifact, ExecutionOutcome, FAILURE_EXIT_CODE, Job, ResultMetadata};

/// Result for a job whose container ran to a known exit status.
///
/// `elapsed` is the wall-clock time since the job started processing.
/// A non-zero exit code never carries artifacts.
pub fn build_success(job: &Job, outcome: ExecutionOutcome, artifacts: Vec<Artifact>, elapsed: Duration) -> ResultMetadata {
    let artifacts = if outcome.exit_code == 0 { artifacts } else { Vec::new() };

    ResultMetadata {
        job_id: job.job_id.clone(),
        artifacts,
        stdout_tail: outcome.stdout_tail,
        stderr_tail: outcome.stderr_tail,
        runtime_sec: elapsed.as_secs(),
        exit_code: outcome.exit_code,
    }
}

/// Result for a job the agent could not run.
pub fn build_failure(job_id: &str, message: impl Into<String>) -> ResultMetadata {
    ResultMetadata {
        job_id: job_id.to_string(),
        artifacts: Vec::new(),
        stdout_tail: String::new(),
        stderr_tail: message.into(),
        runtime_sec: 0,
        exit_code: FAILURE_EXIT_CODE,
    }
}
