//! Reportable job results
//!
//! ResultMetadata is the single value exchanged with the coordinator per job.
//! Field names on the wire are camelCase to match the coordinator schema.

use serde::{Deserialize, Serialize};

/// Exit code reported when the agent itself failed to run the job
/// (setup, create, start or wait failure), as opposed to the workload
/// exiting non-zero.
pub const FAILURE_EXIT_CODE: i64 = -1;

/// One collected output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Declared path, exactly as the job specified it
    pub path: String,
    /// Hex-encoded SHA-256 over the file's bytes
    pub sha256: String,
    /// Size in bytes
    pub size: u64,
    /// Retrieval reference, `/outputs/<jobId>/<path>`
    pub local_uri: String,
}

/// Terminal state of one job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub job_id: String,
    pub artifacts: Vec<Artifact>,
    pub stdout_tail: String,
    pub stderr_tail: String,
    pub runtime_sec: u64,
    pub exit_code: i64,
}

impl ResultMetadata {
    /// True if the workload ran and exited zero
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// True if the agent could not run the job at all
    pub fn is_agent_failure(&self) -> bool {
        self.exit_code == FAILURE_EXIT_CODE
    }
}
