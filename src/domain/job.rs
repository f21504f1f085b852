//! Job descriptors as received from the coordinator

use serde::{Deserialize, Serialize};

/// A unit of work assigned to this provider.
///
/// Immutable once received. The wire shape follows the coordinator's
/// camelCase JSON (`jobId`, `image`, `cmd`, `outputs`, `timeoutSec`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    /// Coordinator-assigned identifier, also used as a directory name
    pub job_id: String,

    /// Container image reference
    pub image: String,

    /// Command vector; empty means the image's default entrypoint
    #[serde(default)]
    pub cmd: Vec<String>,

    /// Declared output files, absolute paths under the output mount
    #[serde(default)]
    pub outputs: Vec<OutputSpec>,

    /// Upper bound on container runtime requested by the job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<u64>,
}

/// One declared output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    pub path: String,
}

impl OutputSpec {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl Job {
    /// Create a job with the given id, image and command and no outputs
    pub fn new(job_id: impl Into<String>, image: impl Into<String>, cmd: Vec<String>) -> Self {
        Self {
            job_id: job_id.into(),
            image: image.into(),
            cmd,
            outputs: Vec::new(),
            timeout_sec: None,
        }
    }

    /// Add a declared output path
    pub fn with_output(mut self, path: impl Into<String>) -> Self {
        self.outputs.push(OutputSpec::new(path));
        self
    }

    /// Set the requested runtime bound
    pub fn with_timeout_sec(mut self, secs: u64) -> Self {
        self.timeout_sec = Some(secs);
        self
    }

    /// Name of the container created for this job
    pub fn container_name(&self) -> String {
        format!("job-{}", self.job_id)
    }
}
