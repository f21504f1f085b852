//! Container executor - runs one job in a fresh container
//!
//! For each job the executor:
//! 1. Creates an empty `<outputs_dir>/<job_id>` on the host
//! 2. Force-removes any container still named `job-<job_id>`, then creates
//!    it afresh with that directory bind-mounted at the mount point
//!    (default `/out`)
//! 3. Starts it and blocks until it is no longer running
//! 4. Captures the tails of stdout/stderr
//! 5. Removes the container, best-effort
//!
//! No CPU, memory, PID or network limits are applied to the container.
//! A deployment exposed to untrusted jobs needs those added at the runtime.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::domain::{ExecutionOutcome, Job};
use crate::error::{AgentError, Result};
use crate::paths;
use crate::runtime::{BindMount, ContainerLogs, ContainerRuntime, ContainerSpec};

/// Default in-container mount point for job outputs
pub const DEFAULT_MOUNT_POINT: &str = "/out";

/// Default number of bytes kept from each output stream
pub const DEFAULT_TAIL_BYTES: usize = 4096;

/// Configuration for the executor
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Host directory holding one subdirectory per job
    pub outputs_dir: PathBuf,
    /// Where the job's output directory appears inside the container
    pub mount_point: String,
    /// Bytes kept from the end of stdout and stderr
    pub tail_bytes: usize,
    /// Upper bound on the container wait when the job sets none
    pub wait_timeout: Option<Duration>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            outputs_dir: PathBuf::from("./outputs"),
            mount_point: DEFAULT_MOUNT_POINT.to_string(),
            tail_bytes: DEFAULT_TAIL_BYTES,
            wait_timeout: None,
        }
    }
}

impl ExecutorConfig {
    /// Create a new config rooted at the given outputs directory
    pub fn new(outputs_dir: impl Into<PathBuf>) -> Self {
        Self {
            outputs_dir: outputs_dir.into(),
            ..Default::default()
        }
    }

    /// Set the wait bound
    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    /// Set the tail length
    pub fn with_tail_bytes(mut self, bytes: usize) -> Self {
        self.tail_bytes = bytes;
        self
    }
}

/// Runs jobs through an injected container runtime
pub struct ContainerExecutor {
    runtime: Arc<dyn ContainerRuntime>,
    config: ExecutorConfig,
}

impl ContainerExecutor {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: ExecutorConfig) -> Self {
        Self { runtime, config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Absolute host directory for a job's outputs
    pub fn output_dir(&self, job: &Job) -> Result<PathBuf> {
        let root = std::path::absolute(&self.config.outputs_dir).map_err(|e| {
            AgentError::Setup(format!(
                "Failed to get absolute path of {}: {}",
                self.config.outputs_dir.display(),
                e
            ))
        })?;
        paths::job_output_dir(&root, &job.job_id)
    }

    /// Run the job to completion and return its raw termination status.
    ///
    /// Any error means the workload did not run to a known exit status.
    pub async fn execute(&self, job: &Job) -> Result<ExecutionOutcome> {
        validate_image(&job.image)?;

        let output_dir = self.prepare_output_dir(job)?;
        debug!("Job {} output directory: {}", job.job_id, output_dir.display());

        let spec = ContainerSpec {
            name: job.container_name(),
            image: job.image.clone(),
            cmd: job.cmd.clone(),
            mounts: vec![BindMount {
                source: output_dir,
                target: self.config.mount_point.clone(),
            }],
        };

        self.discard_stale_container(&spec.name).await;

        let started = Instant::now();
        let id = self.runtime.create(&spec).await?;
        info!("Created container {} ({}) for job {}", spec.name, id, job.job_id);

        let result = self.run_container(&id, job).await;

        // The result is settled at this point; removal only affects the host.
        if let Err(e) = self.runtime.remove(&id, result.is_err()).await {
            warn!("Failed to remove container {}: {}", spec.name, e);
        }

        let (exit_code, logs) = result?;

        info!(
            "Container {} finished with exit code {} after {:?}",
            spec.name,
            exit_code,
            started.elapsed()
        );

        Ok(ExecutionOutcome {
            exit_code,
            stdout_tail: tail(&logs.stdout, self.config.tail_bytes),
            stderr_tail: tail(&logs.stderr, self.config.tail_bytes),
        })
    }

    /// Force-remove a container left under this name by an interrupted run.
    async fn discard_stale_container(&self, name: &str) {
        match self.runtime.remove(name, true).await {
            Ok(()) => warn!("Removed stale container {}", name),
            Err(e) => debug!("No stale container {}: {}", name, e),
        }
    }

    /// Create the job's output directory, empty.
    ///
    /// A re-delivered job reuses its directory, so anything left by an
    /// earlier run is removed first; only this run's files become artifacts.
    fn prepare_output_dir(&self, job: &Job) -> Result<PathBuf> {
        let dir = self.output_dir(job)?;
        if dir.symlink_metadata().is_ok() {
            warn!("Clearing leftover output directory {}", dir.display());
            std::fs::remove_dir_all(&dir).map_err(|e| {
                AgentError::Setup(format!("Failed to clear output directory {}: {}", dir.display(), e))
            })?;
        }
        std::fs::create_dir_all(&dir)
            .map_err(|e| AgentError::Setup(format!("Failed to create output directory {}: {}", dir.display(), e)))?;
        Ok(dir)
    }

    async fn run_container(&self, id: &str, job: &Job) -> Result<(i64, ContainerLogs)> {
        self.runtime.start(id).await?;

        let exit_code = match self.wait_bound(job) {
            Some(bound) => tokio::time::timeout(bound, self.runtime.wait(id))
                .await
                .map_err(|_| AgentError::WaitTimeout(bound.as_secs()))??,
            None => self.runtime.wait(id).await?,
        };

        let logs = match self.runtime.logs(id, self.config.tail_bytes).await {
            Ok(logs) => logs,
            Err(e) => {
                warn!("Failed to read logs for job {}: {}", job.job_id, e);
                ContainerLogs::default()
            }
        };

        Ok((exit_code, logs))
    }

    fn wait_bound(&self, job: &Job) -> Option<Duration> {
        job.timeout_sec
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .or(self.config.wait_timeout)
    }
}

/// Reject image references the runtime CLI would misread
fn validate_image(image: &str) -> Result<()> {
    if image.trim().is_empty() {
        return Err(AgentError::InvalidJob("image is empty".to_string()));
    }
    if image.starts_with('-') || image.chars().any(char::is_whitespace) {
        return Err(AgentError::InvalidJob(format!("invalid image reference {:?}", image)));
    }
    Ok(())
}

/// Last `max` bytes of `bytes` as text, starting on a char boundary
pub fn tail(bytes: &[u8], max: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    if text.len() <= max {
        return text.into_owned();
    }

    let mut start = text.len() - max;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
