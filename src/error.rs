//! Error types for the provider agent
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// All error types that can occur while processing jobs
#[derive(Debug, Error)]
pub enum AgentError {
    /// Job descriptor is unusable as received
    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// Per-job output directory could not be prepared
    #[error("Setup error: {0}")]
    Setup(String),

    /// Job id or declared output path would escape its output root
    #[error("Path rejected: {0}")]
    PathRejected(String),

    /// Container could not be created (bad image, runtime unavailable)
    #[error("Failed to create container: {0}")]
    ContainerCreate(String),

    /// Container was created but could not be started
    #[error("Failed to start container: {0}")]
    ContainerStart(String),

    /// Waiting on the container failed
    #[error("Container wait error: {0}")]
    ContainerWait(String),

    /// Container did not reach a terminal state in time
    #[error("Container did not finish within {0}s")]
    WaitTimeout(u64),

    /// Any other container runtime failure (ping, logs, remove)
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Coordinator request failed or returned an unexpected response
    #[error("Coordinator error: {0}")]
    Coordinator(String),

    /// Result journal could not be read or written
    #[error("Journal error: {0}")]
    Journal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;
