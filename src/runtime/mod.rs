//! Container runtime layer
//!
//! This module provides:
//! - ContainerRuntime trait: the lifecycle contract the executor relies on
//!   (ping, create, start, wait, logs, remove)
//! - DockerCli: implementation driving the `docker` command line
//! - MockRuntime: scripted in-process runtime for tests

pub mod docker;
pub mod mock;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

pub use docker::DockerCli;
pub use mock::{MockBehavior, MockRuntime};

/// A host directory bind-mounted read-write into the container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: String,
}

/// Everything needed to create one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Container name, unique per job
    pub name: String,
    pub image: String,
    /// Command vector; empty keeps the image entrypoint
    pub cmd: Vec<String>,
    pub mounts: Vec<BindMount>,
}

/// Captured container output
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerLogs {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Lifecycle operations on an isolated execution environment.
///
/// Implementations map their failures onto the matching `AgentError`
/// variant (`ContainerCreate`, `ContainerStart`, `ContainerWait`,
/// `Runtime`) so callers can report them verbatim.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check the runtime is reachable
    async fn ping(&self) -> Result<()>;

    /// Create a container and return its id
    async fn create(&self, spec: &ContainerSpec) -> Result<String>;

    /// Start a created container
    async fn start(&self, id: &str) -> Result<()>;

    /// Block until the container is no longer running; returns its exit code
    async fn wait(&self, id: &str) -> Result<i64>;

    /// Fetch the end of what the container wrote to stdout and stderr,
    /// holding at most about `max_bytes` of each in memory
    async fn logs(&self, id: &str, max_bytes: usize) -> Result<ContainerLogs>;

    /// Remove the container by id or name, killing it first if `force` is set
    async fn remove(&self, id: &str, force: bool) -> Result<()>;
}
