//! Docker command-line runtime
//!
//! Drives the `docker` binary through `tokio::process`. Each lifecycle call
//! is one CLI invocation; non-zero exit of the CLI becomes an error carrying
//! its stderr.

use std::process::Stdio;

use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::{ContainerLogs, ContainerRuntime, ContainerSpec};
use crate::error::{AgentError, Result};

/// Default runtime binary
pub const DEFAULT_DOCKER_BINARY: &str = "docker";

/// Container runtime backed by the docker CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new(DEFAULT_DOCKER_BINARY)
    }
}

impl DockerCli {
    /// Use the given binary (e.g. `docker`, `podman`, an absolute path)
    pub fn new(binary: impl Into<String>) -> Self {
        Self { binary: binary.into() }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Run one CLI invocation; `Ok` carries stdout, `Err` a diagnostic line.
    async fn run(&self, args: &[String]) -> std::result::Result<Vec<u8>, String> {
        debug!("{} {}", self.binary, args.join(" "));

        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| format!("failed to run {}: {}", self.binary, e))?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(if stderr.is_empty() {
                format!("{} exited with {}", self.binary, output.status)
            } else {
                stderr
            })
        }
    }
}

/// Arguments for `docker create`
pub fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec!["create".to_string(), "--name".to_string(), spec.name.clone()];

    for mount in &spec.mounts {
        args.push("--mount".to_string());
        args.push(format!(
            "type=bind,source={},target={}",
            mount.source.display(),
            mount.target
        ));
    }

    args.push(spec.image.clone());
    args.extend(spec.cmd.iter().cloned());
    args
}

/// Drain `reader`, keeping only its last `max` bytes
pub async fn read_tail<R: AsyncRead + Unpin>(mut reader: R, max: usize) -> std::io::Result<Vec<u8>> {
    let mut kept = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        kept.extend_from_slice(&buf[..n]);
        if kept.len() > max {
            let excess = kept.len() - max;
            kept.drain(..excess);
        }
    }
    Ok(kept)
}

/// Parse the exit code printed by `docker wait`
pub fn parse_exit_code(stdout: &[u8]) -> Result<i64> {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    trimmed
        .parse::<i64>()
        .map_err(|_| AgentError::ContainerWait(format!("unexpected wait output {:?}", trimmed)))
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn ping(&self) -> Result<()> {
        let args = vec!["version".to_string(), "--format".to_string(), "{{.Server.Version}}".to_string()];
        self.run(&args).await.map(|_| ()).map_err(AgentError::Runtime)
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        let stdout = self.run(&create_args(spec)).await.map_err(AgentError::ContainerCreate)?;
        let id = String::from_utf8_lossy(&stdout).trim().to_string();
        if id.is_empty() {
            return Err(AgentError::ContainerCreate(format!("{} returned no container id", self.binary)));
        }
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        let args = vec!["start".to_string(), id.to_string()];
        self.run(&args).await.map(|_| ()).map_err(AgentError::ContainerStart)
    }

    async fn wait(&self, id: &str) -> Result<i64> {
        let args = vec!["wait".to_string(), id.to_string()];
        let stdout = self.run(&args).await.map_err(AgentError::ContainerWait)?;
        parse_exit_code(&stdout)
    }

    async fn logs(&self, id: &str, max_bytes: usize) -> Result<ContainerLogs> {
        // Every line is at least one byte, so `max_bytes` lines cover the byte tail
        let lines = max_bytes.max(1).to_string();
        let mut child = Command::new(&self.binary)
            .args(["logs", "--tail", lines.as_str(), id])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AgentError::Runtime(format!("failed to run {}: {}", self.binary, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Runtime("logs stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| AgentError::Runtime("logs stderr not captured".to_string()))?;

        // `docker logs` replays the container's streams on its own stdout/stderr
        let (stdout, stderr) = tokio::try_join!(read_tail(stdout, max_bytes), read_tail(stderr, max_bytes))
            .map_err(|e| AgentError::Runtime(format!("failed to read logs of {}: {}", id, e)))?;

        let status = child
            .wait()
            .await
            .map_err(|e| AgentError::Runtime(format!("failed to run {}: {}", self.binary, e)))?;
        if !status.success() {
            return Err(AgentError::Runtime(String::from_utf8_lossy(&stderr).trim().to_string()));
        }

        Ok(ContainerLogs { stdout, stderr })
    }

    async fn remove(&self, id: &str, force: bool) -> Result<()> {
        let mut args = vec!["rm".to_string()];
        if force {
            args.push("--force".to_string());
        }
        args.push(id.to_string());
        self.run(&args).await.map(|_| ()).map_err(AgentError::Runtime)
    }
}
