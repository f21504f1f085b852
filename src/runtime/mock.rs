//! Scripted container runtime for tests.
//!
//! Behaviour is registered per image. Unregistered images fail at create
//! time the way a registry miss does. On start, a successful container
//! writes its scripted files into the first bind mount's host directory.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ContainerLogs, ContainerRuntime, ContainerSpec};
use crate::error::{AgentError, Result};

/// What a container created from a given image does
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Write `files` (path relative to the mount, contents) and exit with `code`
    Exit {
        code: i64,
        files: Vec<(String, Vec<u8>)>,
        stdout: String,
        stderr: String,
    },
    FailCreate(String),
    FailStart(String),
    FailWait(String),
    /// Never reaches a terminal state
    Hang,
}

impl MockBehavior {
    /// Exit zero after writing the given files
    pub fn success(files: &[(&str, &[u8])]) -> Self {
        Self::Exit {
            code: 0,
            files: files.iter().map(|(p, c)| (p.to_string(), c.to_vec())).collect(),
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    /// Exit with `code` and print `stderr`, writing nothing
    pub fn exit_code(code: i64, stderr: &str) -> Self {
        Self::Exit {
            code,
            files: Vec::new(),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

#[derive(Debug)]
struct MockContainer {
    spec: ContainerSpec,
    behavior: MockBehavior,
}

/// In-process runtime that records every call
#[derive(Debug, Default)]
pub struct MockRuntime {
    behaviors: Mutex<HashMap<String, MockBehavior>>,
    containers: Mutex<HashMap<String, MockContainer>>,
    created: Mutex<Vec<ContainerSpec>>,
    removed: Mutex<Vec<String>>,
    unreachable: bool,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runtime whose ping fails
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Register the behaviour of containers created from `image`
    pub fn with_image(self, image: impl Into<String>, behavior: MockBehavior) -> Self {
        self.behaviors.lock().unwrap().insert(image.into(), behavior);
        self
    }

    /// Specs of every container created so far
    pub fn created(&self) -> Vec<ContainerSpec> {
        self.created.lock().unwrap().clone()
    }

    /// Ids of every container removed so far
    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }

    /// Containers created but not yet removed
    pub fn live_containers(&self) -> usize {
        self.containers.lock().unwrap().len()
    }

    fn behavior_of(&self, id: &str) -> Result<MockBehavior> {
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .map(|c| c.behavior.clone())
            .ok_or_else(|| AgentError::Runtime(format!("No such container: {}", id)))
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn ping(&self) -> Result<()> {
        if self.unreachable {
            return Err(AgentError::Runtime("Cannot connect to the container runtime".to_string()));
        }
        Ok(())
    }

    async fn create(&self, spec: &ContainerSpec) -> Result<String> {
        let behavior = self
            .behaviors
            .lock()
            .unwrap()
            .get(&spec.image)
            .cloned()
            .ok_or_else(|| AgentError::ContainerCreate(format!("No such image: {}", spec.image)))?;

        if let MockBehavior::FailCreate(msg) = &behavior {
            return Err(AgentError::ContainerCreate(msg.clone()));
        }

        let mut containers = self.containers.lock().unwrap();
        if containers.values().any(|c| c.spec.name == spec.name) {
            return Err(AgentError::ContainerCreate(format!(
                "Conflict. The container name \"/{}\" is already in use",
                spec.name
            )));
        }

        let id = format!("mock-{}", spec.name);
        containers.insert(
            id.clone(),
            MockContainer {
                spec: spec.clone(),
                behavior,
            },
        );
        self.created.lock().unwrap().push(spec.clone());
        Ok(id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        let (spec, behavior) = {
            let containers = self.containers.lock().unwrap();
            let container = containers
                .get(id)
                .ok_or_else(|| AgentError::ContainerStart(format!("No such container: {}", id)))?;
            (container.spec.clone(), container.behavior.clone())
        };

        match behavior {
            MockBehavior::FailStart(msg) => Err(AgentError::ContainerStart(msg)),
            MockBehavior::Exit { files, .. } => {
                let Some(mount) = spec.mounts.first() else {
                    return Ok(());
                };
                for (path, contents) in files {
                    let target = mount.source.join(path.trim_start_matches('/'));
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(target, contents)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    async fn wait(&self, id: &str) -> Result<i64> {
        match self.behavior_of(id)? {
            MockBehavior::Exit { code, .. } => Ok(code),
            MockBehavior::FailWait(msg) => Err(AgentError::ContainerWait(msg)),
            MockBehavior::Hang => std::future::pending().await,
            _ => Err(AgentError::ContainerWait(format!("container {} is not running", id))),
        }
    }

    async fn logs(&self, id: &str, max_bytes: usize) -> Result<ContainerLogs> {
        let keep_end = |text: String| {
            let bytes = text.into_bytes();
            bytes[bytes.len().saturating_sub(max_bytes)..].to_vec()
        };
        match self.behavior_of(id)? {
            MockBehavior::Exit { stdout, stderr, .. } => Ok(ContainerLogs {
                stdout: keep_end(stdout),
                stderr: keep_end(stderr),
            }),
            _ => Ok(ContainerLogs::default()),
        }
    }

    async fn remove(&self, id: &str, _force: bool) -> Result<()> {
        let mut containers = self.containers.lock().unwrap();
        let key = if containers.contains_key(id) {
            id.to_string()
        } else {
            containers
                .iter()
                .find(|(_, c)| c.spec.name == id)
                .map(|(key, _)| key.clone())
                .ok_or_else(|| AgentError::Runtime(format!("No such container: {}", id)))?
        };
        containers.remove(&key);
        drop(containers);

        self.removed.lock().unwrap().push(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::BindMount;
    use tempfile::tempdir;

    fn spec(image: &str, source: &std::path::Path) -> ContainerSpec {
        ContainerSpec {
            name: "job-t".to_string(),
            image: image.to_string(),
            cmd: vec![],
            mounts: vec![BindMount {
                source: source.to_path_buf(),
                target: "/out".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn test_unknown_image_fails_create() {
        let dir = tempdir().unwrap();
        let runtime = MockRuntime::new();
        let err = runtime.create(&spec("ghost", dir.path())).await.unwrap_err();
        assert!(err.to_string().contains("No such image: ghost"));
    }

    #[tokio::test]
    async fn test_lifecycle_writes_files() {
        let dir = tempdir().unwrap();
        let runtime = MockRuntime::new().with_image("alpine", MockBehavior::success(&[("/r.txt", b"hi\n")]));

        let id = runtime.create(&spec("alpine", dir.path())).await.unwrap();
        runtime.start(&id).await.unwrap();
        assert_eq!(runtime.wait(&id).await.unwrap(), 0);
        runtime.remove(&id, false).await.unwrap();

        assert_eq!(std::fs::read(dir.path().join("r.txt")).unwrap(), b"hi\n");
        assert_eq!(runtime.live_containers(), 0);
        assert_eq!(runtime.removed(), vec![id]);
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let dir = tempdir().unwrap();
        let runtime = MockRuntime::new().with_image("alpine", MockBehavior::success(&[]));
        runtime.create(&spec("alpine", dir.path())).await.unwrap();
        let err = runtime.create(&spec("alpine", dir.path())).await.unwrap_err();
        assert!(err.to_string().contains("already in use"));
    }

    #[tokio::test]
    async fn test_remove_by_name() {
        let dir = tempdir().unwrap();
        let runtime = MockRuntime::new().with_image("alpine", MockBehavior::success(&[]));
        let id = runtime.create(&spec("alpine", dir.path())).await.unwrap();

        runtime.remove("job-t", true).await.unwrap();

        assert_eq!(runtime.removed(), vec![id]);
        assert!(runtime.remove("job-t", true).await.is_err());
    }
}
