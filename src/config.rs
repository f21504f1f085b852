use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coordinator::HttpCoordinatorConfig;
use crate::executor::{DEFAULT_MOUNT_POINT, DEFAULT_TAIL_BYTES, ExecutorConfig};
use crate::runtime::docker::DEFAULT_DOCKER_BINARY;

/// Characters that would split a bind mount spec
const MOUNT_SPEC_RESERVED: [char; 2] = [',', '='];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub coordinator: CoordinatorConfig,
    pub runtime: RuntimeConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    pub url: String,
    pub provider: String,
    pub job_status: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            provider: String::new(),
            job_status: "MATCHED".to_string(),
            poll_interval_ms: 5000,
            request_timeout_ms: 30000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub binary: String,
    pub mount_point: String,
    pub tail_bytes: usize,
    pub wait_timeout_secs: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_DOCKER_BINARY.to_string(),
            mount_point: DEFAULT_MOUNT_POINT.to_string(),
            tail_bytes: DEFAULT_TAIL_BYTES,
            wait_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub outputs_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            outputs_dir: PathBuf::from("./outputs"),
            state_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(env!("CARGO_PKG_NAME")),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            coordinator: CoordinatorConfig::default(),
            runtime: RuntimeConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path takes precedence
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Try ./<project>.yml
        let local_config = PathBuf::from(format!("{}.yml", project_name));
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.coordinator.url.trim().is_empty() {
            eyre::bail!("coordinator.url must be set");
        }
        if !self.coordinator.url.starts_with("http://") && !self.coordinator.url.starts_with("https://") {
            eyre::bail!("coordinator.url must be an http(s) URL, got {}", self.coordinator.url);
        }
        if self.coordinator.provider.trim().is_empty() {
            eyre::bail!("coordinator.provider must be set");
        }
        if self.coordinator.poll_interval_ms == 0 {
            eyre::bail!("coordinator.poll_interval_ms must be > 0");
        }
        if self.runtime.binary.trim().is_empty() {
            eyre::bail!("runtime.binary must be set");
        }
        if !self.runtime.mount_point.starts_with('/') {
            eyre::bail!("runtime.mount_point must be an absolute container path");
        }
        if self.runtime.tail_bytes == 0 {
            eyre::bail!("runtime.tail_bytes must be > 0");
        }
        if self.runtime.wait_timeout_secs == Some(0) {
            eyre::bail!("runtime.wait_timeout_secs must be > 0 when set");
        }

        // Both end up inside the comma-separated `--mount` option
        if self.runtime.mount_point.contains(MOUNT_SPEC_RESERVED) {
            eyre::bail!("runtime.mount_point must not contain ',' or '=': {}", self.runtime.mount_point);
        }
        let outputs_dir = std::path::absolute(&self.storage.outputs_dir).context("Failed to resolve storage.outputs_dir")?;
        if outputs_dir.to_string_lossy().contains(MOUNT_SPEC_RESERVED) {
            eyre::bail!("storage.outputs_dir must not contain ',' or '=': {}", outputs_dir.display());
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.coordinator.poll_interval_ms)
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            outputs_dir: self.storage.outputs_dir.clone(),
            mount_point: self.runtime.mount_point.clone(),
            tail_bytes: self.runtime.tail_bytes,
            wait_timeout: self.runtime.wait_timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn coordinator_config(&self) -> HttpCoordinatorConfig {
        HttpCoordinatorConfig {
            base_url: self.coordinator.url.clone(),
            provider: self.coordinator.provider.clone(),
            job_status: self.coordinator.job_status.clone(),
            timeout: Duration::from_millis(self.coordinator.request_timeout_ms),
        }
    }
}
