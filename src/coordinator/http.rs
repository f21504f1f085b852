//! HTTP coordinator client
//!
//! `GET  {base}/jobs?status=MATCHED&provider={addr}` -> `{"jobs": [...]}`
//! `POST {base}/results` with a ResultMetadata body -> acknowledgement

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;

use super::Coordinator;
use crate::domain::{Job, ResultMetadata};
use crate::error::{AgentError, Result};

/// Job status the agent polls for
pub const DEFAULT_JOB_STATUS: &str = "MATCHED";

/// Configuration for the HTTP coordinator client
#[derive(Debug, Clone)]
pub struct HttpCoordinatorConfig {
    /// Base URL, e.g. `http://localhost:8080`
    pub base_url: String,
    /// Provider address jobs are matched to
    pub provider: String,
    /// Status filter sent with each poll
    pub job_status: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpCoordinatorConfig {
    pub fn new(base_url: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            provider: provider.into(),
            job_status: DEFAULT_JOB_STATUS.to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Deserialize)]
struct JobsResponse {
    #[serde(default)]
    jobs: Vec<Job>,
}

/// Coordinator reached over HTTP with JSON payloads
pub struct HttpCoordinator {
    client: Client,
    config: HttpCoordinatorConfig,
}

impl HttpCoordinator {
    pub fn new(config: HttpCoordinatorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::Coordinator(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Coordinator for HttpCoordinator {
    async fn poll_jobs(&self) -> Result<Vec<Job>> {
        let url = self.endpoint("jobs");
        debug!("Polling {} for provider {}", url, self.config.provider);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("status", self.config.job_status.as_str()),
                ("provider", self.config.provider.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AgentError::Coordinator(format!("Failed to poll jobs: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Coordinator(format!("Polling failed with status: {}", status)));
        }

        let body: JobsResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Coordinator(format!("Failed to decode jobs response: {}", e)))?;

        info!("Found {} matched jobs", body.jobs.len());
        Ok(body.jobs)
    }

    async fn submit_result(&self, result: &ResultMetadata) -> Result<()> {
        let url = self.endpoint("results");

        let response = self
            .client
            .post(&url)
            .json(result)
            .send()
            .await
            .map_err(|e| AgentError::Coordinator(format!("Failed to post results: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Coordinator(format!(
                "Result submission failed with status {}: {}",
                status,
                body.trim()
            )));
        }

        Ok(())
    }
}
