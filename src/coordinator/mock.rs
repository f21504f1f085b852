//! In-memory coordinator for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::Coordinator;
use crate::domain::{Job, ResultMetadata};
use crate::error::{AgentError, Result};

/// Hands out queued job batches and records submitted results
#[derive(Debug, Default)]
pub struct MockCoordinator {
    batches: Mutex<VecDeque<Result<Vec<Job>>>>,
    submitted: Mutex<Vec<ResultMetadata>>,
    failing_submissions: Mutex<usize>,
    polls: Mutex<usize>,
}

impl MockCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a batch returned by the next poll
    pub fn with_batch(self, jobs: Vec<Job>) -> Self {
        self.batches.lock().unwrap().push_back(Ok(jobs));
        self
    }

    /// Queue a poll failure
    pub fn with_poll_error(self, message: &str) -> Self {
        self.batches
            .lock()
            .unwrap()
            .push_back(Err(AgentError::Coordinator(message.to_string())));
        self
    }

    /// Reject the next `count` submissions
    pub fn with_failing_submissions(self, count: usize) -> Self {
        *self.failing_submissions.lock().unwrap() = count;
        self
    }

    /// Every result accepted so far, in order
    pub fn submitted(&self) -> Vec<ResultMetadata> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn poll_count(&self) -> usize {
        *self.polls.lock().unwrap()
    }
}

#[async_trait]
impl Coordinator for MockCoordinator {
    async fn poll_jobs(&self) -> Result<Vec<Job>> {
        *self.polls.lock().unwrap() += 1;
        self.batches.lock().unwrap().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn submit_result(&self, result: &ResultMetadata) -> Result<()> {
        {
            let mut failing = self.failing_submissions.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(AgentError::Coordinator("Result submission failed with status: 503".to_string()));
            }
        }
        self.submitted.lock().unwrap().push(result.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_batches_then_empty() {
        let coordinator = MockCoordinator::new()
            .with_batch(vec![Job::new("a", "alpine", vec![])])
            .with_poll_error("down");

        assert_eq!(coordinator.poll_jobs().await.unwrap().len(), 1);
        assert!(coordinator.poll_jobs().await.is_err());
        assert!(coordinator.poll_jobs().await.unwrap().is_empty());
        assert_eq!(coordinator.poll_count(), 3);
    }

    #[tokio::test]
    async fn test_failing_submissions() {
        let coordinator = MockCoordinator::new().with_failing_submissions(1);
        let result = crate::builder::build_failure("j", "x");

        assert!(coordinator.submit_result(&result).await.is_err());
        assert!(coordinator.submit_result(&result).await.is_ok());
        assert_eq!(coordinator.submitted().len(), 1);
    }
}
