//! Coordinator protocol
//!
//! This module provides:
//! - Coordinator trait: poll for matched jobs, report one result
//! - HttpCoordinator: JSON-over-HTTP implementation using reqwest
//! - MockCoordinator: in-memory implementation for tests

pub mod http;
pub mod mock;

use async_trait::async_trait;

use crate::domain::{Job, ResultMetadata};
use crate::error::Result;

pub use http::{HttpCoordinator, HttpCoordinatorConfig};
pub use mock::MockCoordinator;

/// The external service that assigns jobs and receives results
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Fetch jobs currently matched to this provider. An empty list is not an error.
    async fn poll_jobs(&self) -> Result<Vec<Job>>;

    /// Submit one job's terminal result. Acknowledgement only; no retry.
    async fn submit_result(&self, result: &ResultMetadata) -> Result<()>;
}
