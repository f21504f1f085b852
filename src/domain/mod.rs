//! Domain types for the provider agent
//!
//! This module contains the values that flow through the job pipeline:
//! - Job: A unit of work received from the coordinator
//! - ExecutionOutcome: Raw termination status of a job's container
//! - Artifact / ResultMetadata: The reportable result of one job
//! - JobState: Per-job pipeline state machine

pub mod job;
pub mod outcome;
pub mod result;
pub mod state;

pub use job::{Job, OutputSpec};
pub use outcome::ExecutionOutcome;
pub use result::{Artifact, FAILURE_EXIT_CODE, ResultMetadata};
pub use state::JobState;
