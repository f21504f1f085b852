//! provider-agent - job-execution agent for a compute marketplace provider
//!
//! The agent polls a coordinator for jobs matched to its provider identity,
//! runs each job in a fresh container, hashes the declared output files and
//! reports a result record back, one job at a time.

pub mod builder;
pub mod collector;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod driver;
pub mod error;
pub mod executor;
pub mod journal;
pub mod paths;
pub mod runtime;

pub use error::{AgentError, Result};
