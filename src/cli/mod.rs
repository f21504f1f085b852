//! CLI module for provider-agent - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for running the polling
//! loop, running a single cycle, replaying journaled results and printing
//! the effective configuration.

pub mod commands;

pub use commands::Cli;
