//! Job pipeline driver - the agent's main loop
//!
//! Each cycle:
//! - Polls the coordinator for matched jobs
//! - Runs each job to completion, one at a time
//! - Journals and reports each result
//! - Sleeps for the poll interval
//!
//! Nothing that happens to one job stops the loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::builder;
use crate::collector;
use crate::coordinator::Coordinator;
use crate::domain::{Artifact, Job, JobState, ResultMetadata};
use crate::executor::ContainerExecutor;
use crate::journal::ResultJournal;

/// Configuration for the driver loop
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Wait between the end of one cycle and the next poll
    pub poll_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl DriverConfig {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

/// What happened during one poll/execute/report cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Jobs returned by the poll
    pub polled: usize,
    /// Jobs whose workload exited zero
    pub succeeded: usize,
    /// Jobs that failed (agent failure or non-zero exit)
    pub failed: usize,
    /// Results acknowledged by the coordinator
    pub reported: usize,
    /// Results the coordinator did not acknowledge
    pub report_failures: usize,
    /// Whether the poll itself failed
    pub poll_failed: bool,
}

/// Outcome of replaying journaled results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub replayed: usize,
    pub still_pending: usize,
}

/// Cumulative counters since the driver was created
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub cycles: u64,
    pub jobs_processed: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub reports_failed: u64,
}

impl DriverStats {
    fn record(&mut self, cycle: &CycleReport) {
        self.cycles += 1;
        self.jobs_processed += cycle.polled as u64;
        self.jobs_succeeded += cycle.succeeded as u64;
        self.jobs_failed += cycle.failed as u64;
        self.reports_failed += cycle.report_failures as u64;
    }
}

/// Sequential poll -> execute -> collect -> report loop
pub struct Driver {
    config: DriverConfig,
    executor: ContainerExecutor,
    coordinator: Arc<dyn Coordinator>,
    journal: ResultJournal,
    stats: DriverStats,
}

impl Driver {
    pub fn new(
        config: DriverConfig,
        executor: ContainerExecutor,
        coordinator: Arc<dyn Coordinator>,
        journal: ResultJournal,
    ) -> Self {
        Self {
            config,
            executor,
            coordinator,
            journal,
            stats: DriverStats::default(),
        }
    }

    pub fn stats(&self) -> &DriverStats {
        &self.stats
    }

    pub fn journal(&self) -> &ResultJournal {
        &self.journal
    }

    /// Replay pending results, then cycle forever. Only returns if the process is killed.
    pub async fn run(&mut self) {
        if !self.journal.is_empty() {
            let replay = self.replay_pending().await;
            info!(
                "Replayed {} journaled results, {} still pending",
                replay.replayed, replay.still_pending
            );
        }

        loop {
            let cycle = self.run_cycle().await;
            debug!("Cycle finished: {:?}", cycle);

            info!("Waiting {:?} for next poll...", self.config.poll_interval);
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Replay pending results, then run a single cycle.
    pub async fn run_once(&mut self) -> CycleReport {
        if !self.journal.is_empty() {
            let replay = self.replay_pending().await;
            info!(
                "Replayed {} journaled results, {} still pending",
                replay.replayed, replay.still_pending
            );
        }
        self.run_cycle().await
    }

    /// One poll/execute/report cycle; drains the whole batch.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let mut cycle = CycleReport::default();

        let jobs = match self.coordinator.poll_jobs().await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("Failed to poll jobs: {}", e);
                cycle.poll_failed = true;
                Vec::new()
            }
        };
        cycle.polled = jobs.len();

        for job in &jobs {
            info!("Processing job: {}", job.job_id);
            let (state, result) = self.run_job(job).await;

            if result.is_success() {
                cycle.succeeded += 1;
            } else {
                cycle.failed += 1;
            }

            if self.report(&result).await {
                cycle.reported += 1;
            } else {
                cycle.report_failures += 1;
            }
            transition(&job.job_id, state, JobState::Reported);
        }

        self.stats.record(&cycle);
        cycle
    }

    /// Run one job through execution and collection to its terminal result.
    pub async fn process_job(&self, job: &Job) -> ResultMetadata {
        self.run_job(job).await.1
    }

    /// Like `process_job`, also returning the state the job stopped in.
    async fn run_job(&self, job: &Job) -> (JobState, ResultMetadata) {
        let started = Instant::now();
        debug!(
            "Job {} image={} cmd={:?} outputs={}",
            job.job_id,
            job.image,
            job.cmd,
            job.outputs.len()
        );

        let state = transition(&job.job_id, JobState::Matched, JobState::Running);
        let outcome = match self.executor.execute(job).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Job {} failed: {}", job.job_id, e);
                return (state, builder::build_failure(&job.job_id, e.to_string()));
            }
        };

        let state = transition(&job.job_id, state, JobState::Collecting);
        let artifacts = if outcome.succeeded() {
            self.collect(job).await
        } else {
            info!(
                "Job {} exited with code {}, skipping artifact collection",
                job.job_id, outcome.exit_code
            );
            Vec::new()
        };

        (state, builder::build_success(job, outcome, artifacts, started.elapsed()))
    }

    async fn collect(&self, job: &Job) -> Vec<Artifact> {
        let output_root = match self.executor.output_dir(job) {
            Ok(dir) => dir,
            Err(e) => {
                warn!("Cannot resolve output directory for job {}: {}", job.job_id, e);
                return Vec::new();
            }
        };

        let owned = job.clone();
        match tokio::task::spawn_blocking(move || collector::collect(&owned, &output_root)).await {
            Ok(artifacts) => artifacts,
            Err(e) => {
                error!("Artifact collection for job {} panicked: {}", job.job_id, e);
                Vec::new()
            }
        }
    }

    /// Journal then submit one result; true if the coordinator acknowledged it.
    async fn report(&mut self, result: &ResultMetadata) -> bool {
        let entry_id = match self.journal.record(result) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!("Failed to journal result for job {}: {}", result.job_id, e);
                None
            }
        };

        match self.coordinator.submit_result(result).await {
            Ok(()) => {
                info!("Results submitted for job: {}", result.job_id);
                if let Some(id) = entry_id {
                    if let Err(e) = self.journal.acknowledge(&id) {
                        warn!("Failed to clear journal entry {}: {}", id, e);
                    }
                }
                true
            }
            Err(e) => {
                error!(
                    "Failed to submit result for job {}: {} (kept in {})",
                    result.job_id,
                    e,
                    self.journal.path().display()
                );
                false
            }
        }
    }

    /// Re-submit every journaled result once; acknowledged ones are removed.
    pub async fn replay_pending(&mut self) -> ReplayReport {
        let pending: Vec<_> = self.journal.pending().to_vec();
        let mut report = ReplayReport::default();

        for entry in pending {
            match self.coordinator.submit_result(&entry.result).await {
                Ok(()) => {
                    info!("Replayed result for job {} (recorded {})", entry.result.job_id, entry.recorded_at);
                    if let Err(e) = self.journal.acknowledge(&entry.id) {
                        warn!("Failed to clear journal entry {}: {}", entry.id, e);
                    }
                    report.replayed += 1;
                }
                Err(e) => {
                    warn!("Replay of job {} failed: {}", entry.result.job_id, e);
                    report.still_pending += 1;
                }
            }
        }

        report
    }
}

fn transition(job_id: &str, from: JobState, to: JobState) -> JobState {
    debug_assert!(from.can_transition_to(to), "illegal transition {} -> {}", from, to);
    debug!("Job {} {} -> {}", job_id, from, to);
    to
}
