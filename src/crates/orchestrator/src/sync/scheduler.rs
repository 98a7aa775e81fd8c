//! Interval scheduler for the sync jobs
//!
//! Each job gets its own ticker task. A tick spawns a pass onto the job's
//! `JoinSet` without waiting for the previous one, so passes of the same job
//! can overlap. Stopping cancels the shared token and waits for every ticker
//! and every in-flight pass.

use super::{SyncError, SyncJob};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// A job and the interval it runs on
#[derive(Clone)]
pub struct JobSchedule {
    pub job: Arc<dyn SyncJob>,
    pub interval: Duration,
}

impl JobSchedule {
    pub fn new(job: Arc<dyn SyncJob>, interval: Duration) -> Self {
        Self { job, interval }
    }
}

struct Running {
    cancel: CancellationToken,
    tickers: Vec<JoinHandle<()>>,
}

/// Runs each scheduled job on its own fixed interval
pub struct SyncScheduler {
    schedules: Vec<JobSchedule>,
    run_on_start: bool,
    running: Mutex<Option<Running>>,
}

impl SyncScheduler {
    pub fn new(schedules: Vec<JobSchedule>) -> Self {
        Self {
            schedules,
            run_on_start: false,
            running: Mutex::new(None),
        }
    }

    /// Fire every job immediately on start instead of after one interval
    pub fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }

    pub fn job_names(&self) -> Vec<&'static str> {
        self.schedules.iter().map(|s| s.job.name()).collect()
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Spawn one ticker per job
    pub async fn start(&self) -> Result<(), SyncError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(SyncError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let tickers = self
            .schedules
            .iter()
            .map(|schedule| {
                info!(job = schedule.job.name(), interval_secs = schedule.interval.as_secs_f64(), "Scheduling job");
                tokio::spawn(tick(schedule.clone(), self.run_on_start, cancel.clone()))
            })
            .collect();

        *running = Some(Running { cancel, tickers });
        info!(jobs = self.schedules.len(), "Sync scheduler started");
        Ok(())
    }

    /// Cancel all jobs and wait for them to wind down; no-op when stopped
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };

        running.cancel.cancel();
        for ticker in running.tickers {
            if let Err(err) = ticker.await {
                error!(error = %err, "Scheduler task ended abnormally");
            }
        }
        info!("Sync scheduler stopped");
    }
}

async fn tick(schedule: JobSchedule, run_on_start: bool, cancel: CancellationToken) {
    let first = if run_on_start {
        Instant::now()
    } else {
        Instant::now() + schedule.interval
    };
    let mut interval = tokio::time::interval_at(first, schedule.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut passes = JoinSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                passes.spawn(run_pass(schedule.job.clone(), cancel.clone()));
            }
            Some(_) = passes.join_next(), if !passes.is_empty() => {}
        }
    }

    while passes.join_next().await.is_some() {}
    debug!(job = schedule.job.name(), "Job ticker stopped");
}

/// Run one pass and log its outcome
pub async fn run_pass(job: Arc<dyn SyncJob>, cancel: CancellationToken) {
    let name = job.name();
    debug!(job = name, "Job pass starting");
    match job.run(&cancel).await {
        Ok(report) => info!(job = name, %report, "Job pass finished"),
        Err(err) => error!(job = name, error = %err, "Job pass failed"),
    }
}
