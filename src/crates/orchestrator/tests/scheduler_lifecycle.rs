use async_trait::async_trait;
use orchestrator::sync::{ExportReport, JobSchedule, SyncJob, SyncScheduler};
use orchestrator::{JobReport, SyncError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Job that counts its passes and optionally takes a while or fails
#[derive(Default)]
struct CountingJob {
    work: Duration,
    fail: bool,
    started: AtomicUsize,
    finished: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl CountingJob {
    fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncJob for CountingJob {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn run(&self, _cancel: &CancellationToken) -> Result<JobReport, SyncError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.work.is_zero() {
            tokio::time::sleep(self.work).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SyncError::InvalidSource {
                source_id: "wf-x".to_string(),
                reason: "always broken".to_string(),
            });
        }
        Ok(JobReport::Export(ExportReport::default()))
    }
}

fn scheduler_for(job: &Arc<CountingJob>, interval: Duration) -> SyncScheduler {
    SyncScheduler::new(vec![JobSchedule::new(job.clone(), interval)])
}

#[tokio::test]
async fn test_run_on_start_fires_immediately_and_repeats() {
    let job = Arc::new(CountingJob::default());
    let scheduler = scheduler_for(&job, Duration::from_millis(20)).with_run_on_start(true);

    scheduler.start().await.unwrap();
    assert!(scheduler.is_running().await);
    tokio::time::sleep(Duration::from_millis(150)).await;
    scheduler.stop().await;

    assert!(job.started() >= 2, "started {} passes", job.started());
    assert!(!scheduler.is_running().await);

    let after_stop = job.started();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(job.started(), after_stop);
}

#[tokio::test]
async fn test_first_pass_waits_one_interval_by_default() {
    let job = Arc::new(CountingJob::default());
    let scheduler = scheduler_for(&job, Duration::from_secs(3600));

    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    scheduler.stop().await;

    assert_eq!(job.started(), 0);
}

#[tokio::test]
async fn test_double_start_is_rejected() {
    let job = Arc::new(CountingJob::default());
    let scheduler = scheduler_for(&job, Duration::from_secs(3600));

    scheduler.start().await.unwrap();
    assert!(matches!(scheduler.start().await, Err(SyncError::AlreadyRunning)));
    scheduler.stop().await;

    scheduler.start().await.unwrap();
    scheduler.stop().await;
    scheduler.stop().await;
}

#[tokio::test]
async fn test_passes_overlap_and_stop_drains_them() {
    let job = Arc::new(CountingJob {
        work: Duration::from_millis(120),
        ..Default::default()
    });
    let scheduler = scheduler_for(&job, Duration::from_millis(20)).with_run_on_start(true);

    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    scheduler.stop().await;

    assert!(job.max_in_flight.load(Ordering::SeqCst) > 1);
    assert_eq!(job.started(), job.finished());
}

#[tokio::test]
async fn test_failing_job_keeps_its_schedule() {
    let job = Arc::new(CountingJob {
        fail: true,
        ..Default::default()
    });
    let scheduler = scheduler_for(&job, Duration::from_millis(20)).with_run_on_start(true);

    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    scheduler.stop().await;

    assert!(job.finished() >= 2);
}

#[tokio::test]
async fn test_jobs_tick_independently() {
    let fast = Arc::new(CountingJob::default());
    let slow = Arc::new(CountingJob::default());
    let scheduler = SyncScheduler::new(vec![
        JobSchedule::new(fast.clone(), Duration::from_millis(20)),
        JobSchedule::new(slow.clone(), Duration::from_secs(3600)),
    ]);
    assert_eq!(scheduler.job_names(), vec!["counting", "counting"]);

    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;
    scheduler.stop().await;

    assert!(fast.started() >= 2);
    assert_eq!(slow.started(), 0);
}
