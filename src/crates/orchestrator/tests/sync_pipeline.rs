use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use connectors::{
    ClientError, ExecutionSourceClient, ExecutionSummary, SourceSummary, Trace, TraceSink,
};
use orchestrator::db::models::NewExecutionSource;
use orchestrator::sync::{ExecutionCollector, SourceDiscovery, TraceExporter};
use orchestrator::transform::{trace_id, TransformOptions};
use orchestrator::{SqliteStateStore, StateStore};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
enum Detail {
    Ok(Value),
    NotFound,
    Unavailable,
}

/// In-memory workflow engine
#[derive(Default)]
struct FakeEngine {
    sources: Mutex<Vec<SourceSummary>>,
    executions: Mutex<HashMap<String, Vec<ExecutionSummary>>>,
    details: Mutex<HashMap<String, Detail>>,
    fetched: Mutex<Vec<String>>,
}

impl FakeEngine {
    fn add_source(&self, id: &str, created_at: Option<String>) {
        self.sources.lock().unwrap().push(SourceSummary {
            id: id.to_string(),
            name: format!("{} flow", id),
            description: None,
            created_at,
            active: true,
        });
    }

    fn add_execution(&self, source_id: &str, id: i64, status: &str) {
        self.executions
            .lock()
            .unwrap()
            .entry(source_id.to_string())
            .or_default()
            .push(ExecutionSummary::new(id.to_string(), status));
        self.set_detail(id, Detail::Ok(execution_detail(source_id, id, status)));
    }

    fn set_detail(&self, id: i64, detail: Detail) {
        self.details.lock().unwrap().insert(id.to_string(), detail);
    }

    fn fetch_count(&self, id: i64) -> usize {
        let id = id.to_string();
        self.fetched.lock().unwrap().iter().filter(|f| **f == id).count()
    }
}

#[async_trait]
impl ExecutionSourceClient for FakeEngine {
    async fn list_active_sources(&self, limit: usize) -> connectors::Result<Vec<SourceSummary>> {
        Ok(self.sources.lock().unwrap().iter().take(limit).cloned().collect())
    }

    async fn list_executions(
        &self,
        source_id: &str,
        limit: usize,
    ) -> connectors::Result<Vec<ExecutionSummary>> {
        let executions = self.executions.lock().unwrap();
        let listed = executions
            .get(source_id)
            .ok_or_else(|| ClientError::ProviderError(format!("unknown workflow {}", source_id)))?;
        // newest first, like the engine
        Ok(listed.iter().rev().take(limit).cloned().collect())
    }

    async fn get_execution_detail(&self, execution_id: &str) -> connectors::Result<Value> {
        self.fetched.lock().unwrap().push(execution_id.to_string());
        match self.details.lock().unwrap().get(execution_id).cloned() {
            Some(Detail::Ok(value)) => Ok(value),
            Some(Detail::NotFound) | None => Err(ClientError::NotFound(execution_id.to_string())),
            Some(Detail::Unavailable) => Err(ClientError::Timeout("engine busy".to_string())),
        }
    }
}

/// Trace backend that remembers what it received
#[derive(Default)]
struct RecordingTraceSink {
    fail: bool,
    traces: Mutex<Vec<Trace>>,
}

#[async_trait]
impl TraceSink for RecordingTraceSink {
    async fn export(&self, trace: &Trace) -> connectors::Result<String> {
        if self.fail {
            return Err(ClientError::RateLimitExceeded("try later".to_string()));
        }
        self.traces.lock().unwrap().push(trace.clone());
        Ok(trace.id.clone())
    }
}

fn execution_detail(source_id: &str, id: i64, status: &str) -> Value {
    json!({
        "id": id.to_string(),
        "workflowId": source_id,
        "status": status,
        "mode": "webhook",
        "startedAt": "2025-06-01T10:00:00.000Z",
        "stoppedAt": "2025-06-01T10:00:01.000Z",
        "workflowData": {"name": "Support flow", "nodes": []},
        "data": {
            "resultData": {
                "runData": {
                    "Webhook": [{
                        "startTime": 1748772000000i64,
                        "executionTime": 2,
                        "data": {"main": [[{"json": {"q": format!("question {}", id)}}]]}
                    }]
                },
                "lastNodeExecuted": "Webhook"
            }
        }
    })
}

struct Pipeline {
    engine: Arc<FakeEngine>,
    store: Arc<SqliteStateStore>,
    collector: ExecutionCollector,
}

async fn setup_pipeline() -> Pipeline {
    let engine = Arc::new(FakeEngine::default());
    let store = Arc::new(SqliteStateStore::in_memory().await.unwrap());
    let collector = ExecutionCollector::new(engine.clone(), store.clone(), 100);
    Pipeline {
        engine,
        store,
        collector,
    }
}

async fn register(store: &SqliteStateStore, source_id: &str) {
    let source = NewExecutionSource::new(source_id, "Support flow", Utc::now());
    store.register_source(&source).await.unwrap();
}

fn exporter(store: &Arc<SqliteStateStore>, sink: &Arc<RecordingTraceSink>) -> TraceExporter {
    TraceExporter::new(store.clone(), sink.clone(), TransformOptions::default(), Duration::ZERO)
}

#[tokio::test]
async fn test_collection_is_idempotent() {
    let p = setup_pipeline().await;
    register(&p.store, "wf-1").await;
    for id in 1..=3 {
        p.engine.add_execution("wf-1", id, "success");
    }
    let cancel = CancellationToken::new();

    let first = p.collector.collect(&cancel).await.unwrap();
    assert_eq!(first.sources, 1);
    assert_eq!(first.inserted, 3);
    assert_eq!(p.store.high_water_mark("wf-1").await.unwrap(), Some(3));

    let second = p.collector.collect(&cancel).await.unwrap();
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 0);
    assert_eq!(p.store.high_water_mark("wf-1").await.unwrap(), Some(3));

    let records = p.store.list_records("wf-1").await.unwrap();
    let ids: Vec<i64> = records.iter().map(|r| r.execution_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(records.iter().all(|r| !r.processed));
    assert_eq!(records[0].mode.as_deref(), Some("webhook"));
}

#[tokio::test]
async fn test_transient_failure_freezes_mark_until_retried() {
    let p = setup_pipeline().await;
    register(&p.store, "wf-1").await;
    for id in 1..=3 {
        p.engine.add_execution("wf-1", id, "success");
    }
    p.engine.set_detail(2, Detail::Unavailable);
    let cancel = CancellationToken::new();

    let report = p.collector.collect(&cancel).await.unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.errored, 1);
    assert_eq!(p.store.high_water_mark("wf-1").await.unwrap(), Some(1));
    assert!(p.store.get_record("wf-1", 2).await.unwrap().is_none());
    assert!(p.store.get_record("wf-1", 3).await.unwrap().is_some());

    p.engine.set_detail(2, Detail::Ok(execution_detail("wf-1", 2, "success")));
    let retry = p.collector.collect(&cancel).await.unwrap();
    assert_eq!(retry.inserted, 1);
    assert_eq!(retry.duplicates, 1);
    assert_eq!(p.store.high_water_mark("wf-1").await.unwrap(), Some(3));
    assert_eq!(p.store.list_records("wf-1").await.unwrap().len(), 3);

    // the stored record above the gap is not fetched again
    assert_eq!(p.engine.fetch_count(2), 2);
    assert_eq!(p.engine.fetch_count(3), 1);
}

#[tokio::test]
async fn test_missing_execution_is_skipped_for_good() {
    let p = setup_pipeline().await;
    register(&p.store, "wf-1").await;
    for id in 1..=3 {
        p.engine.add_execution("wf-1", id, "success");
    }
    p.engine.set_detail(2, Detail::NotFound);

    let report = p.collector.collect(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.inserted, 2);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errored, 0);
    assert_eq!(p.store.high_water_mark("wf-1").await.unwrap(), Some(3));
}

#[tokio::test]
async fn test_running_execution_is_revisited_until_finished() {
    let p = setup_pipeline().await;
    register(&p.store, "wf-1").await;
    p.engine.add_execution("wf-1", 1, "success");
    p.engine.add_execution("wf-1", 2, "running");
    p.engine.add_execution("wf-1", 3, "error");
    let cancel = CancellationToken::new();

    let report = p.collector.collect(&cancel).await.unwrap();
    assert_eq!(report.pending, 1);
    assert_eq!(report.inserted, 2);
    assert_eq!(p.store.high_water_mark("wf-1").await.unwrap(), Some(3));
    assert_eq!(p.store.list_pending("wf-1").await.unwrap(), vec![2]);
    assert!(p.store.get_record("wf-1", 2).await.unwrap().is_none());

    let failed = p.store.get_record("wf-1", 3).await.unwrap().unwrap();
    assert_eq!(failed.status, "error");

    // drops off the listing page once finished; still picked up by id
    p.engine.executions.lock().unwrap().insert("wf-1".to_string(), Vec::new());
    p.engine.set_detail(2, Detail::Ok(execution_detail("wf-1", 2, "success")));

    let report = p.collector.collect(&cancel).await.unwrap();
    assert_eq!(report.inserted, 1);
    assert_eq!(report.pending, 0);
    assert_eq!(p.store.get_record("wf-1", 2).await.unwrap().unwrap().status, "success");
    assert!(p.store.list_pending("wf-1").await.unwrap().is_empty());

    let fetched = p.engine.fetched.lock().unwrap().len();
    p.collector.collect(&cancel).await.unwrap();
    assert_eq!(p.engine.fetched.lock().unwrap().len(), fetched);
}

#[tokio::test]
async fn test_waiting_execution_does_not_refetch_stored_ones() {
    let p = setup_pipeline().await;
    register(&p.store, "wf-1").await;
    p.engine.add_execution("wf-1", 1, "waiting");
    for id in 2..=5 {
        p.engine.add_execution("wf-1", id, "success");
    }
    let cancel = CancellationToken::new();

    let first = p.collector.collect(&cancel).await.unwrap();
    assert_eq!(first.inserted, 4);
    assert_eq!(first.pending, 1);
    for _ in 0..2 {
        let again = p.collector.collect(&cancel).await.unwrap();
        assert_eq!(again.inserted, 0);
        assert_eq!(again.duplicates, 0);
        assert_eq!(again.pending, 1);
    }

    for id in 2..=5 {
        assert_eq!(p.engine.fetch_count(id), 1, "execution {} fetched again", id);
    }
    // only the waiting one is re-checked, once per later pass
    assert_eq!(p.engine.fetch_count(1), 2);
    assert_eq!(p.store.high_water_mark("wf-1").await.unwrap(), Some(5));
    assert_eq!(p.store.list_pending("wf-1").await.unwrap(), vec![1]);
}

#[tokio::test]
async fn test_vanished_pending_execution_is_dropped() {
    let p = setup_pipeline().await;
    register(&p.store, "wf-1").await;
    p.engine.add_execution("wf-1", 1, "running");
    let cancel = CancellationToken::new();

    p.collector.collect(&cancel).await.unwrap();
    assert_eq!(p.store.list_pending("wf-1").await.unwrap(), vec![1]);

    p.engine.executions.lock().unwrap().insert("wf-1".to_string(), Vec::new());
    p.engine.set_detail(1, Detail::NotFound);
    let report = p.collector.collect(&cancel).await.unwrap();

    assert_eq!(report.skipped, 1);
    assert!(p.store.list_pending("wf-1").await.unwrap().is_empty());
    assert!(p.store.get_record("wf-1", 1).await.unwrap().is_none());
}

#[tokio::test]
async fn test_inactive_and_failing_sources() {
    let p = setup_pipeline().await;
    register(&p.store, "wf-1").await;
    register(&p.store, "wf-ghost").await;
    register(&p.store, "wf-paused").await;
    p.engine.add_execution("wf-1", 1, "success");
    p.engine.add_execution("wf-paused", 7, "success");
    p.store.set_source_active("wf-paused", false).await.unwrap();

    let report = p.collector.collect(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.sources, 2);
    assert_eq!(report.failed_sources, 1);
    assert_eq!(report.inserted, 1);
    assert!(p.store.list_records("wf-paused").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_discovery_only_stores_newer_sources() {
    let p = setup_pipeline().await;
    let discovery = SourceDiscovery::new(p.engine.clone(), p.store.clone(), 100);
    let cancel = CancellationToken::new();
    let t = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    let rfc = |at: chrono::DateTime<Utc>| at.to_rfc3339();

    p.engine.add_source("wf-a", Some(rfc(t)));
    let first = discovery.discover(&cancel).await.unwrap();
    assert_eq!(first.new, 1);

    p.engine.add_source("wf-older", Some(rfc(t - ChronoDuration::hours(1))));
    p.engine.add_source("wf-newer", Some(rfc(t + ChronoDuration::hours(1))));
    p.engine.add_source("wf-broken", None);
    let second = discovery.discover(&cancel).await.unwrap();

    assert_eq!(second.total, 4);
    assert_eq!(second.new, 1);
    assert_eq!(second.existing, 1);
    assert_eq!(second.rejected, 1);
    assert_eq!(second.errored, 1);
    assert!(p.store.get_source("wf-older").await.unwrap().is_none());
    assert!(p.store.get_source("wf-newer").await.unwrap().is_some());
    assert!(p.store.get_source("wf-broken").await.unwrap().is_none());
}

#[tokio::test]
async fn test_discovery_ignores_listing_order() {
    let p = setup_pipeline().await;
    let discovery = SourceDiscovery::new(p.engine.clone(), p.store.clone(), 100);
    let t = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

    // newest first into an empty store
    p.engine.add_source("wf-new", Some(t.to_rfc3339()));
    p.engine.add_source("wf-old", Some((t - ChronoDuration::hours(1)).to_rfc3339()));
    p.engine.add_source("wf-mid", Some((t - ChronoDuration::minutes(30)).to_rfc3339()));

    let report = discovery.discover(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.new, 3);
    assert_eq!(report.rejected, 0);
    assert_eq!(p.store.list_active_sources().await.unwrap().len(), 3);
    for id in ["wf-new", "wf-old", "wf-mid"] {
        assert!(p.store.get_source(id).await.unwrap().is_some(), "{} missing", id);
    }
}

#[tokio::test]
async fn test_rediscovery_keeps_deactivation() {
    let p = setup_pipeline().await;
    let discovery = SourceDiscovery::new(p.engine.clone(), p.store.clone(), 100);
    let t = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

    p.engine.add_source("wf-a", Some(t.to_rfc3339()));
    discovery.discover(&CancellationToken::new()).await.unwrap();
    p.store.set_source_active("wf-a", false).await.unwrap();

    p.engine.sources.lock().unwrap()[0].created_at = Some((t + ChronoDuration::hours(1)).to_rfc3339());
    discovery.discover(&CancellationToken::new()).await.unwrap();

    let stored = p.store.get_source("wf-a").await.unwrap().unwrap();
    assert!(!stored.is_active);
    assert_eq!(stored.created_at(), Some(t + ChronoDuration::hours(1)));
}

#[tokio::test]
async fn test_export_marks_records_processed() {
    let p = setup_pipeline().await;
    register(&p.store, "wf-1").await;
    for id in 1..=2 {
        p.engine.add_execution("wf-1", id, "success");
    }
    p.collector.collect(&CancellationToken::new()).await.unwrap();

    let sink = Arc::new(RecordingTraceSink::default());
    let exporter = exporter(&p.store, &sink);

    let report = exporter.export(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.attempted, 2);
    assert_eq!(report.exported, 2);
    assert_eq!(p.store.count_unprocessed().await.unwrap(), 0);

    let record = p.store.get_record("wf-1", 1).await.unwrap().unwrap();
    assert!(record.processed);
    assert_eq!(record.trace_id, Some(trace_id("wf-1", 1).to_string()));

    let traces = sink.traces.lock().unwrap().clone();
    assert_eq!(traces[0].input, json!({"q": "question 1"}));
    assert!(traces[0].spans.is_empty());

    let again = exporter.export(&CancellationToken::new()).await.unwrap();
    assert_eq!(again.attempted, 0);
    assert!(!exporter.export_record(&record).await.unwrap());
}

#[tokio::test]
async fn test_export_failures_leave_records_unprocessed() {
    let p = setup_pipeline().await;
    register(&p.store, "wf-1").await;
    p.engine.add_execution("wf-1", 1, "success");
    p.engine.add_execution("wf-1", 2, "success");
    p.engine.set_detail(2, Detail::Ok(json!("not an execution")));
    p.collector.collect(&CancellationToken::new()).await.unwrap();

    let failing = Arc::new(RecordingTraceSink {
        fail: true,
        ..Default::default()
    });
    let report = exporter(&p.store, &failing).export(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.failed, 2);
    assert_eq!(p.store.count_unprocessed().await.unwrap(), 2);

    let healthy = Arc::new(RecordingTraceSink::default());
    let report = exporter(&p.store, &healthy).export(&CancellationToken::new()).await.unwrap();
    assert_eq!(report.exported, 1);
    assert_eq!(report.failed, 1);
    assert!(!p.store.get_record("wf-1", 2).await.unwrap().unwrap().processed);
}

#[tokio::test]
async fn test_cancelled_pass_does_no_work() {
    let p = setup_pipeline().await;
    register(&p.store, "wf-1").await;
    p.engine.add_execution("wf-1", 1, "success");
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = p.collector.collect(&cancel).await.unwrap();
    assert_eq!(report.sources, 0);
    assert_eq!(p.store.high_water_mark("wf-1").await.unwrap(), None);
}
