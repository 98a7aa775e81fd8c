//! Explicit component wiring
//!
//! All long-lived components are built once here and handed out by
//! reference. The outer layers (CLI, a web front end) talk to the system
//! only through [`Platform`].

use crate::config::AppConfig;
use crate::db::models::{ExecutionSource, NewExecutionSource};
use crate::db::DatabaseConnection;
use crate::orchestration::{FanOutOrchestrator, OrchestrationRun};
use crate::store::{SqliteStateStore, StateStore};
use crate::sync::{
    ExecutionCollector, JobReport, JobSchedule, SourceDiscovery, SyncJob, SyncScheduler,
    TraceExporter,
};
use crate::transform::TransformOptions;
use crate::{OrchestratorError, Result};
use chrono::Utc;
use connectors::{
    AgentClient, ExecutionSourceClient, FsLogSink, HttpAgentClient, LangfuseClient, LogSink,
    N8nClient, StubAgentClient, TraceSink,
};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// The collaborators a platform is assembled from
#[derive(Clone)]
pub struct Components {
    pub store: Arc<dyn StateStore>,
    pub agents: Arc<dyn AgentClient>,
    pub log_sink: Arc<dyn LogSink>,
    /// Workflow engine; discovery and collection are off without it
    pub source_client: Option<Arc<dyn ExecutionSourceClient>>,
    /// Trace backend; export is off without it
    pub trace_sink: Option<Arc<dyn TraceSink>>,
}

impl Components {
    /// Build the production collaborators described by `config`
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let db = DatabaseConnection::connect(&config.database.url, config.database.max_connections).await?;
        db.run_migrations().await?;
        let store: Arc<dyn StateStore> = Arc::new(SqliteStateStore::new(db));

        let agents: Arc<dyn AgentClient> = match config.agents.endpoint_config() {
            Some(endpoint) => Arc::new(HttpAgentClient::new(endpoint)?),
            None => {
                warn!("No agent runtime endpoint configured, using stub agent");
                Arc::new(StubAgentClient)
            }
        };

        let source_client: Option<Arc<dyn ExecutionSourceClient>> =
            match N8nClient::new(config.n8n.endpoint_config()) {
                Ok(client) => Some(Arc::new(client)),
                Err(err) => {
                    warn!(error = %err, "n8n client unavailable, source sync disabled");
                    None
                }
            };

        let trace_sink: Option<Arc<dyn TraceSink>> =
            match LangfuseClient::new(config.langfuse.endpoint_config()) {
                Ok(client) => Some(Arc::new(client)),
                Err(err) => {
                    warn!(error = %err, "Langfuse client unavailable, trace export disabled");
                    None
                }
            };

        Ok(Self {
            store,
            agents,
            log_sink: Arc::new(FsLogSink::new(&config.log_sink.root)),
            source_client,
            trace_sink,
        })
    }
}

/// One of the sync jobs, addressable by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Discover,
    Collect,
    Export,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Discover => "discover",
            JobKind::Collect => "collect",
            JobKind::Export => "export",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "discover" => Ok(JobKind::Discover),
            "collect" => Ok(JobKind::Collect),
            "export" => Ok(JobKind::Export),
            other => Err(OrchestratorError::InvalidInput(format!("unknown job: {}", other))),
        }
    }
}

/// Orchestrator, sync jobs and scheduler sharing one state store
pub struct Platform {
    store: Arc<dyn StateStore>,
    orchestrator: FanOutOrchestrator,
    discovery: Option<Arc<SourceDiscovery>>,
    collector: Option<Arc<ExecutionCollector>>,
    exporter: Option<Arc<TraceExporter>>,
    scheduler: SyncScheduler,
}

impl Platform {
    /// Assemble a platform from already built collaborators
    pub fn new(components: Components, config: &AppConfig) -> Self {
        let Components {
            store,
            agents,
            log_sink,
            source_client,
            trace_sink,
        } = components;
        let sched = &config.scheduler;

        let orchestrator = FanOutOrchestrator::new(
            agents,
            store.clone(),
            log_sink,
            config.agents.fan_out_settings(),
        );

        let discovery = source_client
            .clone()
            .filter(|_| sched.discovery_enabled)
            .map(|client| Arc::new(SourceDiscovery::new(client, store.clone(), sched.source_page_limit)));
        let collector = source_client.map(|client| {
            Arc::new(ExecutionCollector::new(client, store.clone(), sched.execution_page_limit))
        });
        let exporter = trace_sink.map(|sink| {
            let options = TransformOptions {
                trigger_node: sched.trigger_node.clone(),
            };
            let exporter = TraceExporter::new(store.clone(), sink, options, sched.export_delay());
            Arc::new(match sched.export_batch_limit {
                Some(limit) => exporter.with_batch_limit(limit),
                None => exporter,
            })
        });

        let mut schedules = Vec::new();
        if let Some(job) = &discovery {
            schedules.push(JobSchedule::new(job.clone(), sched.discovery_interval()));
        }
        if let Some(job) = &collector {
            schedules.push(JobSchedule::new(job.clone(), sched.collect_interval()));
        }
        if let Some(job) = &exporter {
            schedules.push(JobSchedule::new(job.clone(), sched.export_interval()));
        }
        let scheduler = SyncScheduler::new(schedules).with_run_on_start(sched.run_on_start);

        Self {
            store,
            orchestrator,
            discovery,
            collector,
            exporter,
            scheduler,
        }
    }

    /// Build the production platform from configuration
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        let components = Components::from_config(config).await?;
        Ok(Self::new(components, config))
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &SyncScheduler {
        &self.scheduler
    }

    /// Fan one request out to the agent roster
    pub async fn run_orchestration(
        &self,
        message: &str,
        session_id: Option<String>,
        user_id: Option<String>,
    ) -> Result<OrchestrationRun> {
        self.orchestrator.run(message, session_id, user_id).await
    }

    /// Records still waiting for trace export
    pub async fn unprocessed_count(&self) -> Result<i64> {
        Ok(self.store.count_unprocessed().await?)
    }

    /// Register a source by hand; it is collected from the next tick on
    pub async fn register_source(
        &self,
        source_id: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<ExecutionSource> {
        if source_id.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput(
                "source id must not be empty".to_string(),
            ));
        }
        let mut source = NewExecutionSource::new(source_id, name, Utc::now());
        if let Some(description) = description {
            source = source.with_description(description);
        }
        let stored = self.store.register_source(&source).await?;
        info!(source_id, "Source registered");
        Ok(stored)
    }

    /// Run a single pass of one job outside the scheduler
    pub async fn run_job(&self, kind: JobKind) -> Result<JobReport> {
        let job: Arc<dyn SyncJob> = match kind {
            JobKind::Discover => self.discovery.clone().map(|j| j as Arc<dyn SyncJob>),
            JobKind::Collect => self.collector.clone().map(|j| j as Arc<dyn SyncJob>),
            JobKind::Export => self.exporter.clone().map(|j| j as Arc<dyn SyncJob>),
        }
        .ok_or_else(|| OrchestratorError::Config(format!("job '{}' is not configured", kind)))?;

        Ok(job.run(&CancellationToken::new()).await?)
    }

    pub async fn start_scheduler(&self) -> Result<()> {
        if self.scheduler.job_names().is_empty() {
            warn!("No sync jobs configured, scheduler idle");
        }
        Ok(self.scheduler.start().await?)
    }

    pub async fn stop_scheduler(&self) {
        self.scheduler.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_kind_parsing() {
        assert_eq!("collect".parse::<JobKind>().unwrap(), JobKind::Collect);
        assert_eq!(JobKind::Export.to_string(), "export");
        assert!("purge".parse::<JobKind>().is_err());
    }

    #[tokio::test]
    async fn test_platform_without_sync_endpoints() {
        let store: Arc<dyn StateStore> = Arc::new(SqliteStateStore::in_memory().await.unwrap());
        let dir = tempfile::tempdir().unwrap();
        let components = Components {
            store,
            agents: Arc::new(StubAgentClient),
            log_sink: Arc::new(FsLogSink::new(dir.path())),
            source_client: None,
            trace_sink: None,
        };
        let platform = Platform::new(components, &AppConfig::default());

        let run = platform.run_orchestration("hello", Some("s-1".into()), None).await.unwrap();
        assert_eq!(run.agents_used().len(), 3);
        assert_eq!(platform.unprocessed_count().await.unwrap(), 0);
        assert!(platform.run_job(JobKind::Collect).await.is_err());

        platform.start_scheduler().await.unwrap();
        platform.stop_scheduler().await;
    }
}
