//! Parallel reconstruction of a whole query across all workers.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::join_all;
use proftrace_config::{ClusterConfig, LogFormat, OperatorRegistry, QueryPlan};
use proftrace_core::{Event, FragmentId, FragmentWorkerTrace, QueryId, QueryTrace, TraceError, WorkerId};
use tokio::task::JoinError;
use tracing::{debug, info};

use crate::assemble::FragmentAssembler;
use crate::parser::LogParser;
use crate::unify::unify;

pub struct TraceBuilder {
    log_dir: PathBuf,
    plan: Arc<QueryPlan>,
    cluster: Arc<ClusterConfig>,
    registry: Arc<OperatorRegistry>,
    parser: Arc<LogParser>,
}

impl TraceBuilder {
    pub fn new(log_dir: impl Into<PathBuf>, plan: QueryPlan, cluster: ClusterConfig) -> Self {
        Self {
            log_dir: log_dir.into(),
            plan: Arc::new(plan),
            cluster: Arc::new(cluster),
            registry: Arc::new(OperatorRegistry::standard()),
            parser: Arc::new(LogParser::default()),
        }
    }

    pub fn with_registry(mut self, registry: OperatorRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.parser = Arc::new(LogParser::new(format));
        self
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn cluster(&self) -> &ClusterConfig {
        &self.cluster
    }

    /// Reads every worker's log and assembles all fragment-worker traces of
    /// `query_id`, then unifies them. Any failure aborts the whole build.
    pub async fn build(&self, query_id: QueryId) -> Result<QueryTrace, TraceError> {
        info!(
            query_id,
            workers = self.cluster.worker_count(),
            fragments = self.plan.fragment_count(),
            format = %self.parser.format(),
            "Building query trace"
        );

        // ─── read and parse each worker's log ───
        let reads = self.cluster.worker_ids().map(|worker_id| {
            let parser = Arc::clone(&self.parser);
            let log_dir = self.log_dir.clone();
            async move {
                let events = tokio::task::spawn_blocking(move || {
                    parser.read_worker_log(&log_dir, query_id, worker_id)
                })
                .await
                .map_err(task_error)??;
                Ok::<_, TraceError>((worker_id, Arc::new(events)))
            }
        });
        let worker_events = join_all(reads)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        // ─── assemble each (worker, fragment) pair ───
        let mut jobs = Vec::new();
        for (worker_id, events) in &worker_events {
            for fragment_id in fragments_for(&self.plan, *worker_id, events) {
                debug!(worker_id, fragment_id, "Scheduling fragment assembly");
                jobs.push(self.assemble(Arc::clone(events), *worker_id, fragment_id));
            }
        }
        let traces = join_all(jobs)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        let trace = unify(traces);
        info!(
            query_id,
            traces = trace.fragments.len(),
            end_ns = trace.end,
            "Query trace built"
        );
        Ok(trace)
    }

    async fn assemble(
        &self,
        events: Arc<Vec<Event>>,
        worker_id: WorkerId,
        fragment_id: FragmentId,
    ) -> Result<FragmentWorkerTrace, TraceError> {
        let plan = Arc::clone(&self.plan);
        let registry = Arc::clone(&self.registry);
        tokio::task::spawn_blocking(move || {
            FragmentAssembler::new(&plan, &registry).assemble(&events, worker_id, fragment_id)
        })
        .await
        .map_err(task_error)?
    }
}

/// Fragments a worker takes part in: plan fragments it is assigned to, in
/// plan order, followed by every recovery fragment seen in its events.
pub fn fragments_for(plan: &QueryPlan, worker_id: WorkerId, events: &[Event]) -> Vec<FragmentId> {
    let recovery: BTreeSet<FragmentId> = events
        .iter()
        .map(|e| e.fragment_id)
        .filter(|&id| id < 0)
        .collect();

    plan.fragments
        .iter()
        .enumerate()
        .filter(|(_, fragment)| fragment.runs_on(worker_id))
        .map(|(i, _)| i as FragmentId)
        .chain(recovery.into_iter().rev())
        .collect()
}

fn task_error(e: JoinError) -> TraceError {
    TraceError::Task(e.to_string())
}
