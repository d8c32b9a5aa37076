//! Reconstructs operator execution traces of distributed queries from
//! per-worker profiling logs.
//!
//! A [`TraceSession`] ties the reconstruction engine to the trace cache: the
//! first request for a query builds and stores its trace, later requests
//! (from this or any other process sharing the cache) reuse it.
//!
//! ```rust,no_run
//! use proftrace::prelude::*;
//!
//! # async fn run() -> Result<(), SessionError> {
//! let session = TraceSession::open("logs", "plan.json", "cluster.json", SessionOptions::default())?;
//! let view = session.fragment_view(7, 0).await?;
//! println!("{} workers ran fragment 0", view.hierarchy.len());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use proftrace_config::{ClusterConfig, ConfigError, LogFormat, QueryPlan};
use proftrace_core::{FragmentId, QueryId, QueryTrace, TraceError, WorkerId};
use proftrace_engine::{check_fragment, check_worker, TraceBuilder, TraceView};
use proftrace_monitor::{StoreError, TraceStore};
use thiserror::Error;
use tracing::info;

pub mod prelude {
    pub use crate::{SessionError, SessionOptions, TraceSession};
    pub use proftrace_config::{ClusterConfig, LogFormat, OperatorRegistry, QueryPlan};
    pub use proftrace_core::{
        ErrorCategory, FragmentWorkerTrace, OperatorTrace, QueryTrace, StateInterval, StateKind,
        TraceError,
    };
    pub use proftrace_engine::{TraceBuilder, TraceView};
    pub use proftrace_monitor::TraceStore;
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Trace(#[from] TraceError),

    #[error("trace cache: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub log_format: LogFormat,
    /// Cache database; `<log_dir>/proftrace.db` when unset.
    pub store_path: Option<PathBuf>,
}

impl SessionOptions {
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = Some(path.into());
        self
    }
}

pub struct TraceSession {
    builder: TraceBuilder,
    store: TraceStore,
}

impl TraceSession {
    pub fn new(builder: TraceBuilder, store: TraceStore) -> Self {
        Self { builder, store }
    }

    /// Loads the plan and cluster documents and opens the trace cache.
    pub fn open(
        log_dir: impl AsRef<Path>,
        plan_path: impl AsRef<Path>,
        cluster_path: impl AsRef<Path>,
        options: SessionOptions,
    ) -> Result<Self, SessionError> {
        let log_dir = log_dir.as_ref();
        let plan = QueryPlan::load(plan_path.as_ref())?;
        let cluster = ClusterConfig::load(cluster_path.as_ref())?;

        let store = match &options.store_path {
            Some(path) => TraceStore::new(path)?,
            None => TraceStore::open_in(log_dir)?,
        };
        let builder = TraceBuilder::new(log_dir, plan, cluster).with_log_format(options.log_format);

        Ok(Self::new(builder, store))
    }

    pub fn builder(&self) -> &TraceBuilder {
        &self.builder
    }

    pub fn store(&self) -> &TraceStore {
        &self.store
    }

    /// Returns the cached trace of `query_id`, building and caching it first
    /// when absent. A failed build leaves the cache untouched.
    pub async fn trace(&self, query_id: QueryId) -> Result<QueryTrace, SessionError> {
        if let Some(trace) = self.store.get_trace(query_id)? {
            info!(query_id, "Using cached trace");
            return Ok(trace);
        }

        let built = self.builder.build(query_id).await?;
        let (trace, created) = self.store.create_or_attach(query_id, &built)?;
        if !created {
            info!(query_id, "Another build cached this query first");
        }
        Ok(trace)
    }

    /// Operator-level view of one fragment on one worker.
    pub async fn operator_view(
        &self,
        worker_id: WorkerId,
        query_id: QueryId,
        fragment_id: FragmentId,
    ) -> Result<TraceView, SessionError> {
        check_worker(self.builder.cluster(), worker_id)?;
        check_fragment(self.builder.plan(), fragment_id)?;
        let trace = self.trace(query_id).await?;
        Ok(proftrace_engine::operator_view(&trace, worker_id, fragment_id)?)
    }

    /// Fragment-level view across all workers.
    pub async fn fragment_view(
        &self,
        query_id: QueryId,
        fragment_id: FragmentId,
    ) -> Result<TraceView, SessionError> {
        check_fragment(self.builder.plan(), fragment_id)?;
        let trace = self.trace(query_id).await?;
        Ok(proftrace_engine::fragment_view(&trace, fragment_id)?)
    }
}
