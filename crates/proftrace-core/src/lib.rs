//! Core domain types and error definitions for proftrace.
//!
//! This crate provides the types shared across the proftrace workspace:
//!
//! - [`TraceError`] — Error type for trace reconstruction
//! - [`Event`], [`Message`] and [`Activity`] — Parsed profiling log events
//! - [`OperatorTrace`], [`FragmentWorkerTrace`] and [`QueryTrace`] — The reconstructed trace tree
//!
//! # Example
//!
//! ```rust
//! use proftrace_core::{OperatorTrace, StateInterval, StateKind};
//!
//! let mut scan = OperatorTrace::new("TableScan", "ScanR");
//! scan.states.push(StateInterval::new(0, 50, StateKind::Compute).with_slot(Some(3)));
//! scan.shift(500);
//!
//! assert_eq!(scan.states[0].begin, 500);
//! assert_eq!(scan.states[0].end, 550);
//! ```

mod trace;

pub use trace::{FragmentWorkerTrace, OperatorTrace, QueryTrace, StateInterval, StateKind};

use thiserror::Error;

/// Nanosecond timestamp or duration. Signed so that rebase deltas compose exactly.
pub type Nanos = i64;

/// Query identifier as written in the profiling log.
pub type QueryId = i64;

/// Fragment index within a query plan. Negative values denote recovery pseudo-fragments.
pub type FragmentId = i64;

/// Worker identifier, numbered from 1.
pub type WorkerId = i64;

/// Broad class of a [`TraceError`], mirroring how callers react to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A worker or fragment id outside the declared range.
    Config,
    /// Requested events or markers are absent from the logs.
    DataNotFound,
    /// Plan and logs disagree about the operator structure.
    Consistency,
    /// Reading log files failed.
    Io,
    /// A background task failed to complete.
    Internal,
}

/// Errors that can occur while reconstructing a query trace.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("worker_id {worker_id} is beyond range (cluster has {workers} workers)")]
    WorkerOutOfRange { worker_id: WorkerId, workers: usize },

    #[error("invalid fragment_id {fragment_id} (plan has {fragments} fragments)")]
    FragmentOutOfRange {
        fragment_id: FragmentId,
        fragments: usize,
    },

    #[error("cannot find information of query {query_id} on worker {worker_id}")]
    NoEvents {
        query_id: QueryId,
        worker_id: WorkerId,
    },

    #[error("missing {marker} marker for fragment {fragment_id} on worker {worker_id}")]
    MissingStartTime {
        marker: &'static str,
        fragment_id: FragmentId,
        worker_id: WorkerId,
    },

    #[error("cannot get profiling information of fragment {fragment_id} on worker {worker_id}")]
    NoFragmentActivity {
        fragment_id: FragmentId,
        worker_id: WorkerId,
    },

    #[error("start time markers of fragment {fragment_id} on worker {worker_id} overflow the nanosecond clock")]
    StartTimeOverflow {
        fragment_id: FragmentId,
        worker_id: WorkerId,
    },

    #[error("no trace data for {0}")]
    EmptyView(String),

    #[error("operator {child} is declared as a child of both {first} and {second}")]
    DuplicateParent {
        child: String,
        first: String,
        second: String,
    },

    #[error("operator {0} has no kind mapping in the query plan")]
    UnknownOperator(String),

    #[error("operator {operator} has unregistered kind {kind}")]
    UnknownKind { operator: String, kind: String },

    #[error("operator {operator} ({kind}) has a missing or malformed child field {field}")]
    MissingChildField {
        operator: String,
        kind: String,
        field: String,
    },

    #[error("expected exactly one root operator in fragment {fragment_id} on worker {worker_id}, found {found:?}")]
    RootCount {
        fragment_id: FragmentId,
        worker_id: WorkerId,
        found: Vec<String>,
    },

    #[error("root operator {root} is declared as a child of {parent}")]
    RootHasParent { root: String, parent: String },

    #[error("recovery fragment needs exactly one operator prefixed {prefix}, found {found}")]
    MissingRecoveryOperator { prefix: &'static str, found: usize },

    #[error("failed to read profiling log: {0}")]
    Io(#[from] std::io::Error),

    #[error("trace task failed: {0}")]
    Task(String),
}

impl TraceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TraceError::WorkerOutOfRange { .. } | TraceError::FragmentOutOfRange { .. } => {
                ErrorCategory::Config
            }
            TraceError::NoEvents { .. }
            | TraceError::MissingStartTime { .. }
            | TraceError::NoFragmentActivity { .. }
            | TraceError::EmptyView(_) => ErrorCategory::DataNotFound,
            TraceError::DuplicateParent { .. }
            | TraceError::UnknownOperator(_)
            | TraceError::UnknownKind { .. }
            | TraceError::MissingChildField { .. }
            | TraceError::RootCount { .. }
            | TraceError::RootHasParent { .. }
            | TraceError::MissingRecoveryOperator { .. }
            | TraceError::StartTimeOverflow { .. } => ErrorCategory::Consistency,
            TraceError::Io(_) => ErrorCategory::Io,
            TraceError::Task(_) => ErrorCategory::Internal,
        }
    }
}

/// Operator activity reported in a profiling log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Activity {
    /// The operator started producing.
    Live,
    /// The operator yielded its thread.
    Hang,
    /// The operator is blocked on a child (derived, never logged by producers).
    Wait,
    /// The operator was unblocked by a child (derived).
    Wake,
}

impl Activity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activity::Live => "live",
            Activity::Hang => "hang",
            Activity::Wait => "wait",
            Activity::Wake => "wake",
        }
    }
}

/// The message part of a profiling log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Message {
    Activity(Activity),
    /// Clock bookkeeping line; carries no operator state.
    SetTime,
    /// Fragment start in epoch milliseconds.
    StartTimeInMs,
    /// Fragment start on the worker's monotonic nanosecond clock.
    StartTimeInNs,
}

/// A single parsed profiling log line. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub operator: String,
    pub query_id: QueryId,
    pub fragment_id: FragmentId,
    /// Thread pool slot, when the log grammar carries one.
    pub slot: Option<i32>,
    pub timestamp: Nanos,
    pub message: Message,
}

impl Event {
    /// Returns the activity view of this event, or `None` for timing markers.
    pub fn activity(&self) -> Option<ActivityEvent> {
        match self.message {
            Message::Activity(activity) => Some(ActivityEvent {
                timestamp: self.timestamp,
                activity,
                slot: self.slot,
            }),
            _ => None,
        }
    }
}

/// The part of an [`Event`] that drives state building for one operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityEvent {
    pub timestamp: Nanos,
    pub activity: Activity,
    pub slot: Option<i32>,
}

impl ActivityEvent {
    pub fn new(timestamp: Nanos, activity: Activity) -> Self {
        Self {
            timestamp,
            activity,
            slot: None,
        }
    }

    pub fn with_slot(mut self, slot: i32) -> Self {
        self.slot = Some(slot);
        self
    }
}
