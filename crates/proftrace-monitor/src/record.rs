//! Row types for the trace cache.

use proftrace_core::{Nanos, QueryId};
use serde::{Deserialize, Serialize};

/// Metadata of a cached query trace, without the trace body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSummary {
    pub query_id: QueryId,
    /// Identifies the build that produced the stored row.
    pub build_id: String,
    /// Unix timestamp (milliseconds) when the row was written.
    pub created_at: i64,
    /// Number of fragment-worker traces in the hierarchy.
    pub fragment_count: u32,
    /// Query span on the unified timeline.
    pub end_ns: Nanos,
}

/// Query parameters for listing cached traces.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceQuery {
    /// Maximum number of summaries to return.
    pub limit: Option<u32>,
    /// Offset for pagination.
    pub offset: Option<u32>,
}

impl TraceQuery {
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}
