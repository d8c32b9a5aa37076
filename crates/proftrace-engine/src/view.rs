//! Projections of a unified query trace for display.

use proftrace_config::{ClusterConfig, QueryPlan};
use proftrace_core::{FragmentId, FragmentWorkerTrace, Nanos, QueryTrace, TraceError, WorkerId};
use serde::{Deserialize, Serialize};

/// A slice of a query trace in the viewer's `{begin, end, hierarchy}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceView {
    pub begin: Nanos,
    pub end: Nanos,
    pub hierarchy: Vec<FragmentWorkerTrace>,
}

impl TraceView {
    fn span(hierarchy: Vec<FragmentWorkerTrace>, what: String) -> Result<Self, TraceError> {
        let (Some(begin), Some(end)) = (
            hierarchy.iter().map(|t| t.begin).min(),
            hierarchy.iter().map(|t| t.end).max(),
        ) else {
            return Err(TraceError::EmptyView(what));
        };
        Ok(Self {
            begin,
            end,
            hierarchy,
        })
    }
}

pub fn check_worker(cluster: &ClusterConfig, worker_id: WorkerId) -> Result<(), TraceError> {
    if cluster.contains(worker_id) {
        return Ok(());
    }
    Err(TraceError::WorkerOutOfRange {
        worker_id,
        workers: cluster.worker_count(),
    })
}

/// Negative ids pass: they address recovery fragments, which the plan does not list.
pub fn check_fragment(plan: &QueryPlan, fragment_id: FragmentId) -> Result<(), TraceError> {
    let fragments = plan.fragment_count();
    if fragment_id >= fragments as FragmentId {
        return Err(TraceError::FragmentOutOfRange {
            fragment_id,
            fragments,
        });
    }
    Ok(())
}

/// The full operator tree of one fragment on one worker.
pub fn operator_view(
    trace: &QueryTrace,
    worker_id: WorkerId,
    fragment_id: FragmentId,
) -> Result<TraceView, TraceError> {
    let hierarchy = trace
        .fragments
        .iter()
        .filter(|t| t.worker_id == worker_id && t.fragment_index == fragment_id)
        .cloned()
        .collect();
    TraceView::span(
        hierarchy,
        format!("fragment {} on worker {}", fragment_id, worker_id),
    )
}

/// One root row per worker for a fragment, ordered by worker id.
pub fn fragment_view(trace: &QueryTrace, fragment_id: FragmentId) -> Result<TraceView, TraceError> {
    let mut hierarchy: Vec<FragmentWorkerTrace> = trace
        .fragments
        .iter()
        .filter(|t| t.fragment_index == fragment_id)
        .cloned()
        .collect();
    hierarchy.sort_by_key(|t| t.worker_id);

    for t in &mut hierarchy {
        t.root.children.clear();
        t.root.name = format!("{} @ worker {}", t.root.name, t.worker_id);
    }

    TraceView::span(hierarchy, format!("fragment {}", fragment_id))
}
