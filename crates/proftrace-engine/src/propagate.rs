//! Infers blocked/unblocked states on parents from their children's activity.
//!
//! A parent is blocked while a child it pulls from is producing, and resumes
//! when the child yields. Producers never log this themselves, so each child
//! `live` becomes a `wait` on the parent and each child `hang` a `wake`.

use std::collections::BTreeMap;

use proftrace_core::{Activity, ActivityEvent, FragmentId, Nanos, TraceError, WorkerId};

use crate::topology::FragmentTopology;

/// The fragment root and the time span it covers on one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootAnchor {
    pub index: usize,
    pub begin_time: Nanos,
    pub end_time: Nanos,
}

/// Places each operator's native events at its topology index and merges in
/// the events derived from its children. Every returned list is sorted by
/// timestamp; on ties native events come before derived ones.
pub fn merge_child_activity(
    topology: &FragmentTopology,
    native: BTreeMap<String, Vec<ActivityEvent>>,
) -> Result<Vec<Vec<ActivityEvent>>, TraceError> {
    let mut merged = vec![Vec::new(); topology.len()];
    for (name, mut events) in native {
        let idx = topology
            .index_of(&name)
            .ok_or(TraceError::UnknownOperator(name))?;
        events.sort_by_key(|e| e.timestamp);
        merged[idx] = events;
    }

    let mut derived: Vec<Vec<ActivityEvent>> = vec![Vec::new(); topology.len()];
    for (idx, node) in topology.nodes().iter().enumerate() {
        let Some(parent) = node.parent else { continue };
        derived[parent].extend(merged[idx].iter().filter_map(|e| {
            let activity = match e.activity {
                Activity::Live => Activity::Wait,
                Activity::Hang => Activity::Wake,
                _ => return None,
            };
            Some(ActivityEvent { activity, ..*e })
        }));
    }

    for (events, extra) in merged.iter_mut().zip(derived) {
        if extra.is_empty() {
            continue;
        }
        events.extend(extra);
        events.sort_by_key(|e| e.timestamp);
    }

    Ok(merged)
}

/// Finds the single root operator that has events and the span it covers.
pub fn locate_root(
    topology: &FragmentTopology,
    merged: &[Vec<ActivityEvent>],
    fragment_id: FragmentId,
    worker_id: WorkerId,
) -> Result<RootAnchor, TraceError> {
    let roots: Vec<usize> = topology
        .nodes()
        .iter()
        .enumerate()
        .filter(|(idx, node)| node.root && !merged[*idx].is_empty())
        .map(|(idx, _)| idx)
        .collect();

    let &[index] = roots.as_slice() else {
        return Err(TraceError::RootCount {
            fragment_id,
            worker_id,
            found: roots.iter().map(|&i| topology.node(i).name.clone()).collect(),
        });
    };

    let root = topology.node(index);
    if let Some(parent) = root.parent {
        return Err(TraceError::RootHasParent {
            root: root.name.clone(),
            parent: topology.node(parent).name.clone(),
        });
    }

    let events = &merged[index];
    Ok(RootAnchor {
        index,
        begin_time: events[0].timestamp,
        end_time: events[events.len() - 1].timestamp,
    })
}
