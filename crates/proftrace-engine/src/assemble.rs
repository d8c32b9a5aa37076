//! Assembles the operator tree of one fragment on one worker.

use std::collections::BTreeMap;

use proftrace_config::{OperatorRegistry, QueryPlan};
use proftrace_core::{
    ActivityEvent, Event, FragmentId, FragmentWorkerTrace, Message, Nanos, OperatorTrace,
    TraceError, WorkerId,
};
use tracing::debug;

use crate::propagate::{locate_root, merge_child_activity};
use crate::state::build_states;
use crate::topology::{FragmentTopology, TopologySource};

const NANOS_PER_MILLI: Nanos = 1_000_000;

pub struct FragmentAssembler<'a> {
    plan: &'a QueryPlan,
    registry: &'a OperatorRegistry,
}

impl<'a> FragmentAssembler<'a> {
    pub fn new(plan: &'a QueryPlan, registry: &'a OperatorRegistry) -> Self {
        Self { plan, registry }
    }

    /// Builds the trace of `fragment_id` from one worker's events for a query.
    ///
    /// The tree's intervals are relative to the root's first event; the
    /// absolute origin places that instant on the epoch clock using the
    /// fragment's `startTimeInMS`/`startTimeInNS` markers.
    pub fn assemble(
        &self,
        events: &[Event],
        worker_id: WorkerId,
        fragment_id: FragmentId,
    ) -> Result<FragmentWorkerTrace, TraceError> {
        let fragment_events: Vec<&Event> = events
            .iter()
            .filter(|e| e.fragment_id == fragment_id)
            .collect();

        let start_ms = marker(&fragment_events, Message::StartTimeInMs).ok_or(
            TraceError::MissingStartTime {
                marker: "startTimeInMS",
                fragment_id,
                worker_id,
            },
        )?;
        let start_ns = marker(&fragment_events, Message::StartTimeInNs).ok_or(
            TraceError::MissingStartTime {
                marker: "startTimeInNS",
                fragment_id,
                worker_id,
            },
        )?;

        let mut native: BTreeMap<String, Vec<ActivityEvent>> = BTreeMap::new();
        for event in &fragment_events {
            if let Some(activity) = event.activity() {
                native.entry(event.operator.clone()).or_default().push(activity);
            }
        }
        if native.is_empty() {
            return Err(TraceError::NoFragmentActivity {
                fragment_id,
                worker_id,
            });
        }

        let source = TopologySource::resolve(self.plan, fragment_id)?;
        let topology =
            FragmentTopology::build(&source, self.registry, native.keys().map(String::as_str))?;
        let merged = merge_child_activity(&topology, native)?;
        let anchor = locate_root(&topology, &merged, fragment_id, worker_id)?;

        let absolute_origin = start_ms
            .checked_mul(NANOS_PER_MILLI)
            .zip(anchor.begin_time.checked_sub(start_ns))
            .and_then(|(epoch_ns, elapsed)| epoch_ns.checked_add(elapsed))
            .ok_or(TraceError::StartTimeOverflow {
                fragment_id,
                worker_id,
            })?;

        let root = build_tree(&topology, &merged, anchor.index, anchor.begin_time);

        debug!(
            worker_id,
            fragment_id,
            root = %root.name,
            operators = root.node_count(),
            span_ns = anchor.end_time - anchor.begin_time,
            "Assembled fragment trace"
        );

        Ok(FragmentWorkerTrace {
            root,
            absolute_origin,
            fragment_index: fragment_id,
            worker_id,
            begin: 0,
            end: anchor.end_time - anchor.begin_time,
        })
    }
}

fn marker(events: &[&Event], message: Message) -> Option<Nanos> {
    events
        .iter()
        .find(|e| e.message == message)
        .map(|e| e.timestamp)
}

fn build_tree(
    topology: &FragmentTopology,
    merged: &[Vec<ActivityEvent>],
    idx: usize,
    origin: Nanos,
) -> OperatorTrace {
    let node = topology.node(idx);
    OperatorTrace {
        kind: node.kind.clone(),
        name: node.name.clone(),
        states: build_states(&merged[idx], origin),
        children: node
            .children
            .iter()
            .map(|&child| build_tree(topology, merged, child, origin))
            .collect(),
    }
}
