//! Rebases fragment-worker traces onto one query-wide timeline.

use proftrace_core::{FragmentWorkerTrace, QueryTrace};

/// Shifts every trace by the distance of its absolute origin from the
/// earliest one, so relative time 0 is the start of the first fragment to run
/// anywhere in the cluster.
pub fn unify(mut traces: Vec<FragmentWorkerTrace>) -> QueryTrace {
    let origin = traces
        .iter()
        .map(|t| t.absolute_origin)
        .min()
        .unwrap_or_default();

    for trace in &mut traces {
        trace.shift(trace.absolute_origin - origin);
    }

    QueryTrace {
        origin,
        begin: 0,
        end: traces.iter().map(|t| t.end).max().unwrap_or_default(),
        fragments: traces,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proftrace_core::{OperatorTrace, StateInterval, StateKind};

    fn trace(worker_id: i64, absolute_origin: i64, end: i64) -> FragmentWorkerTrace {
        let mut scan = OperatorTrace::new("TableScan", "scan");
        scan.states.push(StateInterval::new(0, end, StateKind::Compute));
        let mut root = OperatorTrace::new("SinkRoot", "sink");
        root.states.push(StateInterval::new(0, end, StateKind::Wait));
        root.children.push(scan);

        FragmentWorkerTrace {
            root,
            absolute_origin,
            fragment_index: 0,
            worker_id,
            begin: 0,
            end,
        }
    }

    #[test]
    fn test_later_trace_is_shifted_by_origin_gap() {
        let query = unify(vec![trace(1, 1000, 200), trace(2, 1500, 100)]);

        assert_eq!(query.origin, 1000);
        assert_eq!(query.begin, 0);

        let first = &query.fragments[0];
        assert_eq!((first.begin, first.end), (0, 200));
        assert_eq!(first.root.states[0], StateInterval::new(0, 200, StateKind::Wait));

        let second = &query.fragments[1];
        assert_eq!((second.begin, second.end), (500, 600));
        assert_eq!(second.root.states[0].begin, 500);
        assert_eq!(second.root.children[0].states[0].end, 600);

        assert_eq!(query.end, 600);
    }

    #[test]
    fn test_earliest_trace_is_untouched() {
        let original = trace(1, 42, 10);
        let query = unify(vec![original.clone()]);
        assert_eq!(query.fragments[0], original);
        assert_eq!(query.origin, 42);
        assert_eq!(query.end, 10);
    }

    #[test]
    fn test_no_traces() {
        let query = unify(Vec::new());
        assert_eq!((query.begin, query.end), (0, 0));
        assert!(query.fragments.is_empty());
    }
}
