use std::fs;
use std::path::Path;

use proftrace_config::{ClusterConfig, LogFormat, QueryPlan};
use proftrace_core::{ErrorCategory, StateKind, TraceError};
use proftrace_engine::{fragment_view, operator_view, worker_log_path, TraceBuilder};
use tempfile::TempDir;

const PLAN: &str = r#"{
  "fragments": [
    {
      "operators": [
        {"opName": "scan", "opType": "TableScan", "relationKey": {"relationName": "R"}},
        {"opName": "shuffle", "opType": "ShuffleProducer", "argChild": "scan"}
      ]
    },
    {
      "operators": [
        {"opName": "gather", "opType": "ShuffleConsumer"},
        {"opName": "sink", "opType": "SinkRoot", "argChild": "gather"}
      ],
      "workers": [1]
    }
  ]
}"#;

const WORKER_1: &str = "\
INFO  worker 1 started
12:00:00.001 INFO ProfilingLogger - [query_id#7][startTimeInMS@0][1000][0]:set time
12:00:00.001 INFO ProfilingLogger - [query_id#7][startTimeInNS@0][0][0]:set time
12:00:00.002 INFO ProfilingLogger - [query_id#7][scan@0][100][1]:live
12:00:00.002 INFO ProfilingLogger - [query_id#7][scan@0][150][3]:hang
12:00:00.002 INFO ProfilingLogger - [query_id#7][startTimeInMS@1][1000][0]:set time
12:00:00.002 INFO ProfilingLogger - [query_id#7][startTimeInNS@1][0][0]:set time
12:00:00.003 INFO ProfilingLogger - [query_id#7][gather@1][200][2]:live
12:00:00.003 INFO ProfilingLogger - [query_id#7][gather@1][400][2]:hang
12:00:00.004 INFO ProfilingLogger - [query_id#8][scan@0][10][1]:live
";

const WORKER_2: &str = "\
[query_id#7][startTimeInMS@0][1000][0]:set time
[query_id#7][startTimeInNS@0][0][0]:set time
connection reset by peer
[query_id#7][scan@0][300][1]:live
[query_id#7][scan@0][360][1]:hang
";

fn write_logs(dir: &Path, logs: &[(i64, &str)]) {
    for (worker_id, content) in logs {
        fs::write(worker_log_path(dir, *worker_id), content).unwrap();
    }
}

fn builder(dir: &Path) -> TraceBuilder {
    TraceBuilder::new(dir, QueryPlan::from_json(PLAN).unwrap(), ClusterConfig::local(2))
}

#[tokio::test]
async fn test_build_unifies_all_workers() {
    let dir = TempDir::new().unwrap();
    write_logs(dir.path(), &[(1, WORKER_1), (2, WORKER_2)]);

    let trace = builder(dir.path()).build(7).await.unwrap();

    assert_eq!(trace.origin, 1_000_000_000 + 100);
    assert_eq!(trace.begin, 0);
    assert_eq!(trace.end, 300);

    let spans: Vec<_> = trace
        .fragments
        .iter()
        .map(|t| (t.worker_id, t.fragment_index, t.begin, t.end))
        .collect();
    assert_eq!(spans, vec![(1, 0, 0, 50), (1, 1, 100, 300), (2, 0, 200, 260)]);

    let scan = trace.fragments[0].root.find("scan").unwrap();
    assert_eq!(scan.states.len(), 1);
    assert_eq!(scan.states[0].kind, StateKind::Compute);
    assert_eq!(scan.states[0].slot, Some(3));

    let shuffle = &trace.fragments[2].root;
    assert_eq!(shuffle.states[0].kind, StateKind::Wait);
    assert_eq!((shuffle.states[0].begin, shuffle.states[0].end), (200, 260));
}

#[tokio::test]
async fn test_views_over_built_trace() {
    let dir = TempDir::new().unwrap();
    write_logs(dir.path(), &[(1, WORKER_1), (2, WORKER_2)]);
    let trace = builder(dir.path()).build(7).await.unwrap();

    let view = fragment_view(&trace, 0).unwrap();
    assert_eq!((view.begin, view.end), (0, 260));
    assert_eq!(view.hierarchy[0].root.name, "shuffle @ worker 1");
    assert_eq!(view.hierarchy[1].root.name, "shuffle @ worker 2");

    let view = operator_view(&trace, 1, 1).unwrap();
    assert_eq!(view.hierarchy[0].root.children[0].name, "gather");

    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["hierarchy"][0]["type"], "SinkRoot");
    assert_eq!(json["hierarchy"][0]["children"][0]["states"][0]["name"], 0);
}

#[tokio::test]
async fn test_missing_worker_log_is_io_error() {
    let dir = TempDir::new().unwrap();
    write_logs(dir.path(), &[(1, WORKER_1)]);

    let err = builder(dir.path()).build(7).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Io);
}

#[tokio::test]
async fn test_unknown_query_fails_without_trace() {
    let dir = TempDir::new().unwrap();
    write_logs(dir.path(), &[(1, WORKER_1), (2, WORKER_2)]);

    let err = builder(dir.path()).build(99).await.unwrap_err();
    assert!(matches!(err, TraceError::NoEvents { query_id: 99, .. }));
}

#[tokio::test]
async fn test_legacy_logs_with_recovery_fragment() {
    let dir = TempDir::new().unwrap();
    let worker_1 = "\
[query_id#3][startTimeInMS@0][5][0]:set time
[query_id#3][startTimeInNS@0][0][0]:set time
[query_id#3][scan@0][10]:live
[query_id#3][scan@0][20]:hang
[query_id#3][startTimeInMS@1][5][0]:set time
[query_id#3][startTimeInNS@1][0][0]:set time
[query_id#3][sink@1][12]:live
[query_id#3][sink@1][30]:hang
[query_id#3][startTimeInMS@-1][5][0]:set time
[query_id#3][startTimeInNS@-1][0][0]:set time
[query_id#3][recProducer_for_scan@-1][40]:live
[query_id#3][tupleSource_for_scan@-1][41]:live
[query_id#3][tupleSource_for_scan@-1][45]:hang
[query_id#3][recProducer_for_scan@-1][50]:hang
";
    let worker_2 = "\
[query_id#3][startTimeInMS@0][5][0]:set time
[query_id#3][startTimeInNS@0][0][0]:set time
[query_id#3][scan@0][10]:live
[query_id#3][scan@0][15]:hang
";
    write_logs(dir.path(), &[(1, worker_1), (2, worker_2)]);

    // markers keep the pooled shape; auto detection handles mixed lines
    let trace = builder(dir.path()).build(3).await.unwrap();
    let recovery = trace
        .fragments
        .iter()
        .find(|t| t.fragment_index == -1)
        .unwrap();
    assert_eq!(recovery.worker_id, 1);
    assert_eq!(recovery.root.name, "recProducer_for_scan");
    assert_eq!(recovery.root.children[0].name, "tupleSource_for_scan");
    assert_eq!(recovery.begin, 30);

    // a strict legacy parser drops the pooled markers
    let err = builder(dir.path())
        .with_log_format(LogFormat::Legacy)
        .build(3)
        .await
        .unwrap_err();
    assert!(matches!(err, TraceError::MissingStartTime { .. }));
}
