use std::fs;
use std::path::Path;

use proftrace::prelude::*;
use proftrace_engine::worker_log_path;
use tempfile::TempDir;

const PLAN: &str = r#"{"fragments": [{"operators": [
    {"opName": "scan", "opType": "TableScan"},
    {"opName": "collect", "opType": "CollectProducer", "argChild": "scan"}
]}]}"#;

const CLUSTER: &str = r#"{"workers": ["localhost:9001", {"host": "localhost", "port": 9002}]}"#;

fn log(start_ms: i64, live: i64, hang: i64) -> String {
    format!(
        "[query_id#5][startTimeInMS@0][{start_ms}][0]:set time\n\
         [query_id#5][startTimeInNS@0][0][0]:set time\n\
         [query_id#5][scan@0][{live}][1]:live\n\
         [query_id#5][scan@0][{hang}][1]:hang\n"
    )
}

fn setup(dir: &Path) {
    fs::write(dir.join("plan.json"), PLAN).unwrap();
    fs::write(dir.join("cluster.json"), CLUSTER).unwrap();
    fs::write(worker_log_path(dir, 1), log(10, 100, 150)).unwrap();
    fs::write(worker_log_path(dir, 2), log(10, 120, 200)).unwrap();
}

fn open(dir: &Path) -> TraceSession {
    TraceSession::open(
        dir,
        dir.join("plan.json"),
        dir.join("cluster.json"),
        SessionOptions::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_trace_is_built_once_then_served_from_cache() {
    let dir = TempDir::new().unwrap();
    setup(dir.path());

    let session = open(dir.path());
    let first = session.trace(5).await.unwrap();
    assert_eq!(first.fragments.len(), 2);
    assert_eq!(first.end, 100);

    // logs vanish; the cached trace still answers
    fs::remove_file(worker_log_path(dir.path(), 2)).unwrap();
    let again = open(dir.path()).trace(5).await.unwrap();
    assert_eq!(again, first);
}

#[tokio::test]
async fn test_failed_build_caches_nothing() {
    let dir = TempDir::new().unwrap();
    setup(dir.path());
    fs::remove_file(worker_log_path(dir.path(), 2)).unwrap();

    let session = open(dir.path());
    let err = session.trace(5).await.unwrap_err();
    assert!(matches!(err, SessionError::Trace(ref e) if e.category() == ErrorCategory::Io));
    assert!(session.store().get_trace(5).unwrap().is_none());
}

#[tokio::test]
async fn test_views_check_ids_before_reading_logs() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("plan.json"), PLAN).unwrap();
    fs::write(dir.path().join("cluster.json"), CLUSTER).unwrap();

    let session = open(dir.path());
    let err = session.operator_view(3, 5, 0).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Trace(TraceError::WorkerOutOfRange { worker_id: 3, workers: 2 })
    ));

    let err = session.fragment_view(5, 1).await.unwrap_err();
    assert!(matches!(err, SessionError::Trace(TraceError::FragmentOutOfRange { .. })));
}

#[tokio::test]
async fn test_operator_and_fragment_views() {
    let dir = TempDir::new().unwrap();
    setup(dir.path());
    let session = TraceSession::open(
        dir.path(),
        dir.path().join("plan.json"),
        dir.path().join("cluster.json"),
        SessionOptions::default()
            .with_log_format(LogFormat::Pooled)
            .with_store_path(dir.path().join("elsewhere.db")),
    )
    .unwrap();

    let view = session.operator_view(2, 5, 0).await.unwrap();
    assert_eq!((view.begin, view.end), (20, 100));
    assert_eq!(view.hierarchy[0].root.children[0].name, "scan");

    let view = session.fragment_view(5, 0).await.unwrap();
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["hierarchy"][1]["name"], "collect @ worker 2");
    assert!(dir.path().join("elsewhere.db").exists());
    assert!(!dir.path().join("proftrace.db").exists());
}
