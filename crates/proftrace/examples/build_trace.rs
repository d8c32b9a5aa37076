//! Builds (or loads from cache) the trace of a query and prints a summary.
//!
//! Run with: cargo run --example build_trace -- <log_dir> <query_id> <plan.json> <cluster.json>

use std::env;

use proftrace::prelude::*;

fn print_tree(op: &OperatorTrace, depth: usize) {
    let busy: i64 = op
        .states
        .iter()
        .filter(|s| s.kind == StateKind::Compute)
        .map(|s| s.duration())
        .sum();
    println!("{}{} ({}) computing {} ns", "  ".repeat(depth), op.name, op.kind, busy);
    for child in &op.children {
        print_tree(child, depth + 1);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    let [log_dir, query_id, plan, cluster] = args.as_slice() else {
        eprintln!("usage: build_trace <log_dir> <query_id> <plan.json> <cluster.json>");
        std::process::exit(1);
    };

    let session = TraceSession::open(log_dir, plan, cluster, SessionOptions::default())?;
    let trace = session.trace(query_id.parse()?).await?;

    println!("query spans {} ns", trace.end);
    for fragment in &trace.fragments {
        println!(
            "\nfragment {} on worker {} [{}, {}]",
            fragment.fragment_index, fragment.worker_id, fragment.begin, fragment.end
        );
        print_tree(&fragment.root, 1);
    }

    Ok(())
}
