mod invocation;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use proftrace::prelude::*;
use tracing::info;

use invocation::{usage, Invocation, InvocationError, View};

#[derive(Parser)]
#[command(name = "proftrace")]
#[command(about = "Reconstructs operator execution traces from worker profiling logs", long_about = None)]
struct Cli {
    /// <log_dir> [worker_id] <query_id> <fragment_id> <plan> <config>
    #[arg(allow_negative_numbers = true)]
    args: Vec<String>,

    /// Profiling log grammar: auto, legacy or pooled
    #[arg(long, env = "PROFTRACE_LOG_FORMAT", default_value = "auto")]
    log_format: LogFormat,

    /// Trace cache database (default: <log_dir>/proftrace.db)
    #[arg(long, env = "PROFTRACE_STORE")]
    store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let invocation = match Invocation::from_args(&cli.args) {
        Ok(invocation) => invocation,
        Err(InvocationError::Arity(_)) => {
            let program = std::env::args().next().unwrap_or_else(|| "proftrace".into());
            eprint!("{}", usage(&program));
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    // a malformed invocation must not read any file, `.env` included; the
    // second parse picks up flag fallbacks that `.env` defines
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // stdout carries the view; logs go to stderr
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let mut options = SessionOptions::default().with_log_format(cli.log_format);
    if let Some(path) = cli.store {
        options = options.with_store_path(path);
    }

    let session = TraceSession::open(
        &invocation.log_dir,
        &invocation.plan_path,
        &invocation.cluster_path,
        options,
    )
    .with_context(|| format!("failed to open trace session for {}", invocation.log_dir.display()))?;

    let view = match invocation.view {
        View::Operator {
            worker_id,
            fragment_id,
        } => {
            info!(worker_id, query_id = invocation.query_id, fragment_id, "Operator view");
            session
                .operator_view(worker_id, invocation.query_id, fragment_id)
                .await?
        }
        View::Fragment { fragment_id } => {
            info!(query_id = invocation.query_id, fragment_id, "Fragment view");
            session.fragment_view(invocation.query_id, fragment_id).await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
