//! Configuration documents consumed by proftrace.
//!
//! - [`QueryPlan`] — the JSON query plan whose fragments declare operators and their children
//! - [`ClusterConfig`] — the deployment document that bounds valid worker ids
//! - [`OperatorRegistry`] — which operator kinds have children, and which are fragment roots
//! - [`LogFormat`] — which profiling log grammar to accept

mod cluster;
mod plan;
mod registry;

pub use cluster::{ClusterConfig, WorkerEntry};
pub use plan::{FragmentPlan, OperatorSpec, QueryPlan, WorkerRef};
pub use registry::{
    Arity, ChildList, KindSpec, OperatorRegistry, RECOVER_PRODUCER_KIND, TUPLE_SOURCE_KIND,
};

use std::fmt;
use std::str::FromStr;

// ─────────────────────────────────────────────────────────────────────────────
// Error
// ─────────────────────────────────────────────────────────────────────────────

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate operator name in query plan: {0}")]
    DuplicateOperator(String),

    #[error("Unknown log format: {0} (expected auto, legacy or pooled)")]
    UnknownLogFormat(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Log Format
// ─────────────────────────────────────────────────────────────────────────────

/// Profiling log line grammar.
///
/// Two generations of workers exist: the legacy one writes
/// `[query_id#Q][op@frag][time]:message`, the pooled one adds the thread pool
/// slot as `[query_id#Q][op@frag][time][slot]:message`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Accept either grammar, line by line.
    #[default]
    Auto,
    Legacy,
    Pooled,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Auto => "auto",
            LogFormat::Legacy => "legacy",
            LogFormat::Pooled => "pooled",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(LogFormat::Auto),
            "legacy" | "v1" => Ok(LogFormat::Legacy),
            "pooled" | "v2" => Ok(LogFormat::Pooled),
            other => Err(ConfigError::UnknownLogFormat(other.to_string())),
        }
    }
}
