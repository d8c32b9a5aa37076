//! Trace reconstruction engine.
//!
//! Turns per-worker profiling logs into a single time-aligned [`QueryTrace`]:
//!
//! - [`LogParser`] — Parses log lines into [`Event`]s
//! - [`FragmentTopology`] — Operator parent/children structure of a fragment
//! - [`FragmentAssembler`] — Builds one fragment's operator tree on one worker
//! - [`unify`] — Rebases all fragment-worker traces onto a global origin
//! - [`TraceBuilder`] — Runs the above in parallel across workers
//! - [`operator_view`] / [`fragment_view`] — Projections for display
//!
//! [`QueryTrace`]: proftrace_core::QueryTrace
//! [`Event`]: proftrace_core::Event

mod assemble;
mod builder;
mod parser;
mod propagate;
mod state;
mod topology;
mod unify;
mod view;

// ─────────────────────────────────────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────────────────────────────────────

pub use parser::{worker_log_path, LogParser, ParseError};

// ─────────────────────────────────────────────────────────────────────────────
// Reconstruction
// ─────────────────────────────────────────────────────────────────────────────

pub use assemble::FragmentAssembler;
pub use builder::{fragments_for, TraceBuilder};
pub use propagate::{locate_root, merge_child_activity, RootAnchor};
pub use state::build_states;
pub use topology::{
    FragmentTopology, OperatorNode, TopologySource, RECOVERY_PRODUCER_PREFIX, TUPLE_SOURCE_PREFIX,
};
pub use unify::unify;

// ─────────────────────────────────────────────────────────────────────────────
// Views
// ─────────────────────────────────────────────────────────────────────────────

pub use view::{check_fragment, check_worker, fragment_view, operator_view, TraceView};
