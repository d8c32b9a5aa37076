//! Persistent cache of reconstructed query traces.

mod record;
mod store;

pub use record::{TraceQuery, TraceSummary};
pub use store::{StoreError, TraceStore, DEFAULT_STORE_FILE};
