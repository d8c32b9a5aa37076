//! Cluster deployment document.

use std::fs;
use std::path::Path;

use proftrace_core::WorkerId;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// A worker entry, either `"host:port"` or an object with host details.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerEntry {
    Address(String),
    Node {
        host: String,
        #[serde(default)]
        port: Option<u16>,
    },
}

impl WorkerEntry {
    pub fn host(&self) -> &str {
        match self {
            WorkerEntry::Address(addr) => addr.split(':').next().unwrap_or(addr),
            WorkerEntry::Node { host, .. } => host,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub workers: Vec<WorkerEntry>,
}

impl ClusterConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Creates a cluster of `n` local workers.
    pub fn local(n: usize) -> Self {
        Self {
            workers: (0..n)
                .map(|i| WorkerEntry::Address(format!("localhost:{}", 9001 + i)))
                .collect(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Worker ids, numbered from 1.
    pub fn worker_ids(&self) -> impl Iterator<Item = WorkerId> {
        1..=self.workers.len() as WorkerId
    }

    pub fn contains(&self, worker_id: WorkerId) -> bool {
        worker_id >= 1 && worker_id <= self.workers.len() as WorkerId
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_worker_entries() {
        let cluster = ClusterConfig::from_json(
            r#"{"workers": ["node1:9001", {"host": "node2", "port": 9002}, {"host": "node3"}]}"#,
        )
        .unwrap();

        assert_eq!(cluster.worker_count(), 3);
        assert_eq!(cluster.workers[0].host(), "node1");
        assert_eq!(cluster.workers[1].host(), "node2");
        assert_eq!(cluster.worker_ids().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn test_worker_ids_are_one_based() {
        let cluster = ClusterConfig::local(2);
        assert!(!cluster.contains(0));
        assert!(cluster.contains(1));
        assert!(cluster.contains(2));
        assert!(!cluster.contains(3));
    }

    #[test]
    fn test_missing_workers_field_is_parse_error() {
        assert!(matches!(
            ClusterConfig::from_json(r#"{"master": "node0"}"#),
            Err(ConfigError::Parse(_))
        ));
    }
}
