//! Positional argument dispatch.
//!
//! The view is chosen by how many positional arguments are given: five
//! select the fragment view, six (with a worker id after the log directory)
//! the operator view.

use std::path::PathBuf;

use proftrace_core::{FragmentId, QueryId, WorkerId};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InvocationError {
    #[error("expected 5 or 6 arguments, got {0}")]
    Arity(usize),

    #[error("{name} must be an integer, got {value:?}")]
    NotAnId { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// One fragment on one worker, full operator tree.
    Operator {
        worker_id: WorkerId,
        fragment_id: FragmentId,
    },
    /// One fragment across all workers, root rows only.
    Fragment { fragment_id: FragmentId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub log_dir: PathBuf,
    pub query_id: QueryId,
    pub view: View,
    pub plan_path: PathBuf,
    pub cluster_path: PathBuf,
}

impl Invocation {
    pub fn from_args(args: &[String]) -> Result<Self, InvocationError> {
        match args {
            [log_dir, query_id, fragment_id, plan, cluster] => Ok(Self {
                log_dir: log_dir.into(),
                query_id: id("query_id", query_id)?,
                view: View::Fragment {
                    fragment_id: id("fragment_id", fragment_id)?,
                },
                plan_path: plan.into(),
                cluster_path: cluster.into(),
            }),
            [log_dir, worker_id, query_id, fragment_id, plan, cluster] => Ok(Self {
                log_dir: log_dir.into(),
                query_id: id("query_id", query_id)?,
                view: View::Operator {
                    worker_id: id("worker_id", worker_id)?,
                    fragment_id: id("fragment_id", fragment_id)?,
                },
                plan_path: plan.into(),
                cluster_path: cluster.into(),
            }),
            _ => Err(InvocationError::Arity(args.len())),
        }
    }
}

fn id(name: &'static str, value: &str) -> Result<i64, InvocationError> {
    value.trim().parse().map_err(|_| InvocationError::NotAnId {
        name,
        value: value.to_string(),
    })
}

pub fn usage(program: &str) -> String {
    format!(
        "Usage: {program} <log_files_directory> <worker_id> <query_id> <fragment_id> <query_plan_file> <config_file>\n\
         \x20  or: {program} <log_files_directory> <query_id> <fragment_id> <query_plan_file> <config_file>\n\
         \n\
         \x20      log_files_directory  directory holding worker_<id>_profile files\n\
         \x20      worker_id            worker to show, numbered from 1 (operator view)\n\
         \x20      query_id             query to reconstruct\n\
         \x20      fragment_id          plan fragment; negative for recovery fragments\n\
         \x20      query_plan_file      JSON query plan\n\
         \x20      config_file          JSON cluster configuration\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_five_arguments_select_fragment_view() {
        let inv = Invocation::from_args(&args(&["logs", "7", "-1", "plan.json", "cluster.json"])).unwrap();
        assert_eq!(inv.log_dir, PathBuf::from("logs"));
        assert_eq!(inv.query_id, 7);
        assert_eq!(inv.view, View::Fragment { fragment_id: -1 });
        assert_eq!(inv.cluster_path, PathBuf::from("cluster.json"));
    }

    #[test]
    fn test_six_arguments_select_operator_view() {
        let inv = Invocation::from_args(&args(&["logs", "2", "7", "0", "plan.json", "cluster.json"])).unwrap();
        assert_eq!(inv.query_id, 7);
        assert_eq!(
            inv.view,
            View::Operator {
                worker_id: 2,
                fragment_id: 0
            }
        );
        assert_eq!(inv.plan_path, PathBuf::from("plan.json"));
    }

    #[test]
    fn test_other_counts_are_rejected() {
        // four and seven user arguments, i.e. five and eight with the program name
        assert_eq!(
            Invocation::from_args(&args(&["logs", "7", "0", "plan.json"])),
            Err(InvocationError::Arity(4))
        );
        assert_eq!(
            Invocation::from_args(&args(&["logs", "1", "7", "0", "plan.json", "cluster.json", "extra"])),
            Err(InvocationError::Arity(7))
        );
        assert_eq!(Invocation::from_args(&[]), Err(InvocationError::Arity(0)));
    }

    #[test]
    fn test_ids_must_be_integers() {
        let err = Invocation::from_args(&args(&["logs", "two", "7", "0", "p", "c"])).unwrap_err();
        assert_eq!(
            err,
            InvocationError::NotAnId {
                name: "worker_id",
                value: "two".to_string()
            }
        );
    }

    #[test]
    fn test_usage_names_both_forms() {
        let text = usage("proftrace");
        assert!(text.starts_with("Usage: proftrace <log_files_directory> <worker_id>"));
        assert!(text.contains("or: proftrace <log_files_directory> <query_id>"));
    }
}
