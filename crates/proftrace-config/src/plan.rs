//! Query plan document.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use proftrace_core::{FragmentId, WorkerId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ConfigError;

/// One operator of a fragment. Kind-specific arguments are kept verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorSpec {
    #[serde(rename = "opName", alias = "op_name")]
    pub name: String,
    #[serde(rename = "opType", alias = "op_type")]
    pub kind: String,
    #[serde(flatten)]
    pub args: Map<String, Value>,
}

impl OperatorSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            args: Map::new(),
        }
    }

    /// Sets an argument field, mostly useful for building plans in code.
    pub fn with_arg(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(field.into(), value.into());
        self
    }

    /// Looks up an argument by its camelCase name, falling back to snake_case.
    pub fn arg(&self, field: &str) -> Option<&Value> {
        self.args
            .get(field)
            .or_else(|| self.args.get(&snake_case(field)))
    }
}

/// A worker id as it appears in a fragment's `workers` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorkerRef {
    Id(WorkerId),
    Text(String),
}

impl WorkerRef {
    pub fn id(&self) -> Option<WorkerId> {
        match self {
            WorkerRef::Id(id) => Some(*id),
            WorkerRef::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentPlan {
    pub operators: Vec<OperatorSpec>,
    /// Workers this fragment runs on; all workers when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<Vec<WorkerRef>>,
}

impl FragmentPlan {
    pub fn new(operators: Vec<OperatorSpec>) -> Self {
        Self {
            operators,
            workers: None,
        }
    }

    pub fn on_workers(mut self, workers: impl IntoIterator<Item = WorkerId>) -> Self {
        self.workers = Some(workers.into_iter().map(WorkerRef::Id).collect());
        self
    }

    pub fn runs_on(&self, worker_id: WorkerId) -> bool {
        match &self.workers {
            None => true,
            Some(workers) => workers.iter().any(|w| w.id() == Some(worker_id)),
        }
    }

    pub fn operator(&self, name: &str) -> Option<&OperatorSpec> {
        self.operators.iter().find(|op| op.name == name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlan {
    pub fragments: Vec<FragmentPlan>,
}

impl QueryPlan {
    pub fn new(fragments: Vec<FragmentPlan>) -> Result<Self, ConfigError> {
        let plan = Self { fragments };
        plan.validate()?;
        Ok(plan)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let plan: QueryPlan = serde_json::from_str(content)?;
        plan.validate()?;
        Ok(plan)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for op in self.fragments.iter().flat_map(|f| &f.operators) {
            if !seen.insert(op.name.as_str()) {
                return Err(ConfigError::DuplicateOperator(op.name.clone()));
            }
        }
        Ok(())
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    /// Returns the plan fragment for a non-negative id.
    pub fn fragment(&self, fragment_id: FragmentId) -> Option<&FragmentPlan> {
        usize::try_from(fragment_id)
            .ok()
            .and_then(|i| self.fragments.get(i))
    }
}

fn snake_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for c in field.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
