//! Operator parent/children structure of one fragment.
//!
//! Normal fragments take their structure from the query plan. Recovery
//! pseudo-fragments (negative ids) are not in the plan; their two operators
//! are recognised by name prefix in the observed events instead.

use std::collections::HashMap;

use proftrace_config::{
    Arity, ChildList, FragmentPlan, OperatorSpec, OperatorRegistry, QueryPlan,
    RECOVER_PRODUCER_KIND, TUPLE_SOURCE_KIND,
};
use proftrace_core::{FragmentId, TraceError};
use serde_json::Value;

pub const TUPLE_SOURCE_PREFIX: &str = "tupleSource_for_";
pub const RECOVERY_PRODUCER_PREFIX: &str = "recProducer_for_";

/// Where a fragment's structure comes from, resolved once per fragment.
#[derive(Debug, Clone, Copy)]
pub enum TopologySource<'a> {
    Normal(&'a FragmentPlan),
    Recovery,
}

impl<'a> TopologySource<'a> {
    pub fn resolve(plan: &'a QueryPlan, fragment_id: FragmentId) -> Result<Self, TraceError> {
        if fragment_id < 0 {
            return Ok(TopologySource::Recovery);
        }
        plan.fragment(fragment_id)
            .map(TopologySource::Normal)
            .ok_or(TraceError::FragmentOutOfRange {
                fragment_id,
                fragments: plan.fragment_count(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorNode {
    pub name: String,
    pub kind: String,
    pub root: bool,
    pub parent: Option<usize>,
    /// Child indices in declaration order.
    pub children: Vec<usize>,
}

/// Operators of one fragment, addressed by stable index.
#[derive(Debug, Clone)]
pub struct FragmentTopology {
    nodes: Vec<OperatorNode>,
    index: HashMap<String, usize>,
}

impl FragmentTopology {
    /// Builds the topology for `source`. `observed` lists the operator names
    /// present in the fragment's events and is only consulted for recovery
    /// fragments.
    pub fn build<'n>(
        source: &TopologySource<'_>,
        registry: &OperatorRegistry,
        observed: impl IntoIterator<Item = &'n str>,
    ) -> Result<Self, TraceError> {
        match source {
            TopologySource::Normal(fragment) => Self::from_plan(fragment, registry),
            TopologySource::Recovery => Self::from_recovery(observed),
        }
    }

    fn from_plan(fragment: &FragmentPlan, registry: &OperatorRegistry) -> Result<Self, TraceError> {
        let mut topology = Self::empty();
        let mut arities = Vec::with_capacity(fragment.operators.len());

        for op in &fragment.operators {
            let spec = registry.get(&op.kind).ok_or_else(|| TraceError::UnknownKind {
                operator: op.name.clone(),
                kind: op.kind.clone(),
            })?;
            topology.push(&op.name, &op.kind, spec.root);
            arities.push(spec.arity);
        }

        for (parent, (op, arity)) in fragment.operators.iter().zip(arities).enumerate() {
            for child_name in child_refs(op, arity)? {
                let child = topology
                    .index_of(&child_name)
                    .ok_or_else(|| TraceError::UnknownOperator(child_name.clone()))?;
                topology.link(parent, child)?;
            }
        }

        Ok(topology)
    }

    fn from_recovery<'n>(observed: impl IntoIterator<Item = &'n str>) -> Result<Self, TraceError> {
        let mut sources = Vec::new();
        let mut producers = Vec::new();
        for name in observed {
            if name.starts_with(TUPLE_SOURCE_PREFIX) {
                sources.push(name);
            } else if name.starts_with(RECOVERY_PRODUCER_PREFIX) {
                producers.push(name);
            }
        }

        let producer = single(producers, RECOVERY_PRODUCER_PREFIX)?;
        let source = single(sources, TUPLE_SOURCE_PREFIX)?;

        let mut topology = Self::empty();
        let root = topology.push(producer, RECOVER_PRODUCER_KIND, true);
        let child = topology.push(source, TUPLE_SOURCE_KIND, false);
        topology.link(root, child)?;
        Ok(topology)
    }

    fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn push(&mut self, name: &str, kind: &str, root: bool) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(OperatorNode {
            name: name.to_string(),
            kind: kind.to_string(),
            root,
            parent: None,
            children: Vec::new(),
        });
        self.index.insert(name.to_string(), idx);
        idx
    }

    fn link(&mut self, parent: usize, child: usize) -> Result<(), TraceError> {
        match self.nodes[child].parent {
            Some(existing) if existing == parent => Ok(()),
            Some(existing) => Err(TraceError::DuplicateParent {
                child: self.nodes[child].name.clone(),
                first: self.nodes[existing].name.clone(),
                second: self.nodes[parent].name.clone(),
            }),
            None => {
                self.nodes[child].parent = Some(parent);
                self.nodes[parent].children.push(child);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn node(&self, idx: usize) -> &OperatorNode {
        &self.nodes[idx]
    }

    pub fn nodes(&self) -> &[OperatorNode] {
        &self.nodes
    }

    pub fn parent_of(&self, name: &str) -> Option<&str> {
        let idx = self.index_of(name)?;
        self.nodes[idx].parent.map(|p| self.nodes[p].name.as_str())
    }

    pub fn children_of(&self, name: &str) -> Vec<&str> {
        self.index_of(name)
            .map(|idx| {
                self.nodes[idx]
                    .children
                    .iter()
                    .map(|&c| self.nodes[c].name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn single<'n>(mut names: Vec<&'n str>, prefix: &'static str) -> Result<&'n str, TraceError> {
    if names.len() != 1 {
        return Err(TraceError::MissingRecoveryOperator {
            prefix,
            found: names.len(),
        });
    }
    Ok(names.remove(0))
}

/// Reads the child operator names an operator declares, per its arity.
///
/// A name listed twice (a self-join reading one input on both sides) is
/// returned twice, but `link` keeps a single edge, so the rebuilt tree shows
/// that child once under its parent rather than as two identical subtrees.
fn child_refs(op: &OperatorSpec, arity: Arity) -> Result<Vec<String>, TraceError> {
    let field_ref = |field: &str| -> Result<String, TraceError> {
        op.arg(field)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| missing(op, field))
    };

    match arity {
        Arity::Leaf => Ok(Vec::new()),
        Arity::OneChild(field) => Ok(vec![field_ref(field)?]),
        Arity::TwoChildren(left, right) => Ok(vec![field_ref(left)?, field_ref(right)?]),
        Arity::ManyChildren(ChildList::Fields(fields)) => {
            fields.iter().map(|&f| field_ref(f)).collect()
        }
        Arity::ManyChildren(ChildList::Array(field)) => {
            let items = op
                .arg(field)
                .and_then(Value::as_array)
                .ok_or_else(|| missing(op, field))?;
            items
                .iter()
                .map(|v| v.as_str().map(str::to_string).ok_or_else(|| missing(op, field)))
                .collect()
        }
    }
}

fn missing(op: &OperatorSpec, field: &str) -> TraceError {
    TraceError::MissingChildField {
        operator: op.name.clone(),
        kind: op.kind.clone(),
        field: field.to_string(),
    }
}
