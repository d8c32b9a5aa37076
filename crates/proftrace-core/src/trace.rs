//! Reconstructed trace tree types.
//!
//! Field names follow the viewer's JSON shape: states carry a numeric
//! `name` code and an optional `tp_num`, traces a `type`/`name` pair.

use serde::{Deserialize, Serialize};

use crate::{FragmentId, Nanos, WorkerId};

/// What an operator was doing during a [`StateInterval`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum StateKind {
    Compute,
    Sleep,
    Wait,
    Send,
    Receive,
}

impl From<StateKind> for u8 {
    fn from(kind: StateKind) -> Self {
        match kind {
            StateKind::Compute => 0,
            StateKind::Sleep => 1,
            StateKind::Wait => 2,
            StateKind::Send => 3,
            StateKind::Receive => 4,
        }
    }
}

impl TryFrom<u8> for StateKind {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(StateKind::Compute),
            1 => Ok(StateKind::Sleep),
            2 => Ok(StateKind::Wait),
            3 => Ok(StateKind::Send),
            4 => Ok(StateKind::Receive),
            other => Err(format!("unknown state code {}", other)),
        }
    }
}

/// A closed time interval of one operator, relative to its trace origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateInterval {
    pub begin: Nanos,
    pub end: Nanos,
    #[serde(rename = "name")]
    pub kind: StateKind,
    /// Thread pool slot the operator yielded, for compute spans ending in a hang.
    #[serde(rename = "tp_num", default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<i32>,
}

impl StateInterval {
    pub fn new(begin: Nanos, end: Nanos, kind: StateKind) -> Self {
        Self {
            begin,
            end,
            kind,
            slot: None,
        }
    }

    pub fn with_slot(mut self, slot: Option<i32>) -> Self {
        self.slot = slot;
        self
    }

    pub fn duration(&self) -> Nanos {
        self.end - self.begin
    }

    pub fn shift(&mut self, delta: Nanos) {
        self.begin += delta;
        self.end += delta;
    }
}

/// One operator's states and its child operators. Parents own their children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorTrace {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub states: Vec<StateInterval>,
    pub children: Vec<OperatorTrace>,
}

impl OperatorTrace {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            states: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Adds `delta` to every interval in this subtree.
    pub fn shift(&mut self, delta: Nanos) {
        if delta == 0 {
            return;
        }
        for state in &mut self.states {
            state.shift(delta);
        }
        for child in &mut self.children {
            child.shift(delta);
        }
    }

    /// Finds an operator by name anywhere in this subtree.
    pub fn find(&self, name: &str) -> Option<&OperatorTrace> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }
}

/// The operator tree of one fragment as executed on one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentWorkerTrace {
    #[serde(flatten)]
    pub root: OperatorTrace,
    /// Root begin on the shared epoch clock, in nanoseconds.
    #[serde(rename = "real_begin")]
    pub absolute_origin: Nanos,
    pub fragment_index: FragmentId,
    pub worker_id: WorkerId,
    pub begin: Nanos,
    pub end: Nanos,
}

impl FragmentWorkerTrace {
    /// Rebases the whole trace, its own bounds included.
    pub fn shift(&mut self, delta: Nanos) {
        if delta == 0 {
            return;
        }
        self.root.shift(delta);
        self.begin += delta;
        self.end += delta;
    }
}

/// All fragment-worker traces of one query on a single relative timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTrace {
    /// Global origin on the epoch clock that relative time 0 refers to.
    #[serde(rename = "real_begin")]
    pub origin: Nanos,
    pub begin: Nanos,
    pub end: Nanos,
    #[serde(rename = "hierarchy")]
    pub fragments: Vec<FragmentWorkerTrace>,
}
