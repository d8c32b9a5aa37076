//! Operator kind registry.
//!
//! Every operator kind that may appear in a plan must be registered with its
//! child-reference arity. Kinds that terminate a fragment's local pipeline are
//! registered as roots; a root's first and last event anchor the fragment's
//! timeline on each worker.

use std::collections::HashMap;

/// Where a many-children operator lists its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildList {
    /// A single array-valued field.
    Array(&'static str),
    /// Several single-valued fields, in order.
    Fields(&'static [&'static str]),
}

/// Child-reference arity of an operator kind, with the plan fields holding the references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Leaf,
    OneChild(&'static str),
    TwoChildren(&'static str, &'static str),
    ManyChildren(ChildList),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindSpec {
    pub arity: Arity,
    pub root: bool,
}

/// Immutable lookup from operator kind to [`KindSpec`].
#[derive(Debug, Clone, Default)]
pub struct OperatorRegistry {
    kinds: HashMap<String, KindSpec>,
}

/// Kind given to the replay source of a recovery pseudo-fragment.
pub const TUPLE_SOURCE_KIND: &str = "TupleSource";
/// Kind given to the producer of a recovery pseudo-fragment.
pub const RECOVER_PRODUCER_KIND: &str = "RecoverProducer";

impl OperatorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The operator kinds of the query engine's JSON plan encoding.
    pub fn standard() -> Self {
        use Arity::*;

        const CHILD: &str = "argChild";
        const IDB_INPUTS: &[&str] = &["argInitialInput", "argIterationInput", "argEosControllerInput"];

        let mut registry = Self::empty();

        for kind in [
            "TableScan",
            "DbQueryScan",
            "FileScan",
            "Seq",
            "EmptyRelation",
            "Consumer",
            "ShuffleConsumer",
            "CollectConsumer",
            "BroadcastConsumer",
            "LocalMultiwayConsumer",
            "HyperShuffleConsumer",
            TUPLE_SOURCE_KIND,
        ] {
            registry = registry.register(kind, Leaf);
        }

        for kind in [
            "MultiGroupByAggregate",
            "SingleGroupByAggregate",
            "Aggregate",
            "Apply",
            "Filter",
            "CountFilter",
            "ColumnSelect",
            "DupElim",
            "Rename",
            "InMemoryOrderBy",
            "HyperShuffleProducer",
        ] {
            registry = registry.register(kind, OneChild(CHILD));
        }

        for kind in [
            "LocalMultiwayProducer",
            "CollectProducer",
            RECOVER_PRODUCER_KIND,
            "ShuffleProducer",
            "BroadcastProducer",
            "SinkRoot",
            "DbInsert",
            "EOSController",
        ] {
            registry = registry.register_root(kind, OneChild(CHILD));
        }

        for kind in [
            "RightHashJoin",
            "RightHashCountingJoin",
            "SymmetricHashJoin",
            "SymmetricHashCountingJoin",
        ] {
            registry = registry.register(kind, TwoChildren("argChild1", "argChild2"));
        }

        registry
            .register("UnionAll", ManyChildren(ChildList::Array("argChildren")))
            .register("Merge", ManyChildren(ChildList::Array("argChildren")))
            .register("IDBInput", ManyChildren(ChildList::Fields(IDB_INPUTS)))
    }

    pub fn register(self, kind: impl Into<String>, arity: Arity) -> Self {
        self.insert(kind, arity, false)
    }

    pub fn register_root(self, kind: impl Into<String>, arity: Arity) -> Self {
        self.insert(kind, arity, true)
    }

    fn insert(mut self, kind: impl Into<String>, arity: Arity, root: bool) -> Self {
        self.kinds.insert(kind.into(), KindSpec { arity, root });
        self
    }

    pub fn get(&self, kind: &str) -> Option<&KindSpec> {
        self.kinds.get(kind)
    }

    pub fn is_root(&self, kind: &str) -> bool {
        self.kinds.get(kind).is_some_and(|spec| spec.root)
    }

    pub fn root_kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds
            .iter()
            .filter(|(_, spec)| spec.root)
            .map(|(kind, _)| kind.as_str())
    }
}
