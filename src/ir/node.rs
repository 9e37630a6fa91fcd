//! Node identities and node records.
//!
//! Nodes live in a dense arena owned by their [`FunctionGraph`](crate::ir::FunctionGraph).
//! Edges are [`NodeId`] indices into that arena rather than references, so rewiring a use
//! is an index store and a retired node simply keeps its slot with [`Op::Deleted`].

use std::fmt;

use crate::ir::{Mode, Op};

/// A strongly-typed index of a node within one function graph.
///
/// Ids are assigned sequentially by [`FunctionGraph::add_node`](crate::ir::FunctionGraph::add_node)
/// and are never reused, so an id stays a valid key for per-node side tables (analysis
/// results, replacement maps) for as long as the graph exists.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Creates a `NodeId` from a raw arena index.
    ///
    /// Mostly useful in tests; real ids come from the graph.
    #[must_use]
    #[inline]
    pub const fn new(index: usize) -> Self {
        NodeId(index)
    }

    /// The raw arena index.
    #[must_use]
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl From<usize> for NodeId {
    #[inline]
    fn from(index: usize) -> Self {
        NodeId(index)
    }
}

impl From<NodeId> for usize {
    #[inline]
    fn from(node: NodeId) -> Self {
        node.0
    }
}

/// One element of a function graph.
///
/// `operands` are ordered input edges. `users` is the reverse adjacency, holding one entry
/// per operand edge that points at this node (a node using another twice appears twice).
/// Both lists are kept consistent by the graph's mutation primitives; code outside
/// [`crate::ir::graph`] only reads them.
#[derive(Debug, Clone)]
pub struct Node {
    /// The operation.
    pub op: Op,
    /// The value kind this node produces.
    pub mode: Mode,
    /// Containing block. `None` only for `Block` nodes.
    pub block: Option<NodeId>,
    pub(crate) operands: Vec<NodeId>,
    pub(crate) users: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(op: Op, mode: Mode, block: Option<NodeId>, operands: Vec<NodeId>) -> Self {
        Self {
            op,
            mode,
            block,
            operands,
            users: Vec::new(),
        }
    }

    /// Ordered input edges.
    #[must_use]
    pub fn operands(&self) -> &[NodeId] {
        &self.operands
    }

    /// Nodes that use this node as an operand, one entry per edge.
    #[must_use]
    pub fn users(&self) -> &[NodeId] {
        &self.users
    }

    /// Returns `true` if the node has been retired.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self.op, Op::Deleted)
    }
}
