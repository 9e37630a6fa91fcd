//! Sparse worklist traversal engine.
//!
//! The engine owns a FIFO queue of pending nodes and a [`BitSet`] recording which nodes are
//! currently queued, which makes [`Worklist::enqueue`] idempotent. An analysis plugs in by
//! implementing [`WorklistPass`]: [`Worklist::run`] seeds every live node through
//! [`WorklistPass::init_node`], queues it once, and then pops nodes and hands them to
//! [`WorklistPass::visit_node`] until the queue is empty. Handlers push further work
//! themselves, typically the users of a node whose fact just changed, so information
//! travels along def-use edges instead of by whole-graph sweeps.
//!
//! # Dispatch
//!
//! Handlers dispatch with an exhaustive `match` over [`Op`](crate::ir::Op), so a node kind
//! without a handler is a compile error. The one configuration error left for runtime is a
//! retired node that is still reachable from `End`, reported as [`Error::InvalidNode`]
//! before any node is seeded.

use std::collections::VecDeque;

use crate::{
    ir::{DependencyWalk, FunctionGraph, NodeId, Op},
    utils::BitSet,
    Error, Result,
};

/// Handlers of a worklist-driven analysis.
pub trait WorklistPass {
    /// Sets up the initial fact of `node`. Called once per live node, in dependency order.
    ///
    /// # Errors
    ///
    /// Implementations fail on node kinds they cannot seed.
    fn init_node(&mut self, graph: &FunctionGraph, node: NodeId) -> Result<()>;

    /// Re-evaluates `node`, queueing whatever depends on a changed fact.
    ///
    /// # Errors
    ///
    /// Implementations fail on internal-consistency violations.
    fn visit_node(
        &mut self,
        graph: &FunctionGraph,
        node: NodeId,
        worklist: &mut Worklist,
    ) -> Result<()>;
}

/// Counters describing one engine run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorklistStats {
    /// Nodes seeded before the first visit.
    pub seeded: usize,
    /// Successful `enqueue` calls, including the seeding ones.
    pub enqueued: usize,
    /// Handler invocations.
    pub visits: usize,
}

/// FIFO queue of pending nodes.
#[derive(Debug, Clone)]
pub struct Worklist {
    queue: VecDeque<NodeId>,
    pending: BitSet,
    stats: WorklistStats,
}

impl Worklist {
    /// Creates an empty worklist for node ids below `capacity`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            pending: BitSet::new(capacity),
            stats: WorklistStats::default(),
        }
    }

    /// Queues `node` unless it is already pending.
    ///
    /// Returns `true` if the node was added. Ids beyond the capacity are ignored.
    pub fn enqueue(&mut self, node: NodeId) -> bool {
        if node.index() >= self.pending.len() || !self.pending.insert(node.index()) {
            return false;
        }
        self.queue.push_back(node);
        self.stats.enqueued += 1;
        true
    }

    /// Takes the oldest pending node.
    pub fn pop(&mut self) -> Option<NodeId> {
        let node = self.queue.pop_front()?;
        self.pending.remove(node.index());
        Some(node)
    }

    /// Returns `true` if `node` is waiting to be visited.
    #[must_use]
    pub fn is_pending(&self, node: NodeId) -> bool {
        self.pending.contains(node.index())
    }

    /// Number of pending nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Counters so far.
    #[must_use]
    pub fn stats(&self) -> WorklistStats {
        self.stats
    }

    /// Drives `pass` to a fixpoint over the live nodes of `walk`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidNode`] if a retired node is reachable from `End`, and
    /// propagates any handler error.
    pub fn run<P>(graph: &FunctionGraph, walk: &DependencyWalk, pass: &mut P) -> Result<WorklistStats>
    where
        P: WorklistPass + ?Sized,
    {
        if let Some(&(_, target)) = walk.dangling.first() {
            return Err(Error::InvalidNode {
                node: target,
                op: Op::Deleted.name(),
            });
        }

        let mut worklist = Self::new(graph.node_count());
        for &node in &walk.order {
            pass.init_node(graph, node)?;
            worklist.enqueue(node);
        }
        worklist.stats.seeded = walk.order.len();

        while let Some(node) = worklist.pop() {
            worklist.stats.visits += 1;
            pass.visit_node(graph, node, &mut worklist)?;
        }
        Ok(worklist.stats)
    }
}
