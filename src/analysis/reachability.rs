//! Reachability tracking for control edges and blocks.
//!
//! Every control node (`Jmp`, `Return`, the `True`/`False` projections of a `Cond`, and
//! the canonical `Bad`) is an edge into the block that lists it as a predecessor. The
//! tracker gives each edge an [`EdgeMark`] and derives block reachability from them:
//! a block is reachable once it is the entry or one of its predecessor edges is taken.
//!
//! Marks only move from [`EdgeMark::Undecided`] to [`EdgeMark::Taken`] while the fixpoint
//! runs. An undecided edge is not evidence either way, so nothing is pruned before the
//! analysis has converged. [`ReachabilityTracker::finalize`] then turns every edge still
//! undecided into [`EdgeMark::NotTaken`], and from that point marks are frozen.

use std::{collections::HashMap, fmt};

use crate::{
    ir::{FunctionGraph, NodeId, Op},
    utils::BitSet,
    Error, Result,
};

/// Decision about a control edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EdgeMark {
    /// No evidence yet.
    #[default]
    Undecided,
    /// Control can flow along the edge.
    Taken,
    /// Control never flows along the edge. Only assigned at convergence.
    NotTaken,
}

impl fmt::Display for EdgeMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Undecided => "undecided",
            Self::Taken => "taken",
            Self::NotTaken => "not taken",
        })
    }
}

/// Edge marks and reachable blocks of one function.
#[derive(Debug, Clone)]
pub struct ReachabilityTracker {
    marks: HashMap<NodeId, EdgeMark>,
    reachable: BitSet,
    entry: NodeId,
    finalized: bool,
}

impl ReachabilityTracker {
    /// Creates a tracker where nothing is reachable yet.
    #[must_use]
    pub fn new(graph: &FunctionGraph) -> Self {
        Self {
            marks: HashMap::new(),
            reachable: BitSet::new(graph.node_count()),
            entry: graph.start_block(),
            finalized: false,
        }
    }

    /// Returns `true` for node kinds that are control edges.
    #[must_use]
    pub fn is_edge(op: &Op) -> bool {
        match op {
            Op::Jmp | Op::Return | Op::Bad => true,
            Op::Proj(kind) => kind.is_branch_arm(),
            _ => false,
        }
    }

    /// Starts tracking `edge` as undecided.
    pub fn register(&mut self, edge: NodeId) {
        self.marks.entry(edge).or_default();
    }

    /// Current mark of a tracked edge.
    #[must_use]
    pub fn mark_of(&self, edge: NodeId) -> Option<EdgeMark> {
        self.marks.get(&edge).copied()
    }

    /// Returns `true` if `edge` is marked taken.
    #[must_use]
    pub fn is_taken(&self, edge: NodeId) -> bool {
        self.mark_of(edge) == Some(EdgeMark::Taken)
    }

    /// Marks `edge` as taken. Returns `true` if the mark changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LatticeViolation`] if the edge was already finalized as not taken.
    pub fn take(&mut self, edge: NodeId) -> Result<bool> {
        let mark = self.marks.entry(edge).or_default();
        match *mark {
            EdgeMark::Taken => Ok(false),
            EdgeMark::Undecided => {
                *mark = EdgeMark::Taken;
                Ok(true)
            }
            EdgeMark::NotTaken => Err(Error::LatticeViolation {
                node: edge,
                old: EdgeMark::NotTaken.to_string(),
                new: EdgeMark::Taken.to_string(),
            }),
        }
    }

    /// Recomputes the reachability of `block` from its predecessor edges.
    ///
    /// Returns `true` the first time the block becomes reachable.
    pub fn update_block(&mut self, graph: &FunctionGraph, block: NodeId) -> bool {
        if self.reachable.contains(block.index()) {
            return false;
        }
        let reachable =
            block == self.entry || graph.preds(block).iter().any(|&pred| self.is_taken(pred));
        if reachable {
            self.reachable.insert(block.index());
        }
        reachable
    }

    /// Returns `true` if `block` has been proven reachable.
    #[must_use]
    pub fn is_reachable(&self, block: NodeId) -> bool {
        self.reachable.contains(block.index())
    }

    /// Returns `true` once [`Self::finalize`] ran.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Turns every undecided edge into [`EdgeMark::NotTaken`].
    pub fn finalize(&mut self) {
        for mark in self.marks.values_mut() {
            if *mark == EdgeMark::Undecided {
                *mark = EdgeMark::NotTaken;
            }
        }
        self.finalized = true;
    }

    /// Splits the tracker into its edge marks and reachable block set.
    #[must_use]
    pub fn into_parts(self) -> (HashMap<NodeId, EdgeMark>, BitSet) {
        (self.marks, self.reachable)
    }
}
