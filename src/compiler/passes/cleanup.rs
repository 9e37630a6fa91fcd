//! Removal of dead edges, unreachable blocks and garbage nodes.
//!
//! After substitution a graph may contain `Bad` predecessors, blocks nothing jumps to any
//! more, and nodes nothing depends on. [`cleanup`] runs two rounds of
//! [`remove_dead_edges`] followed by [`remove_unreachable_code`]. The first round removes
//! the edges substitution killed and every block that became unreachable; doing so turns
//! the control nodes of those blocks into `Bad` predecessors of surviving blocks, which the
//! second round removes. A third round is expected to change nothing.

use std::collections::HashSet;

use crate::{
    compiler::{EventKind, EventLog},
    ir::{FunctionGraph, NodeId},
    utils::BitSet,
    Error, Result,
};

/// Counters of one or more cleanup rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// `Bad` predecessors removed from blocks.
    pub edges_removed: usize,
    /// Single-operand phis replaced by their operand.
    pub phis_simplified: usize,
    /// Keep-alive edges dropped from `End`.
    pub keep_alives_removed: usize,
    /// Unreachable blocks exchanged with `Bad`.
    pub blocks_removed: usize,
    /// Garbage nodes retired.
    pub nodes_removed: usize,
}

impl CleanupStats {
    /// Returns `true` if anything was removed.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.edges_removed
            + self.phis_simplified
            + self.keep_alives_removed
            + self.blocks_removed
            + self.nodes_removed
            > 0
    }

    fn absorb(&mut self, other: Self) {
        self.edges_removed += other.edges_removed;
        self.phis_simplified += other.phis_simplified;
        self.keep_alives_removed += other.keep_alives_removed;
        self.blocks_removed += other.blocks_removed;
        self.nodes_removed += other.nodes_removed;
    }
}

fn live_blocks(graph: &FunctionGraph, live: &BitSet) -> Vec<NodeId> {
    live.iter()
        .map(NodeId::new)
        .filter(|&id| graph.is_block(id))
        .collect()
}

/// Removes `Bad` predecessors together with the matching phi operands, collapses
/// single-operand phis of reachable blocks, and drops dead or duplicate keep-alives.
///
/// # Errors
///
/// Returns an error if the graph contains an illegal dependency cycle.
pub fn remove_dead_edges(graph: &mut FunctionGraph, events: &EventLog) -> Result<CleanupStats> {
    let mut stats = CleanupStats::default();
    let live = graph.live_nodes()?;
    let blocks = live_blocks(graph, &live);
    let members = graph.members_by_block(&live);

    for &block in &blocks {
        let phis: Vec<NodeId> = members
            .get(&block)
            .map(|nodes| nodes.iter().copied().filter(|&n| graph.is_phi(n)).collect())
            .unwrap_or_default();

        for index in (0..graph.preds(block).len()).rev() {
            let pred = graph.preds(block)[index];
            if !graph.is_bad(pred) && !graph.is_deleted(pred) {
                continue;
            }
            graph.remove_operand(block, index);
            for &phi in &phis {
                if index < graph.operands(phi).len() {
                    graph.remove_operand(phi, index);
                }
            }
            stats.edges_removed += 1;
            let _ = events
                .record(EventKind::EdgeRemoved)
                .at(graph.name(), block)
                .message(format!("predecessor {index}"));
        }
    }

    let reachable = graph.cfg_reachable(&blocks);
    for &block in &blocks {
        if !reachable.contains(block.index()) || graph.preds(block).len() != 1 {
            continue;
        }
        let Some(nodes) = members.get(&block) else {
            continue;
        };
        for &phi in nodes {
            if graph.is_deleted(phi) || !graph.is_phi(phi) || graph.operands(phi).len() != 1 {
                continue;
            }
            let Some(value) = graph.operand(phi, 0) else {
                continue;
            };
            if value == phi {
                continue;
            }
            graph.exchange(phi, value);
            stats.phis_simplified += 1;
            let _ = events
                .record(EventKind::PhiSimplified)
                .at(graph.name(), phi)
                .message(format!("-> {value}"));
        }
    }

    let end = graph.end();
    let mut seen = HashSet::new();
    let keep_alives = graph.keep_alives().to_vec();
    for (index, node) in keep_alives.into_iter().enumerate().rev() {
        if graph.is_bad(node) || graph.is_deleted(node) || !seen.insert(node) {
            graph.remove_operand(end, index);
            stats.keep_alives_removed += 1;
        }
    }

    Ok(stats)
}

/// Exchanges every block unreachable from the entry, and everything in it, with `Bad`,
/// then retires the nodes that are no longer live.
///
/// The end block is kept even when no `Return` reaches it.
///
/// # Errors
///
/// Returns an error if the graph contains an illegal dependency cycle.
pub fn remove_unreachable_code(
    graph: &mut FunctionGraph,
    events: &EventLog,
) -> Result<CleanupStats> {
    let mut stats = CleanupStats::default();
    let live = graph.live_nodes()?;
    let blocks = live_blocks(graph, &live);
    let reachable = graph.cfg_reachable(&blocks);
    let members = graph.members_by_block(&live);
    let bad = graph.bad();

    for &block in &blocks {
        if reachable.contains(block.index())
            || block == graph.start_block()
            || block == graph.end_block()
        {
            continue;
        }
        if let Some(nodes) = members.get(&block) {
            for &node in nodes {
                if !graph.is_deleted(node) {
                    graph.exchange(node, bad);
                }
            }
        }
        graph.exchange(block, bad);
        stats.blocks_removed += 1;
        let _ = events
            .record(EventKind::BlockRemoved)
            .at(graph.name(), block);
    }

    let live = graph.live_nodes()?;
    let garbage: Vec<NodeId> = graph
        .ids()
        .filter(|&id| !live.contains(id.index()))
        .collect();
    for &node in &garbage {
        graph.kill(node);
    }
    stats.nodes_removed = garbage.len();
    if !garbage.is_empty() {
        let _ = events
            .record(EventKind::NodesRemoved)
            .function(graph.name())
            .message(format!("{} nodes", garbage.len()));
    }

    Ok(stats)
}

/// Runs the two cleanup rounds, plus a third that must be a no-op when `sanity_check` is set.
///
/// # Errors
///
/// Returns [`Error::CleanupDiverged`] if the third round still changed the graph.
pub fn cleanup(
    graph: &mut FunctionGraph,
    events: &EventLog,
    sanity_check: bool,
) -> Result<CleanupStats> {
    let mut stats = CleanupStats::default();
    for _ in 0..2 {
        stats.absorb(remove_dead_edges(graph, events)?);
        stats.absorb(remove_unreachable_code(graph, events)?);
    }

    if sanity_check {
        let scratch = EventLog::new();
        let mut extra = remove_dead_edges(graph, &scratch)?;
        extra.absorb(remove_unreachable_code(graph, &scratch)?);
        if extra.changed() {
            return Err(Error::CleanupDiverged {
                function: graph.name().to_string(),
            });
        }
    }

    Ok(stats)
}
