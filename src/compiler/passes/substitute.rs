//! Rewriting a graph with the facts of a constant-propagation run.
//!
//! Substitution visits the live nodes in dependency order and performs three rewrites:
//!
//! - a data node proven constant is exchanged with a `Const` in the start block,
//! - a constant `Div`/`Mod` is spliced out of the memory chain: its memory projection is
//!   exchanged with its input memory, its result projection with the constant, and the
//!   tuple itself retired,
//! - a branch arm whose `Cond` has a constant selector is exchanged with a fresh `Jmp`
//!   when the selector picks it, and with `Bad` otherwise.
//!
//! Dead edges and unreachable blocks produced by the last rewrite are left for
//! [`cleanup`](super::cleanup).

use std::collections::HashMap;

use crate::{
    analysis::SccpResult,
    compiler::{EventKind, EventLog},
    ir::{ConstValue, DependencyWalk, FunctionGraph, Mode, NodeId, Op, ProjKind},
    Result,
};

/// Counters of one substitution run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubstitutionStats {
    /// Data nodes replaced by constants.
    pub folded: usize,
    /// Side-effecting tuples spliced out of the memory chain.
    pub spliced: usize,
    /// Conditional branches turned into jumps.
    pub branches: usize,
}

impl SubstitutionStats {
    /// Returns `true` if anything was rewritten.
    #[must_use]
    pub const fn changed(&self) -> bool {
        self.folded + self.spliced + self.branches > 0
    }
}

/// Applies an [`SccpResult`] to the graph it was computed on.
pub struct Substitution<'a> {
    graph: &'a mut FunctionGraph,
    result: &'a SccpResult,
    events: &'a EventLog,
    pass: &'static str,
    constants: HashMap<ConstValue, NodeId>,
    replacements: HashMap<NodeId, NodeId>,
    stats: SubstitutionStats,
}

impl<'a> Substitution<'a> {
    /// Prepares a substitution, reusing the constants already in the graph.
    pub fn new(
        graph: &'a mut FunctionGraph,
        result: &'a SccpResult,
        events: &'a EventLog,
        pass: &'static str,
    ) -> Self {
        let constants = graph
            .ids()
            .filter(|&id| graph.block_of(id) == Some(graph.start_block()))
            .filter_map(|id| graph.const_value(id).map(|value| (value, id)))
            .collect();
        Self {
            graph,
            result,
            events,
            pass,
            constants,
            replacements: HashMap::new(),
            stats: SubstitutionStats::default(),
        }
    }

    /// Rewrites every live node the result has a decision for.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains an illegal dependency cycle.
    pub fn run(mut self) -> Result<SubstitutionStats> {
        let order = DependencyWalk::run(self.graph)?.order;
        for node in order {
            if self.graph.is_deleted(node) {
                continue;
            }
            match self.graph.op(node).clone() {
                Op::Proj(kind) if kind.is_branch_arm() => self.fold_arm(node, kind),
                Op::Div | Op::Mod => self.splice(node),
                Op::Phi | Op::Binary(_) | Op::Cmp(_) | Op::Minus | Op::Not | Op::Conv => {
                    self.fold(node);
                }
                _ => {}
            }
        }
        Ok(self.stats)
    }

    /// Follows recorded exchanges to the node currently standing in for `node`.
    #[must_use]
    pub fn resolve(&self, mut node: NodeId) -> NodeId {
        while let Some(&next) = self.replacements.get(&node) {
            node = next;
        }
        node
    }

    fn replace(&mut self, old: NodeId, new: NodeId) {
        let new = self.resolve(new);
        self.graph.exchange(old, new);
        self.replacements.insert(old, new);
    }

    fn constant_node(&mut self, value: ConstValue) -> NodeId {
        if let Some(&node) = self.constants.get(&value) {
            return node;
        }
        let block = self.graph.start_block();
        let node = self
            .graph
            .add_node(Op::Const(value), value.mode(), Some(block), Vec::new());
        self.constants.insert(value, node);
        node
    }

    fn fold(&mut self, node: NodeId) {
        if !self.graph.mode(node).is_foldable() {
            return;
        }
        let Some(value) = self.result.constant(node) else {
            return;
        };
        let replacement = self.constant_node(value);
        let op = self.graph.op(node).name();
        self.replace(node, replacement);
        self.stats.folded += 1;
        self.events
            .record(EventKind::ConstantFolded)
            .at(self.graph.name(), node)
            .pass(self.pass)
            .message(format!("{op} -> {value}"));
    }

    fn splice(&mut self, tuple: NodeId) {
        let Some(value) = self.result.constant(tuple) else {
            return;
        };
        let Some(mem_in) = self.graph.operand(tuple, 0) else {
            return;
        };
        let projections: Vec<(NodeId, Op)> = self
            .graph
            .users(tuple)
            .iter()
            .map(|&user| (user, self.graph.op(user).clone()))
            .collect();

        for (proj, op) in projections {
            if self.graph.is_deleted(proj) {
                continue;
            }
            match op {
                Op::Proj(ProjKind::Mem) => self.replace(proj, mem_in),
                Op::Proj(ProjKind::Res) => {
                    let constant = match value.convert_to(self.graph.mode(proj)) {
                        Some(converted) => converted,
                        None => value,
                    };
                    let replacement = self.constant_node(constant);
                    self.replace(proj, replacement);
                }
                _ => {}
            }
        }

        let op = self.graph.op(tuple).name();
        if self.graph.users(tuple).is_empty() {
            self.graph.kill(tuple);
        }
        self.stats.spliced += 1;
        self.events
            .record(EventKind::MemorySpliced)
            .at(self.graph.name(), tuple)
            .pass(self.pass)
            .message(format!("{op} -> {value}"));
    }

    fn fold_arm(&mut self, arm: NodeId, kind: ProjKind) {
        let Some(cond) = self.graph.operand(arm, 0) else {
            return;
        };
        let Some(selected) = self.result.constant(cond).and_then(|c| c.as_bool()) else {
            return;
        };
        let Some(block) = self.graph.block_of(arm) else {
            return;
        };

        if kind.arm_value() == Some(selected) {
            let jmp = self
                .graph
                .add_node(Op::Jmp, Mode::Control, Some(block), Vec::new());
            self.replace(arm, jmp);
            self.stats.branches += 1;
            self.events
                .record(EventKind::BranchSimplified)
                .at(self.graph.name(), cond)
                .pass(self.pass)
                .message(format!("always {kind}"));
        } else {
            let bad = self.graph.bad();
            self.replace(arm, bad);
        }

        if self.graph.users(cond).is_empty() {
            self.graph.kill(cond);
        }
    }
}

/// Applies `result` to `graph`, recording events into `events`.
///
/// # Errors
///
/// Returns an error if the graph contains an illegal dependency cycle.
pub fn substitute(
    graph: &mut FunctionGraph,
    result: &SccpResult,
    events: &EventLog,
    pass: &'static str,
) -> Result<SubstitutionStats> {
    Substitution::new(graph, result, events, pass).run()
}
