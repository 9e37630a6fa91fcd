//! Sparse Conditional Constant Propagation (SCCP) over a sea-of-nodes graph.
//!
//! SCCP combines two fixpoint problems that feed each other:
//!
//! 1. **Values**: every data node carries an [`AbstractValue`], moving monotonically from
//!    `Unknown` through `Constant(c)` to `NotConstant`.
//! 2. **Reachability**: every control edge carries an [`EdgeMark`] and every block is
//!    reachable or not (see [`ReachabilityTracker`]).
//!
//! Computed nodes are only evaluated once their block is proven reachable, and a `Cond`
//! only opens the arm its selector allows. Phis combine only the operands arriving along
//! edges already proven taken, so a loop header is not polluted by its back edge before
//! the loop body is known to run, and two arms of an unknown branch that agree on a
//! constant still merge to that constant.
//!
//! Both problems share one [`Worklist`]. After it drains, undecided edges are finalized
//! as not taken.
//!
//! # Reference
//!
//! Wegman & Zadeck, "Constant Propagation with Conditional Branches", 1991.

use std::collections::HashMap;

use crate::{
    analysis::{
        AbstractValue, EdgeMark, MeetLattice, ReachabilityTracker, Worklist, WorklistPass,
        WorklistStats,
    },
    ir::{ConstValue, DependencyWalk, FunctionGraph, NodeId, Op, ProjKind},
    utils::BitSet,
    Error, Result,
};

/// Sparse conditional constant propagation analysis.
///
/// # Example
///
/// ```rust
/// use ssaprop::analysis::ConstantPropagation;
/// use ssaprop::ir::{BinaryOp, ConstValue, FunctionBuilder};
///
/// let mut sum = None;
/// let graph = FunctionBuilder::new("main", 0).build_with(|b| {
///     let entry = b.entry_block();
///     let two = b.const_i32(2);
///     let three = b.const_i32(3);
///     let add = b.binary(entry, BinaryOp::Add, two, three);
///     let mem = b.initial_memory();
///     b.ret(entry, mem, &[add]);
///     sum = Some(add);
/// });
///
/// let result = ConstantPropagation::analyze(&graph)?;
/// assert_eq!(result.constant(sum.unwrap()), Some(ConstValue::I32(5)));
/// # Ok::<(), ssaprop::Error>(())
/// ```
pub struct ConstantPropagation {
    values: Vec<AbstractValue>,
    tracker: ReachabilityTracker,
    /// Live members of each block.
    members: HashMap<NodeId, Vec<NodeId>>,
    live: BitSet,
    trace: Option<Vec<(NodeId, AbstractValue)>>,
}

impl ConstantPropagation {
    fn new(graph: &FunctionGraph, walk: &DependencyWalk, trace: bool) -> Self {
        Self {
            values: vec![AbstractValue::Unknown; graph.node_count()],
            tracker: ReachabilityTracker::new(graph),
            members: graph.members_by_block(&walk.live),
            live: walk.live.clone(),
            trace: trace.then(Vec::new),
        }
    }

    /// Runs the analysis to its fixpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] for dependency cycles without a `Phi` or `Block`,
    /// [`Error::InvalidNode`] for retired nodes reachable from `End`, and
    /// [`Error::LatticeViolation`] if a fact regresses.
    pub fn analyze(graph: &FunctionGraph) -> Result<SccpResult> {
        Self::analyze_with(graph, false)
    }

    /// Like [`Self::analyze`], additionally recording every value assignment in order.
    ///
    /// # Errors
    ///
    /// See [`Self::analyze`].
    pub fn analyze_traced(graph: &FunctionGraph) -> Result<SccpResult> {
        Self::analyze_with(graph, true)
    }

    /// Runs the analysis, recording a value trace if `trace` is set.
    ///
    /// # Errors
    ///
    /// See [`Self::analyze`].
    pub fn analyze_with(graph: &FunctionGraph, trace: bool) -> Result<SccpResult> {
        let walk = DependencyWalk::run(graph)?;
        let mut pass = Self::new(graph, &walk, trace);
        let stats = Worklist::run(graph, &walk, &mut pass)?;
        pass.tracker.finalize();

        let (marks, reachable) = pass.tracker.into_parts();
        Ok(SccpResult {
            values: pass.values,
            marks,
            reachable,
            stats,
            trace: pass.trace,
        })
    }

    fn value(&self, node: NodeId) -> AbstractValue {
        self.values
            .get(node.index())
            .copied()
            .unwrap_or(AbstractValue::NotConstant)
    }

    fn operand_value(&self, graph: &FunctionGraph, node: NodeId, index: usize) -> AbstractValue {
        graph
            .operand(node, index)
            .map_or(AbstractValue::NotConstant, |operand| self.value(operand))
    }

    fn seed(&mut self, node: NodeId, value: AbstractValue) {
        self.values[node.index()] = value;
        if let Some(trace) = &mut self.trace {
            trace.push((node, value));
        }
    }

    /// Stores a recomputed value, queueing the node's users if it changed.
    fn update(
        &mut self,
        graph: &FunctionGraph,
        node: NodeId,
        new: AbstractValue,
        worklist: &mut Worklist,
    ) -> Result<()> {
        let old = self.value(node);
        if old == new {
            return Ok(());
        }
        if !old.leq(&new) {
            return Err(Error::LatticeViolation {
                node,
                old: old.to_string(),
                new: new.to_string(),
            });
        }
        self.seed(node, new);
        self.enqueue_users(graph, node, worklist);
        Ok(())
    }

    fn enqueue_users(&self, graph: &FunctionGraph, node: NodeId, worklist: &mut Worklist) {
        for &user in graph.users(node) {
            if self.live.contains(user.index()) {
                worklist.enqueue(user);
            }
        }
    }

    fn in_reachable_block(&self, graph: &FunctionGraph, node: NodeId) -> bool {
        graph
            .block_of(node)
            .is_some_and(|block| self.tracker.is_reachable(block))
    }

    /// Returns `true` for `Proj(Res)` of an integer division.
    fn is_quotient(graph: &FunctionGraph, node: NodeId) -> bool {
        graph
            .operand(node, 0)
            .is_some_and(|tuple| matches!(graph.op(tuple), Op::Div | Op::Mod))
    }

    /// Transfer function of a computed node.
    fn evaluate(&self, graph: &FunctionGraph, node: NodeId) -> AbstractValue {
        let operand = |index| self.operand_value(graph, node, index);
        match graph.op(node) {
            Op::Binary(op) => operand(0).combine(operand(1), |a, b| op.eval(&a, &b)),
            Op::Cmp(relation) => operand(0).combine(operand(1), |a, b| {
                a.compare(*relation, &b).map(ConstValue::Bool)
            }),
            Op::Minus => operand(0).map(|a| a.negate()),
            Op::Not => operand(0).map(|a| a.bitwise_not()),
            Op::Conv => {
                let mode = graph.mode(node);
                operand(0).map(|a| a.convert_to(mode))
            }
            Op::Div => operand(1).combine(operand(2), |a, b| a.div(&b)),
            Op::Mod => operand(1).combine(operand(2), |a, b| a.rem(&b)),
            Op::Cond | Op::Proj(ProjKind::Res) => operand(0),
            Op::Phi => self.evaluate_phi(graph, node),
            _ => AbstractValue::NotConstant,
        }
    }

    /// Meet over the operands arriving along taken predecessor edges.
    fn evaluate_phi(&self, graph: &FunctionGraph, phi: NodeId) -> AbstractValue {
        let Some(block) = graph.block_of(phi) else {
            return AbstractValue::NotConstant;
        };
        let mut result = AbstractValue::unknown();
        for (index, &pred) in graph.preds(block).iter().enumerate() {
            if !self.tracker.is_taken(pred) {
                continue;
            }
            result = result.meet(&self.operand_value(graph, phi, index));
            if result.is_overdefined() {
                break;
            }
        }
        result
    }

    fn take_edge(&mut self, graph: &FunctionGraph, edge: NodeId, worklist: &mut Worklist) -> Result<()> {
        if self.tracker.take(edge)? {
            for &user in graph.users(edge) {
                if graph.is_block(user) && self.live.contains(user.index()) {
                    worklist.enqueue(user);
                }
            }
        }
        Ok(())
    }

    fn visit_block(&mut self, graph: &FunctionGraph, block: NodeId, worklist: &mut Worklist) {
        let newly_reachable = self.tracker.update_block(graph, block);
        let Some(members) = self.members.get(&block) else {
            return;
        };
        if newly_reachable {
            for &member in members {
                worklist.enqueue(member);
            }
        } else if self.tracker.is_reachable(block) {
            // A new predecessor edge changes what the phis merge.
            for &member in members {
                if graph.is_phi(member) {
                    worklist.enqueue(member);
                }
            }
        }
    }

    fn visit_arm(
        &mut self,
        graph: &FunctionGraph,
        arm: NodeId,
        kind: ProjKind,
        worklist: &mut Worklist,
    ) -> Result<()> {
        let taken = match self.operand_value(graph, arm, 0) {
            AbstractValue::Unknown => false,
            AbstractValue::Constant(c) => match c.as_bool() {
                Some(selected) => kind.arm_value() == Some(selected),
                None => true,
            },
            AbstractValue::NotConstant => true,
        };
        if taken {
            self.take_edge(graph, arm, worklist)?;
        }
        Ok(())
    }
}

impl WorklistPass for ConstantPropagation {
    fn init_node(&mut self, graph: &FunctionGraph, node: NodeId) -> Result<()> {
        let op = graph.op(node);
        if ReachabilityTracker::is_edge(op) {
            self.tracker.register(node);
        }
        let value = match op {
            Op::Const(value) => AbstractValue::Constant(*value),
            Op::Binary(_)
            | Op::Cmp(_)
            | Op::Minus
            | Op::Not
            | Op::Conv
            | Op::Cond
            | Op::Div
            | Op::Mod => AbstractValue::Unknown,
            Op::Phi if graph.mode(node).is_foldable() => AbstractValue::Unknown,
            Op::Proj(ProjKind::Res) if Self::is_quotient(graph, node) => AbstractValue::Unknown,
            Op::Start
            | Op::End
            | Op::Block
            | Op::Jmp
            | Op::Return
            | Op::Bad
            | Op::Proj(_)
            | Op::Phi
            | Op::Load
            | Op::Store
            | Op::Call(_) => AbstractValue::NotConstant,
            Op::Deleted => {
                return Err(Error::InvalidNode {
                    node,
                    op: op.name(),
                })
            }
        };
        self.seed(node, value);
        Ok(())
    }

    fn visit_node(&mut self, graph: &FunctionGraph, node: NodeId, worklist: &mut Worklist) -> Result<()> {
        match graph.op(node) {
            Op::Block => self.visit_block(graph, node, worklist),
            Op::Jmp | Op::Return => {
                if self.in_reachable_block(graph, node) {
                    self.take_edge(graph, node, worklist)?;
                }
            }
            Op::Proj(kind @ (ProjKind::True | ProjKind::False)) => {
                if self.in_reachable_block(graph, node) {
                    self.visit_arm(graph, node, *kind, worklist)?;
                }
            }
            Op::Binary(_)
            | Op::Cmp(_)
            | Op::Minus
            | Op::Not
            | Op::Conv
            | Op::Cond
            | Op::Div
            | Op::Mod => {
                if self.in_reachable_block(graph, node) {
                    let value = self.evaluate(graph, node);
                    self.update(graph, node, value, worklist)?;
                }
            }
            Op::Phi if graph.mode(node).is_foldable() => {
                if self.in_reachable_block(graph, node) {
                    let value = self.evaluate(graph, node);
                    self.update(graph, node, value, worklist)?;
                }
            }
            Op::Proj(ProjKind::Res) if Self::is_quotient(graph, node) => {
                if self.in_reachable_block(graph, node) {
                    let value = self.evaluate(graph, node);
                    self.update(graph, node, value, worklist)?;
                }
            }
            // Fixed facts.
            Op::Start
            | Op::End
            | Op::Bad
            | Op::Const(_)
            | Op::Proj(_)
            | Op::Phi
            | Op::Load
            | Op::Store
            | Op::Call(_) => {}
            Op::Deleted => {
                return Err(Error::InvalidNode {
                    node,
                    op: graph.op(node).name(),
                })
            }
        }
        Ok(())
    }
}

/// Facts computed by [`ConstantPropagation`].
#[derive(Debug, Clone)]
pub struct SccpResult {
    values: Vec<AbstractValue>,
    marks: HashMap<NodeId, EdgeMark>,
    reachable: BitSet,
    stats: WorklistStats,
    trace: Option<Vec<(NodeId, AbstractValue)>>,
}

impl SccpResult {
    /// Abstract value of a node, `None` for ids the analysis never saw.
    #[must_use]
    pub fn value(&self, node: NodeId) -> Option<&AbstractValue> {
        self.values.get(node.index())
    }

    /// Returns `true` if the node is known to be constant.
    #[must_use]
    pub fn is_constant(&self, node: NodeId) -> bool {
        self.value(node).is_some_and(AbstractValue::is_constant)
    }

    /// The constant value of a node, if known.
    #[must_use]
    pub fn constant(&self, node: NodeId) -> Option<ConstValue> {
        self.value(node).and_then(AbstractValue::as_constant)
    }

    /// Returns `true` if the block was proven reachable.
    #[must_use]
    pub fn is_block_reachable(&self, block: NodeId) -> bool {
        self.reachable.contains(block.index())
    }

    /// Final mark of a control edge, `None` for nodes that are not live control edges.
    #[must_use]
    pub fn edge_mark(&self, edge: NodeId) -> Option<EdgeMark> {
        self.marks.get(&edge).copied()
    }

    /// All nodes with a constant value.
    pub fn constants(&self) -> impl Iterator<Item = (NodeId, ConstValue)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(index, value)| value.as_constant().map(|c| (NodeId::new(index), c)))
    }

    /// Number of nodes with a constant value.
    #[must_use]
    pub fn constant_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_constant()).count()
    }

    /// Number of blocks proven reachable.
    #[must_use]
    pub fn reachable_block_count(&self) -> usize {
        self.reachable.count()
    }

    /// Worklist counters of the run.
    #[must_use]
    pub fn stats(&self) -> WorklistStats {
        self.stats
    }

    /// Every value assignment in order, if tracing was enabled.
    #[must_use]
    pub fn trace(&self) -> Option<&[(NodeId, AbstractValue)]> {
        self.trace.as_deref()
    }
}
