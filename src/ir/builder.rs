//! Programmatic construction of function graphs.
//!
//! [`FunctionBuilder`] is a thin layer over the [`FunctionGraph`] mutation primitives that
//! knows the graph's layout conventions: where constants and arguments live, how memory
//! is threaded through side-effecting nodes, and how returns connect to the end block.
//! It is the construction API used by the tests, benchmarks and fuzz targets.
//!
//! Blocks and phis may be created before all their inputs exist, which is how loops are
//! built: create the header with its entry edge, build the body, then close the back edge
//! with [`FunctionBuilder::add_pred`] and [`FunctionBuilder::add_phi_operand`].
//!
//! ```rust
//! use ssaprop::ir::{BinaryOp, ConstValue, FunctionBuilder};
//!
//! // return 2 + 3;
//! let graph = FunctionBuilder::new("main", 0).build_with(|b| {
//!     let entry = b.entry_block();
//!     let two = b.const_i32(2);
//!     let three = b.const_i32(3);
//!     let sum = b.binary(entry, BinaryOp::Add, two, three);
//!     let mem = b.initial_memory();
//!     b.ret(entry, mem, &[sum]);
//! });
//! assert!(ssaprop::ir::verify(&graph));
//! ```

use crate::ir::{BinaryOp, ConstValue, FunctionGraph, Mode, NodeId, Op, ProjKind, Relation};

/// Builder for a single function graph.
#[derive(Debug, Clone)]
pub struct FunctionBuilder {
    graph: FunctionGraph,
}

impl FunctionBuilder {
    /// Starts a function with the given name and parameter count.
    #[must_use]
    pub fn new(name: impl Into<String>, param_count: u32) -> Self {
        Self {
            graph: FunctionGraph::new(name, param_count),
        }
    }

    /// Runs `f` against the builder and returns the finished graph.
    #[must_use]
    pub fn build_with<F>(mut self, f: F) -> FunctionGraph
    where
        F: FnOnce(&mut Self),
    {
        f(&mut self);
        self.finish()
    }

    /// Returns the graph built so far.
    #[must_use]
    pub fn finish(self) -> FunctionGraph {
        self.graph
    }

    /// Read access to the graph under construction.
    #[must_use]
    pub fn graph(&self) -> &FunctionGraph {
        &self.graph
    }

    /// The entry block.
    #[must_use]
    pub fn entry_block(&self) -> NodeId {
        self.graph.start_block()
    }

    /// The exit block.
    #[must_use]
    pub fn end_block(&self) -> NodeId {
        self.graph.end_block()
    }

    fn start_proj(&mut self, kind: ProjKind, mode: Mode) -> NodeId {
        let start = self.graph.start();
        if let Some(existing) = self.graph.proj(start, kind) {
            return existing;
        }
        let block = self.graph.start_block();
        self.graph
            .add_node(Op::Proj(kind), mode, Some(block), vec![start])
    }

    /// The memory state on function entry.
    pub fn initial_memory(&mut self) -> NodeId {
        self.start_proj(ProjKind::Mem, Mode::Memory)
    }

    /// The `index`-th argument.
    pub fn arg(&mut self, index: u32, mode: Mode) -> NodeId {
        self.start_proj(ProjKind::Arg(index), mode)
    }

    /// A constant, placed in the entry block.
    pub fn constant(&mut self, value: ConstValue) -> NodeId {
        let block = self.graph.start_block();
        self.graph
            .add_node(Op::Const(value), value.mode(), Some(block), vec![])
    }

    /// A 32-bit signed constant.
    pub fn const_i32(&mut self, value: i32) -> NodeId {
        self.constant(ConstValue::I32(value))
    }

    /// A boolean constant.
    pub fn const_bool(&mut self, value: bool) -> NodeId {
        self.constant(ConstValue::Bool(value))
    }

    /// A new block with the given control predecessors.
    pub fn block(&mut self, preds: &[NodeId]) -> NodeId {
        self.graph
            .add_node(Op::Block, Mode::Block, None, preds.to_vec())
    }

    /// Appends a control predecessor to `block`.
    pub fn add_pred(&mut self, block: NodeId, pred: NodeId) {
        self.graph.add_operand(block, pred);
    }

    /// An unconditional jump leaving `block`.
    pub fn jmp(&mut self, block: NodeId) -> NodeId {
        self.graph
            .add_node(Op::Jmp, Mode::Control, Some(block), vec![])
    }

    /// A two-way branch leaving `block`. Returns the `(true, false)` arms.
    pub fn cond(&mut self, block: NodeId, selector: NodeId) -> (NodeId, NodeId) {
        let cond = self
            .graph
            .add_node(Op::Cond, Mode::Tuple, Some(block), vec![selector]);
        let on_true = self.graph.add_node(
            Op::Proj(ProjKind::True),
            Mode::Control,
            Some(block),
            vec![cond],
        );
        let on_false = self.graph.add_node(
            Op::Proj(ProjKind::False),
            Mode::Control,
            Some(block),
            vec![cond],
        );
        (on_true, on_false)
    }

    /// A phi in `block`. Operands may be completed later with [`Self::add_phi_operand`].
    pub fn phi(&mut self, block: NodeId, operands: &[NodeId], mode: Mode) -> NodeId {
        self.graph
            .add_node(Op::Phi, mode, Some(block), operands.to_vec())
    }

    /// Appends an operand to a phi.
    pub fn add_phi_operand(&mut self, phi: NodeId, operand: NodeId) {
        self.graph.add_operand(phi, operand);
    }

    /// A two-operand arithmetic node with the mode of its left operand.
    pub fn binary(&mut self, block: NodeId, op: BinaryOp, left: NodeId, right: NodeId) -> NodeId {
        let mode = self.graph.mode(left);
        self.graph
            .add_node(Op::Binary(op), mode, Some(block), vec![left, right])
    }

    /// A comparison.
    pub fn cmp(&mut self, block: NodeId, relation: Relation, left: NodeId, right: NodeId) -> NodeId {
        self.graph
            .add_node(Op::Cmp(relation), Mode::Bool, Some(block), vec![left, right])
    }

    /// A single-operand node (`Minus` or `Not`) with the mode of its operand.
    pub fn unary(&mut self, block: NodeId, op: Op, operand: NodeId) -> NodeId {
        let mode = self.graph.mode(operand);
        self.graph.add_node(op, mode, Some(block), vec![operand])
    }

    /// A conversion of `operand` to `mode`.
    pub fn conv(&mut self, block: NodeId, operand: NodeId, mode: Mode) -> NodeId {
        self.graph
            .add_node(Op::Conv, mode, Some(block), vec![operand])
    }

    fn memory_op(&mut self, block: NodeId, op: Op, operands: Vec<NodeId>) -> (NodeId, NodeId) {
        let tuple = self.graph.add_node(op, Mode::Tuple, Some(block), operands);
        let mem = self.graph.add_node(
            Op::Proj(ProjKind::Mem),
            Mode::Memory,
            Some(block),
            vec![tuple],
        );
        (tuple, mem)
    }

    fn result_proj(&mut self, block: NodeId, tuple: NodeId, mode: Mode) -> NodeId {
        self.graph
            .add_node(Op::Proj(ProjKind::Res), mode, Some(block), vec![tuple])
    }

    /// An integer division. Returns the `(memory, result)` projections.
    pub fn div(&mut self, block: NodeId, mem: NodeId, left: NodeId, right: NodeId) -> (NodeId, NodeId) {
        let mode = self.graph.mode(left);
        let (tuple, mem) = self.memory_op(block, Op::Div, vec![mem, left, right]);
        (mem, self.result_proj(block, tuple, mode))
    }

    /// An integer remainder. Returns the `(memory, result)` projections.
    pub fn modulo(&mut self, block: NodeId, mem: NodeId, left: NodeId, right: NodeId) -> (NodeId, NodeId) {
        let mode = self.graph.mode(left);
        let (tuple, mem) = self.memory_op(block, Op::Mod, vec![mem, left, right]);
        (mem, self.result_proj(block, tuple, mode))
    }

    /// A memory read of `mode`. Returns the `(memory, result)` projections.
    pub fn load(&mut self, block: NodeId, mem: NodeId, ptr: NodeId, mode: Mode) -> (NodeId, NodeId) {
        let (tuple, mem) = self.memory_op(block, Op::Load, vec![mem, ptr]);
        (mem, self.result_proj(block, tuple, mode))
    }

    /// A memory write. Returns the memory projection.
    pub fn store(&mut self, block: NodeId, mem: NodeId, ptr: NodeId, value: NodeId) -> NodeId {
        self.memory_op(block, Op::Store, vec![mem, ptr, value]).1
    }

    /// A call of `callee`. Returns the memory projection and, if `result` is given, the
    /// result projection.
    pub fn call(
        &mut self,
        block: NodeId,
        mem: NodeId,
        callee: &str,
        args: &[NodeId],
        result: Option<Mode>,
    ) -> (NodeId, Option<NodeId>) {
        let mut operands = Vec::with_capacity(args.len() + 1);
        operands.push(mem);
        operands.extend_from_slice(args);
        let (tuple, mem) = self.memory_op(block, Op::Call(callee.to_string()), operands);
        let res = result.map(|mode| self.result_proj(block, tuple, mode));
        (mem, res)
    }

    /// A return leaving `block`, wired into the end block.
    pub fn ret(&mut self, block: NodeId, mem: NodeId, values: &[NodeId]) -> NodeId {
        let mut operands = Vec::with_capacity(values.len() + 1);
        operands.push(mem);
        operands.extend_from_slice(values);
        let ret = self
            .graph
            .add_node(Op::Return, Mode::Control, Some(block), operands);
        let end_block = self.graph.end_block();
        self.graph.add_operand(end_block, ret);
        ret
    }

    /// Keeps `node` alive even if the exit does not depend on it.
    pub fn keep_alive(&mut self, node: NodeId) {
        self.graph.keep_alive(node);
    }
}
