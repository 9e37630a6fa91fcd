//! Function graphs and programs.
//!
//! A [`FunctionGraph`] is the sea-of-nodes representation of one function body: an arena
//! of [`Node`] records addressed by [`NodeId`], plus the handful of anchor nodes every
//! function owns (start and end blocks, the `Start` and `End` nodes, and the canonical
//! `Bad` marker).
//!
//! # Layout
//!
//! - `Start` and every `Const` live in the start block, which has no predecessors and is
//!   the function's entry.
//! - `End` lives in the end block. The end block's predecessors are the `Return` nodes;
//!   `End`'s own operands are keep-alive edges for nodes (typically endless loops) that
//!   would otherwise not be reachable from the exit.
//! - `Bad` is a single shared node in the start block standing in for any edge or value
//!   that has been proven dead.
//!
//! # Mutation
//!
//! All edge changes go through [`FunctionGraph::add_node`], [`FunctionGraph::set_operand`],
//! [`FunctionGraph::add_operand`], [`FunctionGraph::remove_operand`],
//! [`FunctionGraph::exchange`] and [`FunctionGraph::kill`]. They keep the user lists in
//! sync with the operand lists, which is what makes the reverse adjacency queries the
//! analysis relies on trustworthy.

use std::{collections::HashMap, fmt};

use crate::{
    ir::{ConstValue, DependencyWalk, Mode, Node, NodeId, Op, ProjKind},
    utils::BitSet,
    Result,
};

/// The graph of a single function.
#[derive(Debug, Clone)]
pub struct FunctionGraph {
    name: String,
    param_count: u32,
    nodes: Vec<Node>,
    start_block: NodeId,
    end_block: NodeId,
    start: NodeId,
    end: NodeId,
    bad: NodeId,
}

impl FunctionGraph {
    /// Creates a graph holding only the anchor nodes.
    ///
    /// # Arguments
    ///
    /// * `name` - Function name, used by dumps, logs and unused-function removal.
    /// * `param_count` - Number of `Proj(Arg)` values `Start` provides.
    #[must_use]
    pub fn new(name: impl Into<String>, param_count: u32) -> Self {
        let mut graph = Self {
            name: name.into(),
            param_count,
            nodes: Vec::new(),
            start_block: NodeId(0),
            end_block: NodeId(0),
            start: NodeId(0),
            end: NodeId(0),
            bad: NodeId(0),
        };
        graph.start_block = graph.add_node(Op::Block, Mode::Block, None, vec![]);
        graph.end_block = graph.add_node(Op::Block, Mode::Block, None, vec![]);
        graph.start = graph.add_node(Op::Start, Mode::Tuple, Some(graph.start_block), vec![]);
        graph.end = graph.add_node(Op::End, Mode::Control, Some(graph.end_block), vec![]);
        graph.bad = graph.add_node(Op::Bad, Mode::Control, Some(graph.start_block), vec![]);
        graph
    }

    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of function parameters.
    #[must_use]
    pub const fn param_count(&self) -> u32 {
        self.param_count
    }

    /// The entry block.
    #[must_use]
    pub const fn start_block(&self) -> NodeId {
        self.start_block
    }

    /// The exit block, whose predecessors are the `Return` nodes.
    #[must_use]
    pub const fn end_block(&self) -> NodeId {
        self.end_block
    }

    /// The `Start` node.
    #[must_use]
    pub const fn start(&self) -> NodeId {
        self.start
    }

    /// The `End` node.
    #[must_use]
    pub const fn end(&self) -> NodeId {
        self.end
    }

    /// The canonical `Bad` node.
    #[must_use]
    pub const fn bad(&self) -> NodeId {
        self.bad
    }

    /// Size of the arena, including retired slots.
    ///
    /// Every id handed out by this graph is below this bound, which makes it the right
    /// capacity for per-node side tables.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of nodes that have not been retired.
    #[must_use]
    pub fn active_node_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.is_deleted()).count()
    }

    /// Number of operand edges between nodes that have not been retired.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| !n.is_deleted())
            .map(|n| n.operands.len())
            .sum()
    }

    /// Ids of all nodes that have not been retired, in creation order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.is_deleted())
            .map(|(i, _)| NodeId(i))
    }

    /// Looks up a node, returning `None` for ids outside the arena.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Returns the node record.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this graph.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    /// Operation of a node.
    #[must_use]
    pub fn op(&self, id: NodeId) -> &Op {
        &self.nodes[id.0].op
    }

    /// Mode of a node.
    #[must_use]
    pub fn mode(&self, id: NodeId) -> Mode {
        self.nodes[id.0].mode
    }

    /// Containing block of a node, `None` for blocks.
    #[must_use]
    pub fn block_of(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].block
    }

    /// Ordered operands of a node.
    #[must_use]
    pub fn operands(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].operands
    }

    /// The `index`-th operand of a node.
    #[must_use]
    pub fn operand(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.nodes[id.0].operands.get(index).copied()
    }

    /// Users of a node, one entry per edge.
    #[must_use]
    pub fn users(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].users
    }

    /// Control predecessors of a block.
    #[must_use]
    pub fn preds(&self, block: NodeId) -> &[NodeId] {
        self.operands(block)
    }

    /// Returns `true` if the node has been retired.
    #[must_use]
    pub fn is_deleted(&self, id: NodeId) -> bool {
        self.nodes.get(id.0).is_none_or(Node::is_deleted)
    }

    /// Returns `true` if the node is a `Block`.
    #[must_use]
    pub fn is_block(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].op, Op::Block)
    }

    /// Returns `true` if the node is a `Phi`.
    #[must_use]
    pub fn is_phi(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].op, Op::Phi)
    }

    /// Returns `true` if the node is the canonical `Bad`.
    #[must_use]
    pub fn is_bad(&self, id: NodeId) -> bool {
        id == self.bad
    }

    /// The literal of a `Const` node.
    #[must_use]
    pub fn const_value(&self, id: NodeId) -> Option<ConstValue> {
        match self.nodes[id.0].op {
            Op::Const(value) => Some(value),
            _ => None,
        }
    }

    /// Finds the projection of `kind` hanging off a tuple node.
    #[must_use]
    pub fn proj(&self, tuple: NodeId, kind: ProjKind) -> Option<NodeId> {
        self.users(tuple)
            .iter()
            .copied()
            .find(|&user| self.nodes[user.0].op == Op::Proj(kind))
    }

    /// Keep-alive edges of the function.
    #[must_use]
    pub fn keep_alives(&self) -> &[NodeId] {
        self.operands(self.end)
    }

    /// Adds a keep-alive edge from `End` to `node`.
    pub fn keep_alive(&mut self, node: NodeId) {
        self.add_operand(self.end, node);
    }

    /// Appends a node to the arena and registers it as a user of its operands.
    pub fn add_node(
        &mut self,
        op: Op,
        mode: Mode,
        block: Option<NodeId>,
        operands: Vec<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        for &operand in &operands {
            self.nodes[operand.0].users.push(id);
        }
        self.nodes.push(Node::new(op, mode, block, operands));
        id
    }

    /// Replaces the `index`-th operand of `node`.
    pub fn set_operand(&mut self, node: NodeId, index: usize, new: NodeId) {
        let old = self.nodes[node.0].operands[index];
        if old == new {
            return;
        }
        self.remove_user(old, node);
        self.nodes[node.0].operands[index] = new;
        self.nodes[new.0].users.push(node);
    }

    /// Appends an operand to `node`.
    pub fn add_operand(&mut self, node: NodeId, operand: NodeId) {
        self.nodes[node.0].operands.push(operand);
        self.nodes[operand.0].users.push(node);
    }

    /// Removes the `index`-th operand of `node`, shifting the following operands down.
    pub fn remove_operand(&mut self, node: NodeId, index: usize) {
        let old = self.nodes[node.0].operands.remove(index);
        self.remove_user(old, node);
    }

    /// Replaces every use of `old` with `new` and retires `old`.
    ///
    /// This is the only way the passes substitute one node for another. Edges are
    /// re-pointed in place, so the positions of `old` in its users' operand lists are
    /// preserved for `new`.
    pub fn exchange(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        let mut users = std::mem::take(&mut self.nodes[old.0].users);
        users.sort_unstable();
        users.dedup();
        for user in users {
            let mut rewired = 0;
            for slot in &mut self.nodes[user.0].operands {
                if *slot == old {
                    *slot = new;
                    rewired += 1;
                }
            }
            for _ in 0..rewired {
                self.nodes[new.0].users.push(user);
            }
        }
        self.kill(old);
    }

    /// Retires a node: detaches it from its operands and marks it `Deleted`.
    ///
    /// The caller is responsible for the node having no remaining users; edges pointing at
    /// a retired node are dangling and fail verification.
    pub fn kill(&mut self, node: NodeId) {
        let operands = std::mem::take(&mut self.nodes[node.0].operands);
        for operand in operands {
            self.remove_user(operand, node);
        }
        self.nodes[node.0].op = Op::Deleted;
    }

    fn remove_user(&mut self, of: NodeId, user: NodeId) {
        let users = &mut self.nodes[of.0].users;
        if let Some(pos) = users.iter().position(|&u| u == user) {
            users.swap_remove(pos);
        }
    }

    /// Nodes reachable from the anchors. Everything else is garbage.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph has a dependency cycle without a `Phi` or `Block`.
    pub fn live_nodes(&self) -> Result<BitSet> {
        Ok(DependencyWalk::run(self)?.live)
    }

    /// Groups the given nodes by containing block, preserving id order within a block.
    #[must_use]
    pub fn members_by_block(&self, nodes: &BitSet) -> HashMap<NodeId, Vec<NodeId>> {
        let mut members: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for index in nodes.iter() {
            let id = NodeId(index);
            if let Some(block) = self.nodes[id.0].block {
                members.entry(block).or_default().push(id);
            }
        }
        members
    }

    /// Control flow successors of every block in `blocks`.
    ///
    /// A block `S` is a successor of `B` when one of `S`'s predecessor control nodes lives
    /// in `B`.
    #[must_use]
    pub fn cfg_successors(&self, blocks: &[NodeId]) -> HashMap<NodeId, Vec<NodeId>> {
        let mut successors: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for &block in blocks {
            for &pred in self.preds(block) {
                if pred == self.bad || self.is_deleted(pred) {
                    continue;
                }
                if let Some(source) = self.nodes[pred.0].block {
                    successors.entry(source).or_default().push(block);
                }
            }
        }
        successors
    }

    /// Blocks reachable from the entry along control edges, restricted to `blocks`.
    #[must_use]
    pub fn cfg_reachable(&self, blocks: &[NodeId]) -> BitSet {
        let successors = self.cfg_successors(blocks);
        let mut reached = BitSet::new(self.node_count());
        let mut stack = vec![self.start_block];
        reached.insert(self.start_block.0);
        while let Some(block) = stack.pop() {
            if let Some(next) = successors.get(&block) {
                for &succ in next {
                    if reached.insert(succ.0) {
                        stack.push(succ);
                    }
                }
            }
        }
        reached
    }
}

impl fmt::Display for FunctionGraph {
    /// Lists every active node as `id: op mode [block] (operands)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "function {} ({} params)", self.name, self.param_count)?;
        for id in self.ids() {
            let node = self.node(id);
            write!(f, "  {id}: {} {}", node.op, node.mode)?;
            if let Some(block) = node.block {
                write!(f, " [{block}]")?;
            }
            if !node.operands.is_empty() {
                let operands: Vec<String> = node.operands.iter().map(ToString::to_string).collect();
                write!(f, " ({})", operands.join(", "))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// All functions of a compilation unit.
#[derive(Debug, Clone, Default)]
pub struct Program {
    functions: Vec<FunctionGraph>,
}

impl Program {
    /// Creates an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a function.
    pub fn push(&mut self, graph: FunctionGraph) {
        self.functions.push(graph);
    }

    /// Number of functions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Returns `true` if the program has no functions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// All functions in insertion order.
    #[must_use]
    pub fn functions(&self) -> &[FunctionGraph] {
        &self.functions
    }

    /// Mutable access to all functions.
    pub fn functions_mut(&mut self) -> &mut [FunctionGraph] {
        &mut self.functions
    }

    /// Looks up a function by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FunctionGraph> {
        self.functions.iter().find(|f| f.name() == name)
    }

    /// Keeps only the functions for which `keep` returns `true`.
    pub fn retain(&mut self, keep: impl FnMut(&FunctionGraph) -> bool) {
        self.functions.retain(keep);
    }
}

impl FromIterator<FunctionGraph> for Program {
    fn from_iter<T: IntoIterator<Item = FunctionGraph>>(iter: T) -> Self {
        Self {
            functions: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BinaryOp;

    fn small_graph() -> (FunctionGraph, NodeId, NodeId, NodeId) {
        let mut graph = FunctionGraph::new("f", 0);
        let block = graph.start_block();
        let a = graph.add_node(Op::Const(ConstValue::I32(1)), Mode::I32, Some(block), vec![]);
        let b = graph.add_node(Op::Const(ConstValue::I32(2)), Mode::I32, Some(block), vec![]);
        let add = graph.add_node(Op::Binary(BinaryOp::Add), Mode::I32, Some(block), vec![a, a]);
        (graph, a, b, add)
    }

    #[test]
    fn test_anchors() {
        let graph = FunctionGraph::new("main", 2);
        assert_eq!(graph.name(), "main");
        assert_eq!(graph.param_count(), 2);
        assert!(graph.is_block(graph.start_block()));
        assert!(graph.is_block(graph.end_block()));
        assert_eq!(graph.block_of(graph.start()), Some(graph.start_block()));
        assert_eq!(graph.block_of(graph.end()), Some(graph.end_block()));
        assert!(graph.is_bad(graph.bad()));
        assert_eq!(graph.active_node_count(), 5);
    }

    #[test]
    fn test_users_track_operands() {
        let (mut graph, a, b, add) = small_graph();
        assert_eq!(graph.users(a), &[add, add]);
        graph.set_operand(add, 1, b);
        assert_eq!(graph.users(a), &[add]);
        assert_eq!(graph.users(b), &[add]);
        graph.remove_operand(add, 0);
        assert!(graph.users(a).is_empty());
        assert_eq!(graph.operands(add), &[b]);
    }

    #[test]
    fn test_exchange_rewires_every_edge() {
        let (mut graph, a, b, add) = small_graph();
        graph.exchange(a, b);
        assert_eq!(graph.operands(add), &[b, b]);
        assert_eq!(graph.users(b).len(), 2);
        assert!(graph.is_deleted(a));
        assert!(graph.users(a).is_empty());
    }

    #[test]
    fn test_kill_detaches_from_operands() {
        let (mut graph, a, _, add) = small_graph();
        graph.kill(add);
        assert!(graph.is_deleted(add));
        assert!(graph.users(a).is_empty());
        assert!(graph.operands(add).is_empty());
    }

    #[test]
    fn test_keep_alive() {
        let (mut graph, _, _, add) = small_graph();
        graph.keep_alive(add);
        assert_eq!(graph.keep_alives(), &[add]);
        assert_eq!(graph.users(add), &[graph.end()]);
    }

    #[test]
    fn test_edge_count_ignores_retired_nodes() {
        let (mut graph, _, _, add) = small_graph();
        assert_eq!(graph.edge_count(), 2);
        graph.kill(add);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_program_lookup() {
        let mut program = Program::new();
        program.push(FunctionGraph::new("main", 0));
        program.push(FunctionGraph::new("helper", 1));
        assert_eq!(program.len(), 2);
        assert_eq!(program.get("helper").map(FunctionGraph::param_count), Some(1));
        program.retain(|f| f.name() == "main");
        assert!(program.get("helper").is_none());
    }
}
