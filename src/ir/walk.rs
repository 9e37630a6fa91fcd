//! Dependency-order traversal of a function graph.
//!
//! The walk starts at `End` (then `Start` and `Bad`, so the entry block is always covered)
//! and emits a node only after its block and all of its operands, with one exception: `Phi`
//! and `Block` nodes are marked as visited when first entered rather than when finished.
//! They are the only kinds allowed on a dependency cycle (loop-carried values and loop
//! headers), so marking them early is what cuts every legal cycle.
//!
//! Any other node is visited only once all its inputs are done. The walk can come back to
//! such a node while it is still unfinished, for example a `Div` in a loop body that is
//! reached again along the memory chain through the header's memory phi. If the path back
//! passes a `Phi` or `Block`, the node is walked again from the top of the stack. The inner
//! visit finishes first and emits the node, and the outer visit then finds it done. Each
//! repeat needs a loop breaker entered since the previous one, so nesting is bounded. A
//! cycle made only of other kinds is malformed and aborts the walk.
//!
//! The set of nodes the walk reaches is the graph's *live* set. Nodes outside it are
//! garbage: nothing the function observes depends on them.

use crate::{
    ir::{FunctionGraph, NodeId},
    utils::BitSet,
    Result,
};

/// Result of a dependency-order walk.
#[derive(Debug, Clone)]
pub struct DependencyWalk {
    /// Live nodes in dependency order.
    pub order: Vec<NodeId>,
    /// Membership of `order`.
    pub live: BitSet,
    /// Edges `(user, target)` whose target is retired or outside the arena.
    ///
    /// The walk does not descend through them.
    pub dangling: Vec<(NodeId, NodeId)>,
}

impl DependencyWalk {
    /// Walks `graph` from its anchors.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a dependency cycle does not pass through a
    /// `Phi` or `Block` node.
    pub fn run(graph: &FunctionGraph) -> Result<Self> {
        let capacity = graph.node_count();
        let mut walk = Self {
            order: Vec::with_capacity(capacity),
            live: BitSet::new(capacity),
            dangling: Vec::new(),
        };
        let mut on_stack = BitSet::new(capacity);

        for root in [graph.end(), graph.start(), graph.bad()] {
            walk.visit_from(graph, root, &mut on_stack)?;
        }
        Ok(walk)
    }

    /// Inputs of `node` in visiting order: its block first, then its operands.
    fn input(graph: &FunctionGraph, node: NodeId, index: usize) -> Option<NodeId> {
        match graph.block_of(node) {
            Some(block) if index == 0 => Some(block),
            Some(_) => graph.operand(node, index - 1),
            None => graph.operand(node, index),
        }
    }

    fn visit_from(
        &mut self,
        graph: &FunctionGraph,
        root: NodeId,
        on_stack: &mut BitSet,
    ) -> Result<()> {
        if self.live.contains(root.index()) {
            return Ok(());
        }
        let mut stack: Vec<(NodeId, usize)> = Vec::new();
        self.enter(graph, root, on_stack, &mut stack);

        while let Some(top) = stack.last_mut() {
            let (node, index) = *top;
            top.1 += 1;
            match Self::input(graph, node, index) {
                Some(input) => {
                    if graph.is_deleted(input) {
                        self.dangling.push((node, input));
                        continue;
                    }
                    if self.live.contains(input.index()) {
                        continue;
                    }
                    if on_stack.contains(input.index())
                        && !Self::cycle_has_breaker(graph, &stack, input)
                    {
                        return Err(malformed_error!(
                            "dependency cycle through {} ({}) without a Phi or Block",
                            input,
                            graph.op(input)
                        ));
                    }
                    self.enter(graph, input, on_stack, &mut stack);
                }
                None => {
                    stack.pop();
                    if graph.op(node).is_loop_breaker() {
                        self.order.push(node);
                    } else if !self.live.contains(node.index()) {
                        // An inner visit of a repeated node may have emitted it already.
                        on_stack.remove(node.index());
                        self.live.insert(node.index());
                        self.order.push(node);
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns `true` if a loop breaker was entered after the innermost unfinished visit of
    /// `node`, so reaching `node` again closes a legal cycle.
    fn cycle_has_breaker(graph: &FunctionGraph, stack: &[(NodeId, usize)], node: NodeId) -> bool {
        stack
            .iter()
            .rev()
            .take_while(|&&(entered, _)| entered != node)
            .any(|&(entered, _)| graph.op(entered).is_loop_breaker())
    }

    fn enter(
        &mut self,
        graph: &FunctionGraph,
        node: NodeId,
        on_stack: &mut BitSet,
        stack: &mut Vec<(NodeId, usize)>,
    ) {
        // Loop breakers count as visited from the moment they are entered.
        if graph.op(node).is_loop_breaker() {
            self.live.insert(node.index());
        } else {
            on_stack.insert(node.index());
        }
        stack.push((node, 0));
    }
}
