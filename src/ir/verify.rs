//! Well-formedness checks for function graphs.
//!
//! [`verify`] is the post-condition hook the optimizer driver runs after each function is
//! optimized; [`verify_graph`] is the same check reporting what failed. Only nodes live
//! from `End` are checked, since garbage nodes are invisible to every later stage.
//!
//! Checked invariants:
//!
//! 1. no edge points at a retired node or outside the arena
//! 2. user lists mirror operand lists
//! 3. block predecessors are control nodes and never `Bad`; `Return` only enters the end block
//! 4. every phi has one operand per predecessor of its block
//! 5. memory forms a single chain: memory operands have memory mode, no two side-effecting
//!    nodes of one block consume the same memory value, and every side-effecting tuple
//!    has exactly one memory projection
//! 6. every live block except the end block is reachable from the entry

use std::collections::HashMap;

use crate::{
    ir::{DependencyWalk, FunctionGraph, Mode, NodeId, Op, ProjKind},
    Error, Result,
};

/// Returns `true` if the graph satisfies every well-formedness invariant.
#[must_use]
pub fn verify(graph: &FunctionGraph) -> bool {
    verify_graph(graph).is_ok()
}

/// Checks every well-formedness invariant, reporting the first violation.
///
/// # Errors
///
/// Returns [`Error::InvalidGraph`] naming the offending node.
pub fn verify_graph(graph: &FunctionGraph) -> Result<()> {
    let walk = DependencyWalk::run(graph).map_err(|e| invalid(graph, None, e.to_string()))?;
    if let Some(&(user, target)) = walk.dangling.first() {
        return Err(invalid(
            graph,
            Some(user),
            format!("edge to retired node {target}"),
        ));
    }

    let mut memory_consumers: HashMap<(NodeId, NodeId), NodeId> = HashMap::new();
    let mut blocks = Vec::new();

    for &node in &walk.order {
        check_users(graph, node)?;

        let op = graph.op(node);
        match op {
            Op::Block => {
                check_preds(graph, node)?;
                blocks.push(node);
            }
            Op::Phi => {
                let block = graph.block_of(node).filter(|&b| graph.is_block(b));
                let Some(block) = block else {
                    return Err(invalid(graph, Some(node), "phi outside a block"));
                };
                let (arity, preds) = (graph.operands(node).len(), graph.preds(block).len());
                if arity != preds {
                    return Err(invalid(
                        graph,
                        Some(node),
                        format!("phi has {arity} operands but its block has {preds} predecessors"),
                    ));
                }
            }
            Op::Cond => {
                let selector = graph.operand(node, 0);
                if selector.map(|s| graph.mode(s)) != Some(Mode::Bool) {
                    return Err(invalid(graph, Some(node), "selector is not a boolean"));
                }
            }
            _ => {}
        }

        if op.uses_memory() {
            let Some(mem) = graph
                .operand(node, 0)
                .filter(|&m| graph.mode(m) == Mode::Memory)
            else {
                return Err(invalid(graph, Some(node), "memory operand missing"));
            };
            if let Some(block) = graph.block_of(node) {
                if let Some(other) = memory_consumers.insert((block, mem), node) {
                    return Err(invalid(
                        graph,
                        Some(node),
                        format!("memory chain forks: {other} and {node} both consume {mem}"),
                    ));
                }
            }
        }

        if op.produces_memory() {
            let projections = graph
                .users(node)
                .iter()
                .filter(|&&u| graph.op(u) == &Op::Proj(ProjKind::Mem))
                .count();
            if projections != 1 {
                return Err(invalid(
                    graph,
                    Some(node),
                    format!("expected one memory projection, found {projections}"),
                ));
            }
        }
    }

    let reachable = graph.cfg_reachable(&blocks);
    if let Some(&block) = blocks
        .iter()
        .find(|&&b| b != graph.end_block() && !reachable.contains(b.index()))
    {
        return Err(invalid(graph, Some(block), "block unreachable from entry"));
    }

    Ok(())
}

fn check_users(graph: &FunctionGraph, node: NodeId) -> Result<()> {
    for &operand in graph.operands(node) {
        let edges = graph.operands(node).iter().filter(|&&o| o == operand).count();
        let recorded = graph.users(operand).iter().filter(|&&u| u == node).count();
        if edges != recorded {
            return Err(invalid(
                graph,
                Some(node),
                format!("{edges} edge(s) to {operand} but {recorded} user entries"),
            ));
        }
    }
    Ok(())
}

fn check_preds(graph: &FunctionGraph, block: NodeId) -> Result<()> {
    for &pred in graph.preds(block) {
        if graph.is_bad(pred) {
            return Err(invalid(graph, Some(block), "dead control edge left behind"));
        }
        let ok = match graph.op(pred) {
            Op::Jmp => true,
            Op::Proj(kind) => kind.is_branch_arm(),
            Op::Return => block == graph.end_block(),
            _ => false,
        };
        if !ok {
            return Err(invalid(
                graph,
                Some(block),
                format!("{pred} ({}) is not a valid control predecessor", graph.op(pred)),
            ));
        }
    }
    Ok(())
}

fn invalid(graph: &FunctionGraph, node: Option<NodeId>, message: impl Into<String>) -> Error {
    Error::InvalidGraph {
        function: graph.name().to_string(),
        node,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, FunctionBuilder, Relation};

    fn diamond() -> FunctionGraph {
        FunctionBuilder::new("diamond", 1).build_with(|b| {
            let entry = b.entry_block();
            let mem = b.initial_memory();
            let x = b.arg(0, Mode::I32);
            let zero = b.const_i32(0);
            let one = b.const_i32(1);
            let two = b.const_i32(2);
            let cmp = b.cmp(entry, Relation::Greater, x, zero);
            let (t, f) = b.cond(entry, cmp);
            let then_block = b.block(&[t]);
            let j1 = b.jmp(then_block);
            let else_block = b.block(&[f]);
            let j2 = b.jmp(else_block);
            let join = b.block(&[j1, j2]);
            let phi = b.phi(join, &[one, two], Mode::I32);
            let sum = b.binary(join, BinaryOp::Add, phi, x);
            b.ret(join, mem, &[sum]);
        })
    }

    #[test]
    fn test_well_formed_graph_verifies() {
        assert!(verify(&diamond()));
        assert!(verify(&FunctionBuilder::new("empty", 0).finish()));
    }

    #[test]
    fn test_phi_arity_mismatch() {
        let mut graph = diamond();
        let phi = graph.ids().find(|&n| graph.is_phi(n)).unwrap();
        graph.remove_operand(phi, 1);
        let err = verify_graph(&graph).unwrap_err();
        assert!(matches!(err, Error::InvalidGraph { node: Some(n), .. } if n == phi));
    }

    #[test]
    fn test_bad_predecessor_rejected() {
        let mut graph = diamond();
        let join = graph
            .ids()
            .find(|&n| graph.is_block(n) && graph.preds(n).len() == 2)
            .unwrap();
        let bad = graph.bad();
        graph.set_operand(join, 1, bad);
        assert!(!verify(&graph));
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let mut graph = diamond();
        let add = graph
            .ids()
            .find(|&n| graph.op(n) == &Op::Binary(BinaryOp::Add))
            .unwrap();
        let phi = graph.operand(add, 0).unwrap();
        // Retire the phi without rewiring its user.
        let operands = graph.operands(phi).len();
        for _ in 0..operands {
            graph.remove_operand(phi, 0);
        }
        graph.kill(phi);
        let err = verify_graph(&graph).unwrap_err();
        assert!(err.to_string().contains("retired"));
    }

    #[test]
    fn test_memory_fork_rejected() {
        let graph = FunctionBuilder::new("fork", 0).build_with(|b| {
            let entry = b.entry_block();
            let mem = b.initial_memory();
            let one = b.const_i32(1);
            let (m1, _) = b.call(entry, mem, "a", &[one], None);
            let (_, r) = b.call(entry, mem, "b", &[one], Some(Mode::I32));
            b.ret(entry, m1, &[r.unwrap()]);
        });
        let err = verify_graph(&graph).unwrap_err();
        assert!(err.to_string().contains("forks"));
    }

    #[test]
    fn test_unreachable_block_rejected() {
        let graph = FunctionBuilder::new("island", 0).build_with(|b| {
            let entry = b.entry_block();
            let mem = b.initial_memory();
            b.ret(entry, mem, &[]);
            let island = b.block(&[]);
            let j = b.jmp(island);
            let target = b.block(&[j]);
            b.keep_alive(target);
        });
        let err = verify_graph(&graph).unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }
}
