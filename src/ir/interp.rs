//! Reference interpreter for function graphs.
//!
//! Executes a graph block by block on concrete arguments and records everything an outside
//! observer could see: stores, calls, and how the function ended. Two graphs are
//! observably equivalent on an input when their [`Execution`]s are equal, which is how the
//! optimizer's rewrites are checked for soundness.
//!
//! # Semantics
//!
//! - Entering a block through predecessor `k` evaluates all of the block's phis at once
//!   from their `k`-th operands, then every other live member in dependency order.
//! - Memory is a map from integer addresses to values. Loads of unwritten addresses read
//!   zero.
//! - Calls are answered by a caller-supplied handler; [`Interpreter::run`] uses a fixed
//!   deterministic one.
//! - `Div`/`Mod` by zero (or `MIN / -1`) trap.
//! - Every block entry costs one unit of fuel. Running out ends the execution without a
//!   result, which keeps non-terminating functions comparable.

use std::collections::HashMap;

use crate::{
    ir::{ConstValue, DependencyWalk, FunctionGraph, Mode, NodeId, Op, ProjKind},
    Error, Result,
};

/// Default number of block entries before an execution is cut off.
pub const DEFAULT_FUEL: usize = 10_000;

/// An observable side effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// A value was written to memory.
    Store {
        /// Target address.
        address: i64,
        /// Stored value.
        value: ConstValue,
    },
    /// A function was called.
    Call {
        /// Callee name.
        callee: String,
        /// Argument values.
        args: Vec<ConstValue>,
    },
}

/// How an execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The function returned these values.
    Returned(Vec<ConstValue>),
    /// An integer division trapped.
    Trapped,
    /// The fuel bound was reached.
    OutOfFuel,
}

/// Observable behavior of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Side effects in program order.
    pub effects: Vec<Effect>,
    /// How the run ended.
    pub outcome: Outcome,
    /// Number of blocks entered.
    pub steps: usize,
}

/// Executes one function graph.
pub struct Interpreter<'g> {
    graph: &'g FunctionGraph,
    schedule: HashMap<NodeId, Vec<NodeId>>,
    phis: HashMap<NodeId, Vec<NodeId>>,
    fuel: usize,
}

impl<'g> Interpreter<'g> {
    /// Prepares a per-block schedule for `graph`.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph cannot be walked in dependency order.
    pub fn new(graph: &'g FunctionGraph) -> Result<Self> {
        let walk = DependencyWalk::run(graph)?;
        let mut schedule: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut phis: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for &node in &walk.order {
            let Some(block) = graph.block_of(node) else {
                continue;
            };
            if graph.is_phi(node) {
                if graph.mode(node).is_data() {
                    phis.entry(block).or_default().push(node);
                }
            } else {
                schedule.entry(block).or_default().push(node);
            }
        }
        Ok(Self {
            graph,
            schedule,
            phis,
            fuel: DEFAULT_FUEL,
        })
    }

    /// Sets the number of block entries allowed per run.
    #[must_use]
    pub fn with_fuel(mut self, fuel: usize) -> Self {
        self.fuel = fuel;
        self
    }

    /// Runs the function with the default call handler.
    ///
    /// The default handler returns the wrapping sum of the integer arguments plus the
    /// length of the callee name.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph is ill-formed or ill-typed at runtime.
    pub fn run(&self, args: &[ConstValue]) -> Result<Execution> {
        self.run_with(args, &mut |callee, values| {
            let sum = values
                .iter()
                .fold(callee.len() as i64, |acc, v| acc.wrapping_add(v.as_i64()));
            ConstValue::I64(sum)
        })
    }

    /// Runs the function, answering calls with `handler`.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph is ill-formed or ill-typed at runtime.
    pub fn run_with(
        &self,
        args: &[ConstValue],
        handler: &mut dyn FnMut(&str, &[ConstValue]) -> ConstValue,
    ) -> Result<Execution> {
        let graph = self.graph;
        let mut env: Vec<Option<ConstValue>> = vec![None; graph.node_count()];
        let mut memory: HashMap<i64, ConstValue> = HashMap::new();
        let mut effects = Vec::new();
        let mut block = graph.start_block();
        let mut entered_through: Option<usize> = None;
        let mut steps = 0;

        let finish = |effects: Vec<Effect>, outcome: Outcome, steps: usize| Execution {
            effects,
            outcome,
            steps,
        };

        loop {
            if steps == self.fuel {
                return Ok(finish(effects, Outcome::OutOfFuel, steps));
            }
            steps += 1;

            if let (Some(k), Some(phis)) = (entered_through, self.phis.get(&block)) {
                let incoming: Vec<Option<ConstValue>> = phis
                    .iter()
                    .map(|&phi| graph.operand(phi, k).and_then(|v| env[v.index()]))
                    .collect();
                for (&phi, value) in phis.iter().zip(incoming) {
                    env[phi.index()] = Some(value.ok_or_else(|| undefined(phi))?);
                }
            }

            let mut exit = None;
            for &node in self.schedule.get(&block).map_or(&[][..], Vec::as_slice) {
                let value = |i: usize| -> Result<ConstValue> {
                    let operand = graph
                        .operand(node, i)
                        .ok_or_else(|| malformed_error!("{} lacks operand {}", node, i))?;
                    env[operand.index()].ok_or_else(|| undefined(operand))
                };
                let mode = graph.mode(node);
                let result = match graph.op(node) {
                    Op::Const(v) => Some(*v),
                    Op::Proj(ProjKind::Arg(i)) => {
                        let arg = args
                            .get(*i as usize)
                            .ok_or_else(|| Error::Error(format!("missing argument {i}")))?;
                        Some(converted(node, *arg, mode)?)
                    }
                    Op::Proj(ProjKind::Res) => Some(converted(node, value(0)?, mode)?),
                    Op::Proj(kind @ (ProjKind::True | ProjKind::False)) => {
                        let selected = value(0)?.as_bool().ok_or_else(|| ill_typed(node))?;
                        if kind.arm_value() == Some(selected) {
                            exit = Some(node);
                        }
                        None
                    }
                    Op::Binary(op) => Some(op.eval(&value(0)?, &value(1)?).ok_or_else(|| ill_typed(node))?),
                    Op::Cmp(relation) => {
                        let holds = value(0)?
                            .compare(*relation, &value(1)?)
                            .ok_or_else(|| ill_typed(node))?;
                        Some(ConstValue::Bool(holds))
                    }
                    Op::Minus => Some(value(0)?.negate().ok_or_else(|| ill_typed(node))?),
                    Op::Not => Some(value(0)?.bitwise_not().ok_or_else(|| ill_typed(node))?),
                    Op::Conv => Some(converted(node, value(0)?, mode)?),
                    Op::Cond => Some(value(0)?),
                    Op::Div | Op::Mod => {
                        let (left, right) = (value(1)?, value(2)?);
                        let quotient = if graph.op(node) == &Op::Div {
                            left.div(&right)
                        } else {
                            left.rem(&right)
                        };
                        match quotient {
                            Some(q) => Some(q),
                            None => return Ok(finish(effects, Outcome::Trapped, steps)),
                        }
                    }
                    Op::Load => {
                        let address = value(1)?.as_i64();
                        Some(memory.get(&address).copied().unwrap_or(ConstValue::I64(0)))
                    }
                    Op::Store => {
                        let (address, stored) = (value(1)?.as_i64(), value(2)?);
                        memory.insert(address, stored);
                        effects.push(Effect::Store {
                            address,
                            value: stored,
                        });
                        None
                    }
                    Op::Call(callee) => {
                        let values = (1..graph.operands(node).len())
                            .map(value)
                            .collect::<Result<Vec<_>>>()?;
                        let answer = handler(callee.as_str(), &values);
                        effects.push(Effect::Call {
                            callee: callee.clone(),
                            args: values,
                        });
                        Some(answer)
                    }
                    Op::Return => {
                        let values = (1..graph.operands(node).len())
                            .map(value)
                            .collect::<Result<Vec<_>>>()?;
                        return Ok(finish(effects, Outcome::Returned(values), steps));
                    }
                    Op::Jmp => {
                        exit = Some(node);
                        None
                    }
                    Op::Proj(ProjKind::Mem) | Op::Start | Op::End | Op::Bad => None,
                    Op::Phi | Op::Block => None,
                    Op::Deleted => {
                        return Err(Error::InvalidNode {
                            node,
                            op: graph.op(node).name(),
                        })
                    }
                };
                if result.is_some() {
                    env[node.index()] = result;
                }
            }

            let Some(edge) = exit else {
                return Err(malformed_error!("block {} has no control exit", block));
            };
            let successor = graph
                .users(edge)
                .iter()
                .copied()
                .find(|&u| graph.is_block(u))
                .ok_or_else(|| malformed_error!("control edge {} leads nowhere", edge))?;
            entered_through = graph.preds(successor).iter().position(|&p| p == edge);
            block = successor;
        }
    }
}

fn converted(node: NodeId, value: ConstValue, mode: Mode) -> Result<ConstValue> {
    value.convert_to(mode).ok_or_else(|| ill_typed(node))
}

fn undefined(node: NodeId) -> Error {
    Error::Error(format!("value of {node} used before definition"))
}

fn ill_typed(node: NodeId) -> Error {
    Error::Error(format!("operands of {node} are ill-typed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, FunctionBuilder, Relation};

    #[test]
    fn test_straight_line() {
        let graph = FunctionBuilder::new("f", 1).build_with(|b| {
            let entry = b.entry_block();
            let mem = b.initial_memory();
            let x = b.arg(0, Mode::I32);
            let three = b.const_i32(3);
            let prod = b.binary(entry, BinaryOp::Mul, x, three);
            b.ret(entry, mem, &[prod]);
        });
        let run = Interpreter::new(&graph)
            .unwrap()
            .run(&[ConstValue::I32(7)])
            .unwrap();
        assert_eq!(run.outcome, Outcome::Returned(vec![ConstValue::I32(21)]));
        assert!(run.effects.is_empty());
        assert_eq!(run.steps, 1);
    }

    #[test]
    fn test_branch_and_phi() {
        let graph = FunctionBuilder::new("abs", 1).build_with(|b| {
            let entry = b.entry_block();
            let mem = b.initial_memory();
            let x = b.arg(0, Mode::I32);
            let zero = b.const_i32(0);
            let cmp = b.cmp(entry, Relation::Less, x, zero);
            let (t, f) = b.cond(entry, cmp);
            let neg_block = b.block(&[t]);
            let neg = b.unary(neg_block, Op::Minus, x);
            let j = b.jmp(neg_block);
            let join = b.block(&[j, f]);
            let phi = b.phi(join, &[neg, x], Mode::I32);
            b.ret(join, mem, &[phi]);
        });
        let interp = Interpreter::new(&graph).unwrap();
        for (input, expected) in [(-5, 5), (4, 4)] {
            let run = interp.run(&[ConstValue::I32(input)]).unwrap();
            assert_eq!(run.outcome, Outcome::Returned(vec![ConstValue::I32(expected)]));
        }
    }

    #[test]
    fn test_effects_and_trap() {
        let graph = FunctionBuilder::new("f", 1).build_with(|b| {
            let entry = b.entry_block();
            let mem = b.initial_memory();
            let x = b.arg(0, Mode::I32);
            let addr = b.const_i32(16);
            let m1 = b.store(entry, mem, addr, x);
            let hundred = b.const_i32(100);
            let (m2, q) = b.div(entry, m1, hundred, x);
            let (m3, _) = b.call(entry, m2, "print", &[q], None);
            b.ret(entry, m3, &[]);
        });
        let interp = Interpreter::new(&graph).unwrap();

        let ok = interp.run(&[ConstValue::I32(4)]).unwrap();
        assert_eq!(
            ok.effects,
            vec![
                Effect::Store {
                    address: 16,
                    value: ConstValue::I32(4)
                },
                Effect::Call {
                    callee: "print".into(),
                    args: vec![ConstValue::I32(25)]
                },
            ]
        );
        assert_eq!(ok.outcome, Outcome::Returned(vec![]));

        let trapped = interp.run(&[ConstValue::I32(0)]).unwrap();
        assert_eq!(trapped.outcome, Outcome::Trapped);
        assert_eq!(trapped.effects.len(), 1);
    }

    #[test]
    fn test_endless_loop_runs_out_of_fuel() {
        let graph = FunctionBuilder::new("spin", 0).build_with(|b| {
            let entry = b.entry_block();
            let enter = b.jmp(entry);
            let header = b.block(&[enter]);
            let back = b.jmp(header);
            b.add_pred(header, back);
            b.keep_alive(header);
        });
        let run = Interpreter::new(&graph)
            .unwrap()
            .with_fuel(50)
            .run(&[])
            .unwrap();
        assert_eq!(run.outcome, Outcome::OutOfFuel);
        assert_eq!(run.steps, 50);
    }
}
