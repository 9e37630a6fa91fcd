//! Sea-of-nodes SSA representation of functions.
//!
//! A function is a graph of [`Node`]s stored in an arena and addressed by [`NodeId`]. There
//! is no instruction list: data dependencies are operand edges, basic blocks are `Block`
//! nodes whose operands are the incoming control edges, and side effects are ordered by an
//! explicit memory value threaded through every node that reads or writes memory.
//!
//! # Architecture
//!
//! - [`node`], [`ops`], [`mode`], [`value`] - What a node is: identity, operation, value
//!   kind, and the concrete constants it may carry
//! - [`graph`] - The [`FunctionGraph`] arena with its adjacency queries and mutation
//!   primitives, and the [`Program`] holding all functions
//! - [`builder`] - [`FunctionBuilder`], the construction API
//! - [`walk`] - Dependency-order traversal and liveness
//! - [`verify`](mod@verify) - Well-formedness checks run after optimization
//! - [`interp`] - Reference interpreter for differential testing
//! - [`dot`] - Graphviz rendering

pub mod builder;
pub mod dot;
pub mod graph;
pub mod interp;
pub mod mode;
pub mod node;
pub mod ops;
pub mod value;
pub mod verify;
pub mod walk;

pub use builder::FunctionBuilder;
pub use dot::{escape_dot, to_dot};
pub use graph::{FunctionGraph, Program};
pub use interp::{Effect, Execution, Interpreter, Outcome};
pub use mode::Mode;
pub use node::{Node, NodeId};
pub use ops::{BinaryOp, Op, OpFlags, ProjKind, Relation};
pub use value::ConstValue;
pub use verify::{verify, verify_graph};
pub use walk::DependencyWalk;
