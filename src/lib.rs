// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0


#![doc(html_no_source)]
#![warn(missing_docs)]

//! # ssaprop
//!
//! Sparse conditional constant propagation (SCCP) with unreachable-branch and dead-code
//! elimination over a sea-of-nodes SSA graph.
//!
//! A function body is a [`FunctionGraph`](ir::FunctionGraph): an arena of nodes whose
//! operand edges carry data, memory and control dependencies. The optimizer runs a joint
//! fixpoint over abstract values and control-edge reachability, rewrites the graph with what
//! it proved, and removes whatever became dead.
//!
//! ## Features
//!
//! - **Optimistic analysis** - Values start `Unknown` and only climb the lattice, so loops
//!   and branches that agree on a constant still fold
//! - **Memory-aware rewriting** - Constant side-effecting nodes are spliced out of the
//!   memory chain without breaking its total order
//! - **Dead branch elimination** - Branches on constants become jumps, the dead arm and
//!   everything only it reached is removed
//! - **Verification** - A post-condition check for dangling edges, broken memory chains
//!   and unreachable blocks
//! - **Parallel driver** - Functions of a program are optimized in parallel with `rayon`
//!
//! ## Quick Start
//!
//! ```rust
//! use ssaprop::prelude::*;
//!
//! // x = 2; y = 3; return x + y;
//! let graph = FunctionBuilder::new("main", 0).build_with(|b| {
//!     let entry = b.entry_block();
//!     let mem = b.initial_memory();
//!     let x = b.const_i32(2);
//!     let y = b.const_i32(3);
//!     let z = b.binary(entry, BinaryOp::Add, x, y);
//!     b.ret(entry, mem, &[z]);
//! });
//!
//! let graph = ssaprop::run_constant_propagation(graph)?;
//! assert!(verify(&graph));
//!
//! let execution = Interpreter::new(&graph)?.run(&[])?;
//! assert_eq!(execution.outcome, Outcome::Returned(vec![ConstValue::I32(5)]));
//! # Ok::<(), ssaprop::Error>(())
//! ```
//!
//! ## Optimizing a Program
//!
//! ```rust
//! use ssaprop::prelude::*;
//!
//! let main = FunctionBuilder::new("main", 0).build_with(|b| {
//!     let entry = b.entry_block();
//!     let mem = b.initial_memory();
//!     let (mem, _) = b.call(entry, mem, "helper", &[], None);
//!     b.ret(entry, mem, &[]);
//! });
//! let helper = FunctionBuilder::new("helper", 0).build_with(|b| {
//!     let entry = b.entry_block();
//!     let mem = b.initial_memory();
//!     b.ret(entry, mem, &[]);
//! });
//! let unused = FunctionBuilder::new("unused", 0).build_with(|b| {
//!     let entry = b.entry_block();
//!     let mem = b.initial_memory();
//!     b.ret(entry, mem, &[]);
//! });
//!
//! let mut program: Program = [main, helper, unused].into_iter().collect();
//! let report = Optimizer::new(OptimizerConfig::default()).run(&mut program)?;
//! assert_eq!(report.removed_functions, vec!["unused"]);
//! println!("{report}");
//! # Ok::<(), ssaprop::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`ir`] - Graph model, builder, verification, interpreter and dumps
//! - [`analysis`] - Worklist engine, lattice, reachability tracking and SCCP
//! - [`compiler`] - Substitution, cleanup, passes and the optimizer driver
//! - [`utils`] - Shared data structures
//!
//! ## Error Handling
//!
//! Every error is a broken internal invariant rather than a user diagnostic:
//!
//! ```rust
//! use ssaprop::{ir::FunctionBuilder, Error};
//!
//! let graph = FunctionBuilder::new("f", 0).finish();
//! match ssaprop::run_constant_propagation(graph) {
//!     Ok(_) => {}
//!     Err(Error::LatticeViolation { node, old, new }) => eprintln!("{node}: {old} -> {new}"),
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```
//!
//! ## Development and Testing
//!
//! ### Fuzzing
//!
//! ```bash
//! cargo +nightly fuzz run sccp --release
//! ```
//!
//! ### Testing
//!
//! ```bash
//! cargo test
//! cargo bench
//! ```

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust
/// use ssaprop::prelude::*;
///
/// let graph = FunctionBuilder::new("f", 0).finish();
/// assert!(verify(&graph));
/// ```
pub mod prelude;

/// The sea-of-nodes graph model.
///
/// # Key Types
///
/// - [`ir::FunctionGraph`] - Node arena with adjacency queries and mutation primitives
/// - [`ir::FunctionBuilder`] - Construction API
/// - [`ir::Op`] / [`ir::Mode`] / [`ir::ConstValue`] - What a node does and produces
/// - [`ir::Interpreter`] - Reference semantics
///
/// # Main Functions
///
/// - [`ir::verify`] - Post-condition hook
/// - [`ir::to_dot`] - Graphviz dump
pub mod ir;

/// Dataflow analyses over function graphs.
///
/// - [`analysis::Worklist`] - Sparse worklist engine
/// - [`analysis::AbstractValue`] - The constant lattice
/// - [`analysis::ReachabilityTracker`] - Control edge marks
/// - [`analysis::ConstantPropagation`] - The joint fixpoint
pub mod analysis;

/// Graph rewriting passes and the optimizer driver.
pub mod compiler;

/// Shared data structures.
pub mod utils;

/// `ssaprop` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `ssaprop` Error type
///
/// Every variant describes a broken compiler-internal invariant.
pub use error::Error;

use crate::{
    compiler::{ConstantPropagationPass, EventLog},
    ir::FunctionGraph,
};

/// Runs constant propagation, substitution and cleanup on a single function.
///
/// The graph is taken by value, rewritten in place and handed back.
///
/// # Errors
///
/// Returns an error if the graph is malformed or an internal invariant breaks.
///
/// # Examples
///
/// ```rust
/// use ssaprop::ir::{FunctionBuilder, Relation};
///
/// // if (1 == 1) { return 10; } else { return 20; }
/// let graph = FunctionBuilder::new("f", 0).build_with(|b| {
///     let entry = b.entry_block();
///     let mem = b.initial_memory();
///     let one = b.const_i32(1);
///     let cmp = b.cmp(entry, Relation::Equal, one, one);
///     let (t, f) = b.cond(entry, cmp);
///     let then_block = b.block(&[t]);
///     let else_block = b.block(&[f]);
///     let ten = b.const_i32(10);
///     let twenty = b.const_i32(20);
///     b.ret(then_block, mem, &[ten]);
///     b.ret(else_block, mem, &[twenty]);
/// });
///
/// let graph = ssaprop::run_constant_propagation(graph)?;
/// assert_eq!(graph.preds(graph.end_block()).len(), 1);
/// # Ok::<(), ssaprop::Error>(())
/// ```
pub fn run_constant_propagation(mut graph: FunctionGraph) -> Result<FunctionGraph> {
    let pass = ConstantPropagationPass::new().with_sanity_check(cfg!(debug_assertions));
    pass.apply(&mut graph, &EventLog::new())?;
    Ok(graph)
}
