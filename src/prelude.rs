//! # ssaprop Prelude
//!
//! The types needed to build, optimize, check and run function graphs.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all ssaprop operations
pub use crate::Error;

/// The result type used throughout ssaprop
pub use crate::Result;

/// Single-function entry point
pub use crate::run_constant_propagation;

// ================================================================================================
// Graph Model
// ================================================================================================

/// Graph, program and construction
pub use crate::ir::{FunctionBuilder, FunctionGraph, NodeId, Program};

/// Node operations and values
pub use crate::ir::{BinaryOp, ConstValue, Mode, Op, ProjKind, Relation};

/// Post-conditions, dumps and reference semantics
pub use crate::ir::{to_dot, verify, verify_graph, Effect, Execution, Interpreter, Outcome};

// ================================================================================================
// Analysis
// ================================================================================================

/// Constant propagation and its results
pub use crate::analysis::{AbstractValue, ConstantPropagation, EdgeMark, SccpResult};

// ================================================================================================
// Driver
// ================================================================================================

/// Optimizer driver, passes and logging
pub use crate::compiler::{
    ConstantPropagationPass, EventKind, EventLog, GraphPass, Optimizer, OptimizerConfig,
    OptimizerReport,
};
