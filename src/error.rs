use thiserror::Error;

use crate::ir::NodeId;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Nothing surfaced here is a user-facing diagnostic. Every variant describes a broken
/// compiler-internal invariant: a graph the optimizer cannot make sense of, a dataflow fact
/// that moved the wrong way, or a post-condition that no longer holds after rewriting.
///
/// # Error Categories
///
/// ## Configuration Errors
/// - [`Error::InvalidNode`] - A node kind the passes have no handler for was reached
/// - [`Error::Malformed`] - The graph does not have the shape the passes require
///
/// ## Internal Consistency Errors
/// - [`Error::LatticeViolation`] - An abstract value regressed during the fixpoint
/// - [`Error::InvalidGraph`] - A graph failed the `verify` post-condition check
/// - [`Error::VerificationFailed`] - The optimizer saw one or more graphs fail verification
/// - [`Error::CleanupDiverged`] - A third cleanup round still changed the graph
///
/// ## I/O Errors
/// - [`Error::FileError`] - Writing a graph dump failed
///
/// # Examples
///
/// ```rust
/// use ssaprop::{ir::FunctionBuilder, Error};
///
/// let graph = FunctionBuilder::new("empty", 0).finish();
/// match ssaprop::run_constant_propagation(graph) {
///     Ok(graph) => println!("optimized {}", graph.name()),
///     Err(Error::LatticeViolation { node, .. }) => eprintln!("regression at {node}"),
///     Err(e) => eprintln!("optimizer failed: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The graph is damaged and could not be processed.
    ///
    /// Raised for structural problems the passes cannot work around, such as a dependency
    /// cycle that does not pass through a `Phi` or `Block`. The error includes the source
    /// location where the malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A node kind without a handler was reached during a traversal.
    ///
    /// Dispatch is an exhaustive match, so the only way to get here is a retired
    /// (`Deleted`) node that is still reachable from the End node.
    #[error("No handler for node {node} ({op})")]
    InvalidNode {
        /// The offending node
        node: NodeId,
        /// Name of the node's operation
        op: &'static str,
    },

    /// A dataflow fact moved the wrong way.
    ///
    /// Abstract values may only move from `Unknown` towards `NotConstant`, and a control
    /// edge finalized as not taken may never become taken. A regression would void the
    /// termination bound of the fixpoint and is always fatal.
    #[error("Lattice violation at {node}: {old} -> {new}")]
    LatticeViolation {
        /// The node (or control edge) whose fact regressed
        node: NodeId,
        /// The fact stored before the update
        old: String,
        /// The fact the update attempted to store
        new: String,
    },

    /// A function graph failed well-formedness verification.
    #[error("Invalid graph '{function}' at {node:?}: {message}")]
    InvalidGraph {
        /// Name of the function the graph belongs to
        function: String,
        /// The first node found violating an invariant, if the violation is node-local
        node: Option<NodeId>,
        /// What was violated
        message: String,
    },

    /// The optimizer found graphs that failed verification after optimization.
    #[error("{} graph(s) failed verification: {}", .0.len(), .0.join(", "))]
    VerificationFailed(Vec<String>),

    /// A cleanup round after the second one still changed the graph.
    #[error("Cleanup of '{function}' did not converge after two rounds")]
    CleanupDiverged {
        /// Name of the function being cleaned up
        function: String,
    },

    /// File I/O error.
    ///
    /// Wraps standard I/O errors raised while writing graph dumps.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
