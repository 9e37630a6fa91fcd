//! Optimization passes and the graph rewrites they are built from.

pub mod cleanup;
pub mod constants;
pub mod substitute;
pub mod unused;

pub use cleanup::{cleanup, remove_dead_edges, remove_unreachable_code, CleanupStats};
pub use constants::ConstantPropagationPass;
pub use substitute::{substitute, Substitution, SubstitutionStats};
pub use unused::UnusedFunctionPass;
