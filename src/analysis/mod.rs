//! Dataflow analysis over function graphs.
//!
//! # Architecture
//!
//! - [`lattice`] - The [`AbstractValue`] lattice and the [`MeetLattice`] trait
//! - [`worklist`] - The sparse worklist engine every analysis is driven by
//! - [`reachability`] - Control edge marks and block reachability
//! - [`sccp`] - Sparse conditional constant propagation, joining the two above
//!
//! The analyses only read the graph. Rewriting it according to their results is the job of
//! the passes in [`crate::compiler`].
//!
//! # Usage
//!
//! ```rust
//! use ssaprop::analysis::{AbstractValue, ConstantPropagation};
//! use ssaprop::ir::{FunctionBuilder, Mode};
//!
//! let mut arg = None;
//! let graph = FunctionBuilder::new("id", 1).build_with(|b| {
//!     let entry = b.entry_block();
//!     let x = b.arg(0, Mode::I32);
//!     let mem = b.initial_memory();
//!     b.ret(entry, mem, &[x]);
//!     arg = Some(x);
//! });
//!
//! let result = ConstantPropagation::analyze(&graph)?;
//! assert_eq!(result.value(arg.unwrap()), Some(&AbstractValue::NotConstant));
//! # Ok::<(), ssaprop::Error>(())
//! ```

pub mod lattice;
pub mod reachability;
pub mod sccp;
pub mod worklist;

pub use lattice::{AbstractValue, MeetLattice};
pub use reachability::{EdgeMark, ReachabilityTracker};
pub use sccp::{ConstantPropagation, SccpResult};
pub use worklist::{Worklist, WorklistPass, WorklistStats};
