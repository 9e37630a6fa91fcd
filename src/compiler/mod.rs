//! Optimization passes and the driver running them.
//!
//! This module sits on top of the analyses:
//!
//! - [`crate::ir`] - graph representation, verification, dumps
//! - [`crate::analysis`] - worklist engine, lattice, constant propagation
//! - [`compiler`](self) - rewrites, passes, driver
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Optimizer Pipeline                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CompilerContext              Shared state of one run            │
//! │    ├─ processed / changed     (per-function bookkeeping)         │
//! │    ├─ failed_verification                                        │
//! │    └─ EventLog                                                   │
//! │                                                                  │
//! │  Optimizer                    Per-function passes in parallel,   │
//! │    ├─ dump + verify           then global passes                 │
//! │    └─ global passes           (skipped if verification failed)   │
//! │                                                                  │
//! │  GraphPass trait              Interface for all passes           │
//! │    ├─ run_on_function()       Per-function transformation        │
//! │    ├─ run_global()            Whole-program transformation       │
//! │    └─ initialize/finalize()                                      │
//! │                                                                  │
//! │  Passes                                                          │
//! │    ├─ ConstantPropagationPass analyze → substitute → cleanup     │
//! │    └─ UnusedFunctionPass      call-graph reachability            │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod context;
mod events;
mod optimizer;
mod pass;
pub mod passes;

pub use config::OptimizerConfig;
pub use context::CompilerContext;
pub use events::{DerivedStats, Event, EventBuilder, EventKind, EventLog};
pub use optimizer::{Optimizer, OptimizerReport};
pub use pass::GraphPass;
pub use passes::{ConstantPropagationPass, UnusedFunctionPass};
