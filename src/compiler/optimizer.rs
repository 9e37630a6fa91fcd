//! The optimizer driver.
//!
//! [`Optimizer::run`] applies the per-function passes to every function of a [`Program`]
//! (in parallel unless configured otherwise), verifies and optionally dumps each result,
//! and finally runs the global passes, which currently means unused-function removal.
//! Global passes are skipped when any graph failed verification.

use std::{
    fmt, fs,
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use rayon::prelude::*;

use crate::{
    compiler::{
        pass::GraphPass,
        passes::{ConstantPropagationPass, UnusedFunctionPass},
        CompilerContext, DerivedStats, EventKind, EventLog, OptimizerConfig,
    },
    ir::{to_dot, verify_graph, FunctionGraph, Program},
    Error, Result,
};

/// Outcome of an optimizer run.
#[derive(Debug)]
pub struct OptimizerReport {
    /// Whether any pass changed the program.
    pub changed: bool,
    /// Functions the per-function passes ran on, sorted.
    pub optimized: Vec<String>,
    /// Functions a pass changed, sorted.
    pub changed_functions: Vec<String>,
    /// Functions removed as unused, sorted.
    pub removed_functions: Vec<String>,
    /// DOT files written.
    pub dumps: Vec<PathBuf>,
    /// Everything the passes recorded.
    pub events: EventLog,
    /// Wall-clock time of the run.
    pub elapsed: Duration,
}

impl OptimizerReport {
    /// Counters derived from the events.
    #[must_use]
    pub fn stats(&self) -> DerivedStats {
        self.events.summary()
    }
}

impl fmt::Display for OptimizerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} functions optimized ({} changed, {} removed) in {:?}: {}",
            self.optimized.len(),
            self.changed_functions.len(),
            self.removed_functions.len(),
            self.elapsed,
            self.stats()
        )
    }
}

/// Runs the pass pipeline over a program.
pub struct Optimizer {
    config: OptimizerConfig,
    passes: Vec<Box<dyn GraphPass>>,
}

impl Optimizer {
    /// Creates the default pipeline for `config`.
    #[must_use]
    pub fn new(config: OptimizerConfig) -> Self {
        let mut passes: Vec<Box<dyn GraphPass>> = vec![Box::new(ConstantPropagationPass::new())];
        if config.remove_unused_functions {
            passes.push(Box::new(UnusedFunctionPass::new(config.entry_point.clone())));
        }
        Self { config, passes }
    }

    /// Creates a driver with a custom pass list.
    #[must_use]
    pub fn with_passes(config: OptimizerConfig, passes: Vec<Box<dyn GraphPass>>) -> Self {
        Self { config, passes }
    }

    /// Driver configuration.
    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Names of the configured passes, in pipeline order.
    pub fn pass_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.passes.iter().map(|pass| pass.name())
    }

    /// Optimizes every function of `program`.
    ///
    /// # Errors
    ///
    /// Returns the first pass error, an I/O error from writing a dump, or
    /// [`Error::VerificationFailed`] naming every function whose graph is not well-formed
    /// after optimization.
    pub fn run(&mut self, program: &mut Program) -> Result<OptimizerReport> {
        let mut ctx = CompilerContext::with_config(self.config.clone());
        let any_changed = AtomicBool::new(false);
        let dumps = boxcar::Vec::new();

        for pass in &mut self.passes {
            pass.initialize(&ctx)?;
        }

        let function_passes: Vec<&dyn GraphPass> = self
            .passes
            .iter()
            .filter(|pass| !pass.is_global())
            .map(|pass| &**pass)
            .collect();

        let optimize = |graph: &mut FunctionGraph| -> Result<()> {
            for pass in &function_passes {
                if !pass.should_run(graph, &ctx) {
                    continue;
                }
                if pass.run_on_function(graph, &ctx)? {
                    any_changed.store(true, Ordering::Relaxed);
                    ctx.mark_changed(graph.name());
                }
            }
            ctx.processed.insert(graph.name().to_string());

            if ctx.config.dump_graphs {
                let path = ctx.config.dump_dir.join(format!("{}-opt.dot", graph.name()));
                fs::write(&path, to_dot(graph)?)?;
                let _ = ctx
                    .events
                    .record(EventKind::GraphDumped)
                    .function(graph.name())
                    .message(path.display().to_string());
                dumps.push(path);
            }

            if ctx.config.verify_graphs {
                match verify_graph(graph) {
                    Ok(()) => {
                        let _ = ctx
                            .events
                            .record(EventKind::GraphVerified)
                            .function(graph.name());
                    }
                    Err(e) => {
                        ctx.failed_verification.insert(graph.name().to_string());
                        let _ = ctx
                            .events
                            .record(EventKind::Error)
                            .function(graph.name())
                            .message(e.to_string());
                    }
                }
            }
            Ok(())
        };

        if self.config.parallel {
            program.functions_mut().par_iter_mut().try_for_each(optimize)?;
        } else {
            program.functions_mut().iter_mut().try_for_each(optimize)?;
        }

        let failed = CompilerContext::sorted(&ctx.failed_verification);
        if !failed.is_empty() {
            return Err(Error::VerificationFailed(failed));
        }

        for pass in &self.passes {
            if pass.is_global() && pass.run_global(program, &ctx)? {
                any_changed.store(true, Ordering::Relaxed);
            }
        }

        for pass in &mut self.passes {
            pass.finalize(&ctx)?;
        }

        let mut dumps: Vec<PathBuf> = dumps.iter().map(|(_, path)| path.clone()).collect();
        dumps.sort();
        Ok(OptimizerReport {
            changed: any_changed.load(Ordering::Relaxed),
            optimized: CompilerContext::sorted(&ctx.processed),
            changed_functions: CompilerContext::sorted(&ctx.changed),
            removed_functions: CompilerContext::sorted(&ctx.removed_functions),
            dumps,
            elapsed: ctx.elapsed(),
            events: ctx.events.take(),
        })
    }
}

impl Default for Optimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}
