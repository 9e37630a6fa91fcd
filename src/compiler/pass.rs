//! The pass trait of the optimizer pipeline.

use crate::{
    compiler::CompilerContext,
    ir::{FunctionGraph, Program},
    Result,
};

/// An optimization pass over function graphs.
///
/// All passes must be thread-safe (Send + Sync) so the driver can run them on several
/// functions at once. Passes receive mutable access to one graph and shared access to the
/// [`CompilerContext`].
pub trait GraphPass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Should this pass run on `graph`?
    ///
    /// Called before `run_on_function`.
    fn should_run(&self, _graph: &FunctionGraph, _ctx: &CompilerContext) -> bool {
        true
    }

    /// Run the pass on a single function.
    ///
    /// Returns `true` if any changes were made. Events should be recorded directly to
    /// `ctx.events`.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass hits a broken internal invariant.
    fn run_on_function(&self, graph: &mut FunctionGraph, ctx: &CompilerContext) -> Result<bool>;

    /// Run on the whole program (for interprocedural passes).
    ///
    /// # Errors
    ///
    /// Returns an error if the pass fails to process the program.
    fn run_global(&self, _program: &mut Program, _ctx: &CompilerContext) -> Result<bool> {
        Ok(false)
    }

    /// Does this pass operate on the whole program?
    ///
    /// Global passes have `run_global` called instead of `run_on_function`.
    fn is_global(&self) -> bool {
        false
    }

    /// Called once before the pass runs.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    fn initialize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }

    /// Called once after the pass completes.
    ///
    /// # Errors
    ///
    /// Returns an error if finalization fails.
    fn finalize(&mut self, _ctx: &CompilerContext) -> Result<()> {
        Ok(())
    }

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
