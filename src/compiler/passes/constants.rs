//! Sparse conditional constant propagation pass.
//!
//! Runs [`ConstantPropagation`] on a function, applies the result with
//! [`substitute`](super::substitute::substitute), and removes what became dead with
//! [`cleanup`](super::cleanup::cleanup). The analysis only reads the graph; all rewriting
//! happens after it converged.

use crate::{
    analysis::ConstantPropagation,
    compiler::{
        pass::GraphPass,
        passes::{cleanup::cleanup, substitute::substitute},
        CompilerContext, EventKind, EventLog,
    },
    ir::FunctionGraph,
    Result,
};

/// Constant propagation with unreachable-branch and dead-code elimination.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantPropagationPass {
    sanity_check: bool,
    trace_values: bool,
}

impl ConstantPropagationPass {
    /// Creates a pass without the third cleanup round and without value tracing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails with [`Error::CleanupDiverged`](crate::Error::CleanupDiverged) if a third cleanup
    /// round would still change the graph.
    #[must_use]
    pub fn with_sanity_check(mut self, enabled: bool) -> Self {
        self.sanity_check = enabled;
        self
    }

    /// Records every abstract value update as an info event.
    #[must_use]
    pub fn with_trace(mut self, enabled: bool) -> Self {
        self.trace_values = enabled;
        self
    }

    /// Optimizes `graph`, recording into `events`. Returns `true` if the graph changed.
    ///
    /// # Errors
    ///
    /// Returns an error on a lattice violation, an illegal dependency cycle, a retired
    /// node reachable from `End`, or a diverging cleanup.
    pub fn apply(&self, graph: &mut FunctionGraph, events: &EventLog) -> Result<bool> {
        let result = ConstantPropagation::analyze_with(graph, self.trace_values)?;

        if let Some(trace) = result.trace() {
            for (node, value) in trace {
                events
                    .record(EventKind::Info)
                    .at(graph.name(), *node)
                    .pass(self.name())
                    .message(format!("value -> {value}"));
            }
        }

        let substituted = substitute(graph, &result, events, self.name())?;
        let cleaned = cleanup(graph, events, self.sanity_check)?;

        let stats = result.stats();
        events
            .record(EventKind::Info)
            .function(graph.name())
            .pass(self.name())
            .message(format!(
                "{} constants, {} reachable blocks, {} visits",
                result.constant_count(),
                result.reachable_block_count(),
                stats.visits
            ));

        Ok(substituted.changed() || cleaned.changed())
    }
}

impl GraphPass for ConstantPropagationPass {
    fn name(&self) -> &'static str {
        "constant-propagation"
    }

    fn description(&self) -> &'static str {
        "Sparse conditional constant propagation with dead branch and dead code elimination"
    }

    fn initialize(&mut self, ctx: &CompilerContext) -> Result<()> {
        self.sanity_check = ctx.config.cleanup_sanity_check;
        self.trace_values = ctx.config.trace_values;
        Ok(())
    }

    fn run_on_function(&self, graph: &mut FunctionGraph, ctx: &CompilerContext) -> Result<bool> {
        let _ = ctx
            .events
            .record(EventKind::PassStarted)
            .function(graph.name())
            .pass(self.name());

        let changes = EventLog::new();
        let changed = self.apply(graph, &changes)?;
        ctx.events.merge(changes);

        let _ = ctx
            .events
            .record(EventKind::PassCompleted)
            .function(graph.name())
            .pass(self.name());
        Ok(changed)
    }
}
