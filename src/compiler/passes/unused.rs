//! Removal of functions not reachable from the entry point.
//!
//! Call targets are collected from the live `Call` nodes of every function in parallel,
//! then a worklist walks the call graph from the entry point. Functions never reached are
//! removed from the program. Calls to names the program does not define are ignored.
//!
//! Functions are numbered by their position in the program, so the call graph walk has the
//! same shape as the node worklist in [`analysis::worklist`](crate::analysis::worklist): a
//! FIFO of positions and a [`BitSet`] of the ones already reached. The node [`Worklist`]
//! itself does not fit here. It is keyed by [`NodeId`] and lets a node be queued again once
//! popped, while a function is visited at most once.
//!
//! [`Worklist`]: crate::analysis::Worklist

use std::collections::{HashMap, HashSet, VecDeque};

use dashmap::DashMap;
use rayon::prelude::*;

use crate::{
    compiler::{pass::GraphPass, CompilerContext, EventKind},
    ir::{FunctionGraph, NodeId, Op, Program},
    utils::BitSet,
    Result,
};

/// Removes functions the entry point can never call.
#[derive(Debug, Clone, Default)]
pub struct UnusedFunctionPass {
    entry_point: String,
}

impl UnusedFunctionPass {
    /// Creates a pass rooted at `entry_point`.
    #[must_use]
    pub fn new(entry_point: impl Into<String>) -> Self {
        Self {
            entry_point: entry_point.into(),
        }
    }

    /// Names called by the live `Call` nodes of `graph`, in node order.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph contains an illegal dependency cycle.
    pub fn callees(graph: &FunctionGraph) -> Result<Vec<String>> {
        let live = graph.live_nodes()?;
        let mut names = Vec::new();
        for index in live.iter() {
            if let Op::Call(callee) = graph.op(NodeId::new(index)) {
                if !names.contains(callee) {
                    names.push(callee.clone());
                }
            }
        }
        Ok(names)
    }

    /// Names of the functions reachable from the entry point, or `None` if the program
    /// has no function of that name.
    ///
    /// # Errors
    ///
    /// Returns an error if a graph contains an illegal dependency cycle.
    pub fn reachable(&self, program: &Program) -> Result<Option<HashSet<String>>> {
        if program.get(&self.entry_point).is_none() {
            return Ok(None);
        }

        let functions = program.functions();
        let position: HashMap<&str, usize> = functions
            .iter()
            .enumerate()
            .map(|(index, graph)| (graph.name(), index))
            .collect();

        let calls: DashMap<usize, Vec<usize>> = DashMap::new();
        functions.par_iter().enumerate().try_for_each(|(index, graph)| {
            let callees = Self::callees(graph)?
                .iter()
                .filter_map(|callee| position.get(callee.as_str()).copied())
                .collect();
            calls.insert(index, callees);
            Ok::<(), crate::Error>(())
        })?;

        let mut reached = BitSet::new(functions.len());
        let mut queue = VecDeque::new();
        if let Some(&entry) = position.get(self.entry_point.as_str()) {
            reached.insert(entry);
            queue.push_back(entry);
        }
        while let Some(index) = queue.pop_front() {
            let Some(callees) = calls.get(&index) else {
                continue;
            };
            for &callee in callees.iter() {
                if reached.insert(callee) {
                    queue.push_back(callee);
                }
            }
        }
        let reached = reached
            .iter()
            .map(|index| functions[index].name().to_string())
            .collect();
        Ok(Some(reached))
    }
}

impl GraphPass for UnusedFunctionPass {
    fn name(&self) -> &'static str {
        "unused-functions"
    }

    fn description(&self) -> &'static str {
        "Removes functions not reachable from the entry point"
    }

    fn is_global(&self) -> bool {
        true
    }

    fn run_on_function(&self, _graph: &mut FunctionGraph, _ctx: &CompilerContext) -> Result<bool> {
        Ok(false)
    }

    fn run_global(&self, program: &mut Program, ctx: &CompilerContext) -> Result<bool> {
        let Some(reached) = self.reachable(program)? else {
            ctx.events.warn(format!(
                "entry point '{}' not found, keeping all functions",
                self.entry_point
            ));
            return Ok(false);
        };

        let removed: Vec<String> = program
            .functions()
            .iter()
            .map(|graph| graph.name().to_string())
            .filter(|name| !reached.contains(name))
            .collect();
        if removed.is_empty() {
            return Ok(false);
        }

        program.retain(|graph| reached.contains(graph.name()));
        for name in &removed {
            ctx.mark_removed(name);
            let _ = ctx
                .events
                .record(EventKind::FunctionRemoved)
                .function(name.as_str())
                .pass(self.name());
        }
        Ok(true)
    }
}
