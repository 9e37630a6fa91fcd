//! Shared state of one optimizer run.
//!
//! The [`CompilerContext`] is handed to every pass by shared reference. All collections
//! are concurrent (`DashSet`, the boxcar-backed [`EventLog`]) so passes running on
//! different functions in parallel can record into it without locking.

use std::time::{Duration, Instant};

use dashmap::DashSet;

use crate::compiler::{EventLog, OptimizerConfig};

/// Shared state of one optimizer run.
pub struct CompilerContext {
    /// Accumulated events from all passes.
    pub events: EventLog,

    /// Driver configuration.
    pub config: OptimizerConfig,

    /// Functions every per-function pass has run on.
    pub processed: DashSet<String>,

    /// Functions at least one pass changed.
    pub changed: DashSet<String>,

    /// Functions whose graph failed verification.
    pub failed_verification: DashSet<String>,

    /// Functions removed as unused.
    pub removed_functions: DashSet<String>,

    start_time: Instant,
}

impl CompilerContext {
    /// Creates a context with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(OptimizerConfig::default())
    }

    /// Creates a context with a custom configuration.
    #[must_use]
    pub fn with_config(config: OptimizerConfig) -> Self {
        Self {
            events: EventLog::new(),
            config,
            processed: DashSet::new(),
            changed: DashSet::new(),
            failed_verification: DashSet::new(),
            removed_functions: DashSet::new(),
            start_time: Instant::now(),
        }
    }

    /// Time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Records that a pass changed `function`.
    pub fn mark_changed(&self, function: &str) {
        self.changed.insert(function.to_string());
    }

    /// Returns `true` if a pass changed `function`.
    #[must_use]
    pub fn is_changed(&self, function: &str) -> bool {
        self.changed.contains(function)
    }

    /// Records that `function` was removed from the program.
    pub fn mark_removed(&self, function: &str) {
        self.removed_functions.insert(function.to_string());
    }

    /// Names in `set`, sorted.
    #[must_use]
    pub fn sorted(set: &DashSet<String>) -> Vec<String> {
        let mut names: Vec<String> = set.iter().map(|name| name.key().clone()).collect();
        names.sort();
        names
    }
}

impl Default for CompilerContext {
    fn default() -> Self {
        Self::new()
    }
}
