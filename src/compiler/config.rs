//! Configuration for the optimizer driver.

use std::path::PathBuf;

/// Configuration for the [`Optimizer`](crate::compiler::Optimizer).
///
/// Controls which post-conditions are checked, whether graphs are dumped, and whether
/// unused functions are removed after every function has been optimized.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Verify every optimized graph (default: true).
    pub verify_graphs: bool,

    /// Write a DOT dump of every optimized graph (default: false).
    pub dump_graphs: bool,

    /// Directory the dumps are written to (default: the current directory).
    pub dump_dir: PathBuf,

    /// Remove functions not reachable from the entry point (default: true).
    pub remove_unused_functions: bool,

    /// Name of the function unused-function removal starts from (default: `main`).
    pub entry_point: String,

    /// Optimize functions in parallel (default: true).
    pub parallel: bool,

    /// Run a third cleanup round and fail if it still changes the graph
    /// (default: on in debug builds).
    pub cleanup_sanity_check: bool,

    /// Record every abstract value update as an info event (default: false).
    pub trace_values: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            verify_graphs: true,
            dump_graphs: false,
            dump_dir: PathBuf::from("."),
            remove_unused_functions: true,
            entry_point: "main".to_string(),
            parallel: true,
            cleanup_sanity_check: cfg!(debug_assertions),
            trace_values: false,
        }
    }
}

impl OptimizerConfig {
    /// Enables DOT dumps into `dir`.
    #[must_use]
    pub fn with_dumps(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_graphs = true;
        self.dump_dir = dir.into();
        self
    }

    /// Sets the entry point used by unused-function removal.
    #[must_use]
    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_point = name.into();
        self
    }

    /// Runs functions one after the other.
    #[must_use]
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OptimizerConfig::default();
        assert!(config.verify_graphs);
        assert!(!config.dump_graphs);
        assert!(config.remove_unused_functions);
        assert!(config.parallel);
        assert!(!config.trace_values);
        assert_eq!(config.entry_point, "main");
        assert_eq!(config.cleanup_sanity_check, cfg!(debug_assertions));
    }

    #[test]
    fn test_builders() {
        let config = OptimizerConfig::default()
            .with_dumps("/tmp/graphs")
            .with_entry_point("start")
            .sequential();
        assert!(config.dump_graphs);
        assert_eq!(config.dump_dir, PathBuf::from("/tmp/graphs"));
        assert_eq!(config.entry_point, "start");
        assert!(!config.parallel);
    }
}
