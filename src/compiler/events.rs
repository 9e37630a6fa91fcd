//! Structured event logging for optimizer runs.
//!
//! Every rewrite a pass performs is recorded as an [`Event`] in an [`EventLog`]. The log is
//! append-only and backed by a `boxcar::Vec`, so recording only needs `&self` and a single
//! log can be shared by passes running on different functions in parallel.
//!
//! Events are recorded through a builder that appends itself when dropped:
//!
//! ```rust
//! use ssaprop::compiler::{EventKind, EventLog};
//! use ssaprop::ir::NodeId;
//!
//! let log = EventLog::new();
//! log.record(EventKind::ConstantFolded)
//!     .at("main", NodeId::new(12))
//!     .message("Add -> 5");
//! log.warn("entry point missing");
//!
//! assert_eq!(log.count_kind(EventKind::ConstantFolded), 1);
//! assert!(log.has_changes());
//! ```

use std::fmt;

use strum::{EnumIter, IntoStaticStr};

use crate::ir::NodeId;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum EventKind {
    /// A node was replaced by a constant.
    ConstantFolded,
    /// A conditional branch was replaced by a jump.
    BranchSimplified,
    /// A constant side-effecting node was removed from the memory chain.
    MemorySpliced,
    /// A dead control edge was removed from a block.
    EdgeRemoved,
    /// An unreachable block was removed.
    BlockRemoved,
    /// A phi with a single operand was replaced by that operand.
    PhiSimplified,
    /// Garbage nodes were retired.
    NodesRemoved,
    /// An unused function was removed from the program.
    FunctionRemoved,
    /// A pass started on a function.
    PassStarted,
    /// A pass finished on a function.
    PassCompleted,
    /// A graph dump was written.
    GraphDumped,
    /// A graph passed verification.
    GraphVerified,
    /// Informational message.
    Info,
    /// Something unexpected that did not stop the run.
    Warning,
    /// Something that failed.
    Error,
}

impl EventKind {
    /// Returns `true` for kinds describing a change to the program.
    #[must_use]
    pub const fn is_change(self) -> bool {
        matches!(
            self,
            Self::ConstantFolded
                | Self::BranchSimplified
                | Self::MemorySpliced
                | Self::EdgeRemoved
                | Self::BlockRemoved
                | Self::PhiSimplified
                | Self::NodesRemoved
                | Self::FunctionRemoved
        )
    }

    /// Short human-readable description.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::ConstantFolded => "constant folded",
            Self::BranchSimplified => "branch simplified",
            Self::MemorySpliced => "memory chain spliced",
            Self::EdgeRemoved => "dead edge removed",
            Self::BlockRemoved => "unreachable block removed",
            Self::PhiSimplified => "phi simplified",
            Self::NodesRemoved => "garbage removed",
            Self::FunctionRemoved => "unused function removed",
            Self::PassStarted => "pass started",
            Self::PassCompleted => "pass completed",
            Self::GraphDumped => "graph dumped",
            Self::GraphVerified => "graph verified",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name: &'static str = self.into();
        f.write_str(name)
    }
}

/// A single recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Function the event concerns.
    pub function: Option<String>,
    /// Node the event concerns.
    pub node: Option<NodeId>,
    /// Pass that recorded the event.
    pub pass: Option<&'static str>,
    /// Free-form details.
    pub message: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(pass) = self.pass {
            write!(f, " {pass}")?;
        }
        if let Some(function) = &self.function {
            write!(f, " {function}")?;
        }
        if let Some(node) = self.node {
            write!(f, "@{node}")?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        Ok(())
    }
}

/// Builder returned by [`EventLog::record`]. Appends the event when dropped.
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    event: Option<Event>,
}

impl EventBuilder<'_> {
    fn event(&mut self) -> Option<&mut Event> {
        self.event.as_mut()
    }

    /// Sets the function.
    #[must_use]
    pub fn function(mut self, name: impl Into<String>) -> Self {
        if let Some(event) = self.event() {
            event.function = Some(name.into());
        }
        self
    }

    /// Sets the node.
    #[must_use]
    pub fn node(mut self, node: NodeId) -> Self {
        if let Some(event) = self.event() {
            event.node = Some(node);
        }
        self
    }

    /// Sets function and node at once.
    #[must_use]
    pub fn at(self, function: impl Into<String>, node: NodeId) -> Self {
        self.function(function).node(node)
    }

    /// Sets the recording pass.
    #[must_use]
    pub fn pass(mut self, pass: &'static str) -> Self {
        if let Some(event) = self.event() {
            event.pass = Some(pass);
        }
        self
    }

    /// Sets the message. Usually the last call of the chain.
    pub fn message(mut self, message: impl Into<String>) -> Self {
        if let Some(event) = self.event() {
            event.message = message.into();
        }
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        if let Some(event) = self.event.take() {
            self.log.events.push(event);
        }
    }
}

/// Thread-safe append-only log of [`Event`]s.
#[derive(Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Starts recording an event of `kind`.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder {
            log: self,
            event: Some(Event {
                kind,
                function: None,
                node: None,
                pass: None,
                message: String::new(),
            }),
        }
    }

    /// Records an informational message.
    pub fn info(&self, message: impl Into<String>) {
        let _ = self.record(EventKind::Info).message(message);
    }

    /// Records a warning.
    pub fn warn(&self, message: impl Into<String>) {
        let _ = self.record(EventKind::Warning).message(message);
    }

    /// Records an error.
    pub fn error(&self, message: impl Into<String>) {
        let _ = self.record(EventKind::Error).message(message);
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All events in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> + '_ {
        self.events.iter().map(|(_, event)| event)
    }

    /// Events concerning `function`.
    pub fn for_function<'a>(&'a self, function: &'a str) -> impl Iterator<Item = &'a Event> + 'a {
        self.iter()
            .filter(move |event| event.function.as_deref() == Some(function))
    }

    /// Number of events of `kind`.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.iter().filter(|event| event.kind == kind).count()
    }

    /// Returns `true` if any recorded event describes a change.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.iter().any(|event| event.kind.is_change())
    }

    /// Appends every event of `other`.
    pub fn merge(&self, other: EventLog) {
        for event in other.iter() {
            self.events.push(event.clone());
        }
    }

    /// Moves all events out, leaving the log empty.
    pub fn take(&mut self) -> EventLog {
        std::mem::replace(self, EventLog::new())
    }

    /// Aggregated counters.
    #[must_use]
    pub fn summary(&self) -> DerivedStats {
        let mut stats = DerivedStats::default();
        for event in self.iter() {
            let counter = match event.kind {
                EventKind::ConstantFolded => &mut stats.constants_folded,
                EventKind::BranchSimplified => &mut stats.branches_simplified,
                EventKind::MemorySpliced => &mut stats.memory_spliced,
                EventKind::EdgeRemoved => &mut stats.edges_removed,
                EventKind::BlockRemoved => &mut stats.blocks_removed,
                EventKind::PhiSimplified => &mut stats.phis_simplified,
                EventKind::NodesRemoved => &mut stats.garbage_events,
                EventKind::FunctionRemoved => &mut stats.functions_removed,
                EventKind::Warning => &mut stats.warnings,
                EventKind::Error => &mut stats.errors,
                EventKind::PassStarted
                | EventKind::PassCompleted
                | EventKind::GraphDumped
                | EventKind::GraphVerified
                | EventKind::Info => continue,
            };
            *counter += 1;
        }
        stats
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Counters derived from an [`EventLog`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivedStats {
    /// Nodes replaced by constants.
    pub constants_folded: usize,
    /// Branches turned into jumps.
    pub branches_simplified: usize,
    /// Side-effecting nodes spliced out of the memory chain.
    pub memory_spliced: usize,
    /// Dead control edges removed.
    pub edges_removed: usize,
    /// Unreachable blocks removed.
    pub blocks_removed: usize,
    /// Single-operand phis removed.
    pub phis_simplified: usize,
    /// Garbage collection events.
    pub garbage_events: usize,
    /// Functions removed from the program.
    pub functions_removed: usize,
    /// Warnings.
    pub warnings: usize,
    /// Errors.
    pub errors: usize,
}

impl DerivedStats {
    /// Total number of changes.
    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.constants_folded
            + self.branches_simplified
            + self.memory_spliced
            + self.edges_removed
            + self.blocks_removed
            + self.phis_simplified
            + self.garbage_events
            + self.functions_removed
    }
}

impl fmt::Display for DerivedStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} constants, {} branches, {} spliced, {} edges, {} blocks, {} phis, {} functions removed",
            self.constants_folded,
            self.branches_simplified,
            self.memory_spliced,
            self.edges_removed,
            self.blocks_removed,
            self.phis_simplified,
            self.functions_removed
        )?;
        if self.warnings > 0 || self.errors > 0 {
            write!(f, " ({} warnings, {} errors)", self.warnings, self.errors)?;
        }
        Ok(())
    }
}
