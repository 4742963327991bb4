//! The set of monitored targets and the active query mode.

use semprate_types::{MonitoredTarget, QueryMode};

/// Monitored targets of every kind plus the mode that decides which of them
/// are queried.
///
/// Targets are kept in insertion order. Adding a target selects its kind as
/// the active mode (last writer wins); [`set_mode`](Self::set_mode) overrides
/// that until the next add. The catalog only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryCatalog {
    targets: Vec<MonitoredTarget>,
    mode: QueryMode,
}

impl QueryCatalog {
    /// Create an empty catalog in linked-router mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target and select its kind. Returns the newly active mode.
    pub fn add(&mut self, target: MonitoredTarget) -> QueryMode {
        self.mode = target.mode();
        self.targets.push(target);
        self.mode
    }

    /// Add the physical name of a router linked to this one by MNR.
    pub fn add_linked_router(&mut self, physical_name: impl Into<String>) -> QueryMode {
        self.add(MonitoredTarget::linked_router(physical_name))
    }

    /// Add a VPN bridge name.
    pub fn add_bridge(&mut self, name: impl Into<String>) -> QueryMode {
        self.add(MonitoredTarget::bridge(name))
    }

    /// Add a SEMP query body (without the `<rpc>` element).
    pub fn add_user_query(&mut self, fragment: impl Into<String>) -> QueryMode {
        self.add(MonitoredTarget::user_query(fragment))
    }

    /// Explicitly select the active mode.
    pub fn set_mode(&mut self, mode: QueryMode) {
        self.mode = mode;
    }

    /// The active mode.
    pub fn mode(&self) -> QueryMode {
        self.mode
    }

    /// Targets of the active mode, in insertion order.
    pub fn active_targets(&self) -> impl Iterator<Item = &MonitoredTarget> {
        self.targets_for(self.mode)
    }

    /// Targets of a given mode, in insertion order.
    pub fn targets_for(&self, mode: QueryMode) -> impl Iterator<Item = &MonitoredTarget> {
        self.targets.iter().filter(move |t| t.mode() == mode)
    }

    /// Identifiers of the targets of a given mode.
    pub fn identifiers(&self, mode: QueryMode) -> Vec<String> {
        self.targets_for(mode)
            .map(|t| t.identifier().to_string())
            .collect()
    }

    /// Total number of targets across all kinds.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Check if no target of any kind has been added.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
