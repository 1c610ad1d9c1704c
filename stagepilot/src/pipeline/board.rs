//! Per-stage status, visibility and skip bookkeeping.

use crate::core::{StageKey, StageStatus};
use std::collections::HashMap;

/// Why a stage was skipped, and which branch stage caused it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipRecord<S: StageKey> {
    /// Human-readable reason (e.g. "Lead marked as not a fit").
    pub reason: String,
    /// The branch stage whose decision skipped this stage.
    pub source: S,
}

impl<S: StageKey> SkipRecord<S> {
    /// Creates a new skip record.
    #[must_use]
    pub fn new(reason: impl Into<String>, source: S) -> Self {
        Self {
            reason: reason.into(),
            source,
        }
    }
}

/// The mutable per-stage maps of one pipeline instance.
///
/// A stage is `Skipped` exactly when it has a skip record.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StageBoard<S: StageKey> {
    statuses: HashMap<S, StageStatus>,
    /// `true` means collapsed.
    collapsed: HashMap<S, bool>,
    skips: HashMap<S, SkipRecord<S>>,
}

impl<S: StageKey> StageBoard<S> {
    /// Creates a board with every stage pending and collapsed.
    pub(crate) fn new(stages: impl IntoIterator<Item = S>) -> Self {
        let mut statuses = HashMap::new();
        let mut collapsed = HashMap::new();
        for stage in stages {
            statuses.insert(stage, StageStatus::Pending);
            collapsed.insert(stage, true);
        }
        Self {
            statuses,
            collapsed,
            skips: HashMap::new(),
        }
    }

    pub(crate) fn status(&self, stage: S) -> StageStatus {
        self.statuses.get(&stage).copied().unwrap_or_default()
    }

    /// Sets a non-skipped status, dropping any skip record.
    pub(crate) fn set_status(&mut self, stage: S, status: StageStatus) {
        debug_assert_ne!(status, StageStatus::Skipped, "use StageBoard::skip");
        self.skips.remove(&stage);
        self.statuses.insert(stage, status);
    }

    /// Marks a stage skipped and collapses it.
    pub(crate) fn skip(&mut self, stage: S, record: SkipRecord<S>) {
        self.statuses.insert(stage, StageStatus::Skipped);
        self.skips.insert(stage, record);
        self.collapse(stage);
    }

    pub(crate) fn skip_record(&self, stage: S) -> Option<&SkipRecord<S>> {
        self.skips.get(&stage)
    }

    pub(crate) fn is_collapsed(&self, stage: S) -> bool {
        self.collapsed.get(&stage).copied().unwrap_or(true)
    }

    pub(crate) fn collapse(&mut self, stage: S) {
        self.collapsed.insert(stage, true);
    }

    pub(crate) fn expand(&mut self, stage: S) {
        self.collapsed.insert(stage, false);
    }

    pub(crate) fn statuses(&self) -> &HashMap<S, StageStatus> {
        &self.statuses
    }

    pub(crate) fn collapsed_map(&self) -> &HashMap<S, bool> {
        &self.collapsed
    }

    pub(crate) fn skip_records(&self) -> &HashMap<S, SkipRecord<S>> {
        &self.skips
    }
}
