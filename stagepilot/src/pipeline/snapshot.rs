//! Read-only snapshots handed to rendering layers.

use super::instance::{BranchDecision, TerminalReason};
use crate::core::{StageKey, StageStatus};
use std::collections::HashMap;

/// A copy of a pipeline's state. The sole read contract for renderers.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSnapshot<S: StageKey> {
    /// The subject the pipeline belongs to.
    pub subject_id: String,
    /// Stage ids in pipeline order.
    pub order: Vec<S>,
    /// Stage id to status.
    pub status_map: HashMap<S, StageStatus>,
    /// Stage id to collapsed flag (`true` = collapsed).
    pub visibility_map: HashMap<S, bool>,
    /// Skip reasons of skipped stages.
    pub skip_reasons: HashMap<S, String>,
    /// The first open stage, if any.
    pub current_stage: Option<S>,
    /// No open stage and no terminal reason.
    pub is_complete: bool,
    /// Set while a terminating decision is in effect.
    pub terminal_reason: Option<TerminalReason<S>>,
    /// The most recent branch decision.
    pub branch_outcome: Option<BranchDecision<S>>,
}

impl<S: StageKey> PipelineSnapshot<S> {
    /// Returns the status of `stage`.
    #[must_use]
    pub fn status(&self, stage: S) -> StageStatus {
        self.status_map.get(&stage).copied().unwrap_or_default()
    }

    /// Returns true if `stage` is collapsed.
    #[must_use]
    pub fn is_collapsed(&self, stage: S) -> bool {
        self.visibility_map.get(&stage).copied().unwrap_or(true)
    }

    /// Returns the skip reason of `stage`.
    #[must_use]
    pub fn skip_reason(&self, stage: S) -> Option<&str> {
        self.skip_reasons.get(&stage).map(String::as_str)
    }

    /// Returns true if a terminating decision ended the pipeline.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminal_reason.is_some()
    }

    /// Counts stages with `status`.
    #[must_use]
    pub fn count(&self, status: StageStatus) -> usize {
        self.status_map.values().filter(|s| **s == status).count()
    }

    /// Converts to JSON keyed by stage names.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        let stages: Vec<serde_json::Value> = self
            .order
            .iter()
            .map(|&id| {
                serde_json::json!({
                    "id": id.as_str(),
                    "status": self.status(id),
                    "collapsed": self.is_collapsed(id),
                    "skip_reason": self.skip_reason(id),
                })
            })
            .collect();

        serde_json::json!({
            "subject_id": self.subject_id,
            "stages": stages,
            "current_stage": self.current_stage.map(|s| s.as_str()),
            "is_complete": self.is_complete,
            "terminal_reason": self.terminal_reason.as_ref().map(|t| serde_json::json!({
                "stage": t.stage.as_str(),
                "reason": t.reason,
            })),
            "branch_outcome": self.branch_outcome.as_ref().map(|d| serde_json::json!({
                "stage": d.stage.as_str(),
                "outcome": d.outcome,
                "payload": d.payload,
            })),
        })
    }
}
