//! Pipeline event type emitted for every transition and external outcome.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An event emitted by a pipeline.
///
/// Events are the structured stream through which the owning application
/// observes transitions and swallowed external failures, and decides on its
/// own retry policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// The event type (e.g., "stage.completed", "job.trigger_failed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// When the event occurred (ISO 8601).
    pub timestamp: String,

    /// The subject (lead, brief, hypothesis) the pipeline belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,

    /// The event payload data.
    #[serde(default)]
    pub data: HashMap<String, serde_json::Value>,
}

impl PipelineEvent {
    /// Creates a new pipeline event.
    #[must_use]
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            timestamp: crate::utils::iso_timestamp(),
            subject_id: None,
            data: HashMap::new(),
        }
    }

    /// Adds a data field to the event.
    #[must_use]
    pub fn add_data(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Sets the subject id.
    #[must_use]
    pub fn for_subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    /// Returns the `stage` field, if present.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        self.data.get("stage").and_then(serde_json::Value::as_str)
    }

    /// Converts the event to a JSON value.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.event_type,
            "timestamp": self.timestamp,
            "subject_id": self.subject_id,
            "data": self.data,
        })
    }

    fn for_stage(event_type: &str, stage: &str) -> Self {
        Self::new(event_type).add_data("stage", serde_json::json!(stage))
    }

    /// Creates a "stage.started" event.
    #[must_use]
    pub fn started(stage: &str) -> Self {
        Self::for_stage("stage.started", stage)
    }

    /// Creates a "stage.completed" event.
    #[must_use]
    pub fn completed(stage: &str, evidence: &str) -> Self {
        Self::for_stage("stage.completed", stage).add_data("evidence", serde_json::json!(evidence))
    }

    /// Creates a "stage.reopened" event.
    #[must_use]
    pub fn reopened(stage: &str, reason: &str) -> Self {
        Self::for_stage("stage.reopened", stage).add_data("reason", serde_json::json!(reason))
    }

    /// Creates a "stage.action_required" event.
    #[must_use]
    pub fn action_required(stage: &str, note: &str) -> Self {
        Self::for_stage("stage.action_required", stage).add_data("note", serde_json::json!(note))
    }

    /// Creates a "stage.failed" event.
    #[must_use]
    pub fn failed(stage: &str, error: &str) -> Self {
        Self::for_stage("stage.failed", stage).add_data("error", serde_json::json!(error))
    }

    /// Creates a "stage.skipped" event.
    #[must_use]
    pub fn skipped(stage: &str, reason: &str, source: &str) -> Self {
        Self::for_stage("stage.skipped", stage)
            .add_data("reason", serde_json::json!(reason))
            .add_data("source", serde_json::json!(source))
    }

    /// Creates a "stage.unskipped" event.
    #[must_use]
    pub fn unskipped(stage: &str, source: &str) -> Self {
        Self::for_stage("stage.unskipped", stage).add_data("source", serde_json::json!(source))
    }

    /// Creates a "branch.resolved" event.
    #[must_use]
    pub fn branch_resolved(stage: &str, outcome: &str, terminating: bool) -> Self {
        Self::for_stage("branch.resolved", stage)
            .add_data("outcome", serde_json::json!(outcome))
            .add_data("terminating", serde_json::json!(terminating))
    }

    /// Creates a "branch.restarted" event.
    #[must_use]
    pub fn branch_restarted(stage: &str, reverted: usize) -> Self {
        Self::for_stage("branch.restarted", stage).add_data("reverted", serde_json::json!(reverted))
    }

    /// Creates a "job.started" event.
    #[must_use]
    pub fn job_started(stage: &str, artifact_key: &str) -> Self {
        Self::for_stage("job.started", stage).add_data("artifact_key", serde_json::json!(artifact_key))
    }

    /// Creates a "job.found" event.
    #[must_use]
    pub fn job_found(stage: &str, artifact_id: &str) -> Self {
        Self::for_stage("job.found", stage).add_data("artifact_id", serde_json::json!(artifact_id))
    }

    /// Creates a "job.cancelled" event.
    #[must_use]
    pub fn job_cancelled(stage: &str) -> Self {
        Self::for_stage("job.cancelled", stage)
    }

    /// Creates a "job.timed_out" event.
    #[must_use]
    pub fn job_timed_out(stage: &str, attempts: u32) -> Self {
        Self::for_stage("job.timed_out", stage).add_data("attempts", serde_json::json!(attempts))
    }

    /// Creates a "job.trigger_failed" event.
    #[must_use]
    pub fn trigger_failed(job: &str, error: &str) -> Self {
        Self::new("job.trigger_failed")
            .add_data("job", serde_json::json!(job))
            .add_data("error", serde_json::json!(error))
    }

    /// Creates a "persistence.failed" event.
    #[must_use]
    pub fn persistence_failed(stage: &str, operation: &str, error: &str) -> Self {
        Self::for_stage("persistence.failed", stage)
            .add_data("operation", serde_json::json!(operation))
            .add_data("error", serde_json::json!(error))
    }

    /// Creates a "pipeline.completed" event.
    #[must_use]
    pub fn pipeline_completed() -> Self {
        Self::new("pipeline.completed")
    }

    /// Creates a "pipeline.terminated" event.
    #[must_use]
    pub fn pipeline_terminated(stage: &str, reason: &str) -> Self {
        Self::for_stage("pipeline.terminated", stage).add_data("reason", serde_json::json!(reason))
    }
}
