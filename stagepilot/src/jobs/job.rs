//! A single generation job and what it reports back.

use crate::core::{ArtifactRef, StageKey};
use crate::errors::ExternalIoError;
use crate::utils::{millis_since, now_utc, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a polling job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Created; the trigger has not returned yet.
    NotStarted,
    /// Triggered; looking for the artifact.
    Polling,
    /// The artifact was found.
    Found,
    /// The trigger errored.
    Failed,
    /// Gave up after the configured number of lookups.
    TimedOut,
    /// Stopped by the owner.
    Cancelled,
}

impl JobState {
    /// Returns true while the job may still report something.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::NotStarted | Self::Polling)
    }
}

/// A triggered external job whose artifact is being polled for.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncJob<S: StageKey> {
    /// Unique id for logs.
    pub id: Uuid,
    /// The generation stage.
    pub stage: S,
    /// Artifact key polled for.
    pub artifact_key: String,
    /// External job name.
    pub job_name: String,
    /// When the job was created.
    pub created_at: Timestamp,
    /// When the trigger returned successfully.
    pub triggered_at: Option<Timestamp>,
    /// Current state.
    pub state: JobState,
    /// Lookups performed so far.
    pub attempts: u32,
}

impl<S: StageKey> AsyncJob<S> {
    /// Creates a job in `NotStarted`.
    #[must_use]
    pub fn new(stage: S, artifact_key: impl Into<String>, job_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            stage,
            artifact_key: artifact_key.into(),
            job_name: job_name.into(),
            created_at: now_utc(),
            triggered_at: None,
            state: JobState::NotStarted,
            attempts: 0,
        }
    }

    /// Milliseconds since the job was created.
    #[must_use]
    pub fn elapsed_ms(&self) -> i64 {
        millis_since(&self.created_at)
    }

    pub(crate) fn mark_triggered(&mut self) {
        self.triggered_at = Some(now_utc());
        self.state = JobState::Polling;
    }

    /// Moves to `state` unless the job already settled.
    pub(crate) fn settle(&mut self, state: JobState) {
        if self.state.is_active() {
            self.state = state;
        }
    }
}

/// What a job reports to its owner. Delivered at most once per job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobSignal<S: StageKey> {
    /// The artifact appeared.
    Found {
        /// The generation stage.
        stage: S,
        /// The artifact.
        artifact: ArtifactRef,
    },
    /// The trigger errored; nothing was polled.
    TriggerFailed {
        /// The generation stage.
        stage: S,
        /// The job that failed to start.
        job_name: String,
        /// The trigger error.
        error: ExternalIoError,
    },
    /// The lookup limit was reached without finding the artifact.
    TimedOut {
        /// The generation stage.
        stage: S,
        /// Lookups performed.
        attempts: u32,
    },
}

impl<S: StageKey> JobSignal<S> {
    /// The stage the signal is about.
    #[must_use]
    pub fn stage(&self) -> S {
        match self {
            Self::Found { stage, .. } | Self::TriggerFailed { stage, .. } | Self::TimedOut { stage, .. } => {
                *stage
            }
        }
    }
}
