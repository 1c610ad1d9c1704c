//! Error types for the stagepilot engine.
//!
//! `Validation` and `InvalidTransition` are programming errors: they mean a
//! registry or a caller is wrong, and an erroring operation never mutates
//! the pipeline. `ExternalIo` is what collaborators return; the runtime
//! logs it and carries on rather than propagating it into the state machine.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for stagepilot operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An operation referenced an unknown stage or outcome, or a registry is malformed.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// An operation is not allowed in the stage's current state or kind.
    #[error("{0}")]
    InvalidTransition(#[from] InvalidTransitionError),

    /// A collaborator (store, artifact lookup, job trigger) failed.
    #[error("{0}")]
    ExternalIo(#[from] ExternalIoError),

    /// A poll gave up after the configured number of attempts.
    #[error("Polling for stage '{stage}' timed out after {attempts} attempts")]
    PollTimeout {
        /// The polled stage.
        stage: String,
        /// Lookups performed.
        attempts: u32,
    },

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl PipelineError {
    /// Stable error code for logs and events.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Validation(e) => e.code,
            Self::InvalidTransition(_) => "INVALID_TRANSITION",
            Self::ExternalIo(_) => "EXTERNAL_IO",
            Self::PollTimeout { .. } => "POLL_TIMEOUT",
            Self::Serialization(_) => "SERIALIZATION",
        }
    }
}

/// Error raised when a stage, outcome or registry definition is invalid.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    /// Stable error code (e.g., "UNKNOWN_STAGE").
    pub code: &'static str,
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
}

impl ValidationError {
    /// Creates a new validation error.
    #[must_use]
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            stages: Vec::new(),
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// A stage id that is not part of the registry.
    #[must_use]
    pub fn unknown_stage(stage: &str) -> Self {
        Self::new("UNKNOWN_STAGE", format!("Unknown stage '{stage}'"))
            .with_stages(vec![stage.to_string()])
    }

    /// An outcome name not declared on a branch stage.
    #[must_use]
    pub fn unknown_outcome(stage: &str, outcome: &str) -> Self {
        Self::new(
            "UNKNOWN_OUTCOME",
            format!("Stage '{stage}' has no outcome named '{outcome}'"),
        )
        .with_stages(vec![stage.to_string()])
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("message".to_string(), serde_json::json!(self.message));
        map.insert("stages".to_string(), serde_json::json!(self.stages));
        map
    }
}

/// Error raised when an operation does not apply to a stage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid transition '{operation}' on stage '{stage}': {reason}")]
pub struct InvalidTransitionError {
    /// The stage.
    pub stage: String,
    /// The attempted operation.
    pub operation: &'static str,
    /// Why it was refused.
    pub reason: String,
}

impl InvalidTransitionError {
    /// Creates a new invalid transition error.
    #[must_use]
    pub fn new(stage: impl Into<String>, operation: &'static str, reason: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            operation,
            reason: reason.into(),
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!("InvalidTransition"));
        map.insert("stage".to_string(), serde_json::json!(self.stage));
        map.insert("operation".to_string(), serde_json::json!(self.operation));
        map.insert("reason".to_string(), serde_json::json!(self.reason));
        map
    }
}

/// Which collaborator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalService {
    /// The stage-data store.
    Store,
    /// The artifact lookup.
    ArtifactLookup,
    /// The external job trigger.
    JobTrigger,
    /// The completion listener.
    CompletionListener,
}

impl std::fmt::Display for ExternalService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store => write!(f, "store"),
            Self::ArtifactLookup => write!(f, "artifact_lookup"),
            Self::JobTrigger => write!(f, "job_trigger"),
            Self::CompletionListener => write!(f, "completion_listener"),
        }
    }
}

/// Error returned by a collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{service} error: {message}")]
pub struct ExternalIoError {
    /// The failing collaborator.
    pub service: ExternalService,
    /// The error message.
    pub message: String,
}

impl ExternalIoError {
    /// Creates a new external I/O error.
    #[must_use]
    pub fn new(service: ExternalService, message: impl Into<String>) -> Self {
        Self {
            service,
            message: message.into(),
        }
    }

    /// A store failure.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::new(ExternalService::Store, message)
    }

    /// An artifact lookup failure.
    #[must_use]
    pub fn lookup(message: impl Into<String>) -> Self {
        Self::new(ExternalService::ArtifactLookup, message)
    }

    /// A job trigger failure.
    #[must_use]
    pub fn trigger(message: impl Into<String>) -> Self {
        Self::new(ExternalService::JobTrigger, message)
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!("ExternalIoError"));
        map.insert("service".to_string(), serde_json::json!(self.service));
        map.insert("message".to_string(), serde_json::json!(self.message));
        map
    }
}
