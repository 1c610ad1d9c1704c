//! Completion evidence and artifact references.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reference to an uploaded or generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Storage identifier of the file.
    pub id: String,
    /// Logical file type, correlated with a stage's artifact key.
    pub artifact_key: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Download location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// When the file appeared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ArtifactRef {
    /// Creates a new artifact reference.
    #[must_use]
    pub fn new(id: impl Into<String>, artifact_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            artifact_key: artifact_key.into(),
            name: None,
            url: None,
            created_at: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the download URL.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Sets the creation time.
    #[must_use]
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }
}

/// What satisfied a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CompletionEvidence {
    /// A file for the stage's artifact key arrived (upload or generation).
    FileArrived(ArtifactRef),
    /// The user confirmed the stage.
    UserConfirmed,
    /// A decision was made at a branch stage.
    BranchDecision {
        /// Chosen outcome name.
        outcome: String,
        /// Data attached to the decision (chosen variant, adjusted values).
        #[serde(default)]
        payload: serde_json::Value,
    },
}

impl CompletionEvidence {
    /// Evidence for an arrived file.
    #[must_use]
    pub fn file(artifact: ArtifactRef) -> Self {
        Self::FileArrived(artifact)
    }

    /// Evidence for a branch decision without payload.
    #[must_use]
    pub fn decision(outcome: impl Into<String>) -> Self {
        Self::BranchDecision {
            outcome: outcome.into(),
            payload: serde_json::Value::Null,
        }
    }

    /// Short label used in logs and events.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::FileArrived(_) => "file_arrived",
            Self::UserConfirmed => "user_confirmed",
            Self::BranchDecision { .. } => "branch_decision",
        }
    }
}
