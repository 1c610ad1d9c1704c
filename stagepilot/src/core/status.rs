//! Stage status and completion-criterion enums.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::CompletionEvidence;

/// How a stage is satisfied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionKind {
    /// A file of the stage's artifact key is uploaded.
    FileUpload,
    /// The user ticks the stage off.
    #[default]
    UserConfirmation,
    /// The user picks one of the stage's branch outcomes.
    DecisionBranch,
    /// An external job produces the stage's artifact.
    AutomatedGeneration,
    /// Either a generated artifact or a manual upload; first to arrive wins.
    Composite,
}

impl fmt::Display for CompletionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileUpload => write!(f, "file_upload"),
            Self::UserConfirmation => write!(f, "user_confirmation"),
            Self::DecisionBranch => write!(f, "decision_branch"),
            Self::AutomatedGeneration => write!(f, "automated_generation"),
            Self::Composite => write!(f, "composite"),
        }
    }
}

impl CompletionKind {
    /// Returns true if the stage is backed by an external generation job.
    #[must_use]
    pub fn requires_generation(&self) -> bool {
        matches!(self, Self::AutomatedGeneration | Self::Composite)
    }

    /// Returns true if `evidence` may complete a stage of this kind
    /// through a plain completion (branch decisions are routed separately).
    #[must_use]
    pub fn accepts(&self, evidence: &CompletionEvidence) -> bool {
        match (self, evidence) {
            (
                Self::FileUpload | Self::AutomatedGeneration | Self::Composite,
                CompletionEvidence::FileArrived(_),
            ) => true,
            (Self::UserConfirmation | Self::FileUpload, CompletionEvidence::UserConfirmed) => true,
            (Self::DecisionBranch, CompletionEvidence::BranchDecision { .. }) => true,
            _ => false,
        }
    }
}

/// The status of one stage within a pipeline instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Not started.
    #[default]
    Pending,
    /// Work is underway (for generation stages: the job is polling).
    InProgress,
    /// Waiting on the user.
    ActionRequired,
    /// Done.
    Completed,
    /// The generation trigger errored; retryable.
    Failed,
    /// Not applicable; always carries a reason.
    Skipped,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::ActionRequired => write!(f, "action_required"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl StageStatus {
    /// Returns true if the stage still needs work and can be current.
    ///
    /// `Failed` is open: a failed generation blocks the pipeline until retried.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.is_settled()
    }

    /// Returns true for `Completed` and `Skipped`.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    /// Returns true while a generation job may be watching the stage.
    #[must_use]
    pub fn is_awaiting_generation(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress | Self::ActionRequired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ArtifactRef;

    #[test]
    fn test_stage_status_display() {
        assert_eq!(StageStatus::Pending.to_string(), "pending");
        assert_eq!(StageStatus::InProgress.to_string(), "in_progress");
        assert_eq!(StageStatus::ActionRequired.to_string(), "action_required");
        assert_eq!(StageStatus::Skipped.to_string(), "skipped");
    }

    #[test]
    fn test_stage_status_open_and_settled() {
        assert!(StageStatus::Pending.is_open());
        assert!(StageStatus::Failed.is_open());
        assert!(StageStatus::ActionRequired.is_open());
        assert!(StageStatus::Completed.is_settled());
        assert!(StageStatus::Skipped.is_settled());
        assert!(!StageStatus::Failed.is_awaiting_generation());
    }

    #[test]
    fn test_stage_status_serialize() {
        let json = serde_json::to_string(&StageStatus::ActionRequired).unwrap();
        assert_eq!(json, r#""action_required""#);

        let back: StageStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StageStatus::ActionRequired);
    }

    #[test]
    fn test_completion_kind_accepts() {
        let file = CompletionEvidence::FileArrived(ArtifactRef::new("a1", "proposal"));

        assert!(CompletionKind::FileUpload.accepts(&file));
        assert!(CompletionKind::FileUpload.accepts(&CompletionEvidence::UserConfirmed));
        assert!(CompletionKind::Composite.accepts(&file));
        assert!(!CompletionKind::Composite.accepts(&CompletionEvidence::UserConfirmed));
        assert!(!CompletionKind::UserConfirmation.accepts(&file));
        assert!(!CompletionKind::DecisionBranch.accepts(&CompletionEvidence::UserConfirmed));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(StageStatus::default(), StageStatus::Pending);
        assert_eq!(CompletionKind::default(), CompletionKind::UserConfirmation);
    }

    #[test]
    fn test_requires_generation() {
        assert!(CompletionKind::AutomatedGeneration.requires_generation());
        assert!(CompletionKind::Composite.requires_generation());
        assert!(!CompletionKind::FileUpload.requires_generation());
    }
}
