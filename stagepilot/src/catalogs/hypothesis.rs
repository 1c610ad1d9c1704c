//! Hypothesis lab: from an ideal customer profile to a launched sequence.

use crate::core::{OutcomeSpec, StageDefinition};
use crate::errors::ValidationError;
use crate::registry::StageRegistry;

crate::stage_keys! {
    /// Stages of the hypothesis lab.
    pub enum HypothesisStage {
        /// Ideal customer profile input.
        Icp => "icp",
        /// Automated hypothesis generation.
        Generation => "hypothesis_generation",
        /// Accept, adjust or reject the hypotheses.
        Review => "hypothesis_review",
        /// Automated email sequence generation.
        Sequence => "email_sequence",
        /// Launch approval.
        Launch => "launch",
    }
}

/// Skip reason when the hypotheses are rejected.
pub const REJECTED_REASON: &str = "Hypothesis rejected";

/// Builds the hypothesis lab registry.
///
/// # Errors
///
/// Only if the definitions below stop validating.
pub fn hypothesis_registry() -> Result<StageRegistry<HypothesisStage>, ValidationError> {
    StageRegistry::builder("hypothesis_lab")
        .stage(StageDefinition::confirmation(HypothesisStage::Icp, 10).with_title("Describe your ICP"))
        .stage(StageDefinition::generated(
            HypothesisStage::Generation,
            20,
            "hypotheses",
            "generate-hypotheses",
        ))
        .stage(StageDefinition::decision(
            HypothesisStage::Review,
            30,
            vec![
                OutcomeSpec::proceed("accept"),
                OutcomeSpec::proceed("adjust"),
                OutcomeSpec::terminate("reject", REJECTED_REASON),
            ],
        ))
        .stage(StageDefinition::generated(
            HypothesisStage::Sequence,
            40,
            "email_sequence",
            "generate-email-sequence",
        ))
        .stage(StageDefinition::confirmation(HypothesisStage::Launch, 50).with_title("Approve launch"))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ArtifactRef, CompletionEvidence, StageStatus};
    use crate::pipeline::{Effect, PipelineInstance};
    use crate::testing::assert_skipped_with;
    use std::sync::Arc;

    fn reviewed(outcome: &str, payload: serde_json::Value) -> PipelineInstance<HypothesisStage> {
        let mut pipeline = PipelineInstance::new(Arc::new(hypothesis_registry().unwrap()), "hyp-1");
        pipeline.activate();
        pipeline
            .complete_stage(HypothesisStage::Icp, CompletionEvidence::UserConfirmed)
            .unwrap();
        pipeline
            .complete_stage(
                HypothesisStage::Generation,
                CompletionEvidence::file(ArtifactRef::new("h-1", "hypotheses")),
            )
            .unwrap();
        pipeline
            .resolve_branch(HypothesisStage::Review, outcome, payload)
            .unwrap();
        pipeline
    }

    #[test]
    fn test_adjust_continues_with_payload() {
        let pipeline = reviewed("adjust", serde_json::json!({"angle": "cost savings"}));

        let decision = pipeline.branch_outcome().unwrap();
        assert_eq!(decision.outcome, "adjust");
        assert_eq!(decision.payload["angle"], "cost savings");
        assert_eq!(pipeline.current_stage(), Some(HypothesisStage::Sequence));
        assert_eq!(pipeline.status(HypothesisStage::Sequence), StageStatus::InProgress);
    }

    #[test]
    fn test_restarting_accept_stops_sequence_generation() {
        let mut pipeline = reviewed("accept", serde_json::Value::Null);
        assert_eq!(pipeline.status(HypothesisStage::Sequence), StageStatus::InProgress);

        let t = pipeline.restart_decision(HypothesisStage::Review).unwrap();

        assert_eq!(pipeline.status(HypothesisStage::Review), StageStatus::Pending);
        assert_eq!(pipeline.status(HypothesisStage::Sequence), StageStatus::Pending);
        assert_eq!(pipeline.current_stage(), Some(HypothesisStage::Review));
        assert!(pipeline.is_collapsed(HypothesisStage::Sequence));
        assert!(t.has_effect(|e| *e == Effect::CancelJob { stage: HypothesisStage::Sequence }));
        assert!(!t.has_effect(|e| matches!(e, Effect::StartJob { .. })));
    }

    #[test]
    fn test_reject_skips_sequence_and_launch() {
        let pipeline = reviewed("reject", serde_json::Value::Null);
        let snapshot = pipeline.snapshot();

        assert_skipped_with(&snapshot, HypothesisStage::Sequence, REJECTED_REASON);
        assert_skipped_with(&snapshot, HypothesisStage::Launch, REJECTED_REASON);
        assert!(snapshot.is_terminated());
    }
}
