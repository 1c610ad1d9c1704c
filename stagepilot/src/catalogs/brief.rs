//! Brief builder.

use crate::core::{OutcomeSpec, StageDefinition};
use crate::errors::ValidationError;
use crate::registry::StageRegistry;

crate::stage_keys! {
    /// Stages of the brief builder.
    pub enum BriefStage {
        /// Topic confirmation.
        Topic => "topic",
        /// Automated research.
        Research => "research",
        /// Brief draft, generated or uploaded.
        Draft => "brief_draft",
        /// Approve or decline the brief.
        Approval => "approval",
        /// Publish confirmation.
        Publish => "publish",
    }
}

/// Skip reason when the brief is declined.
pub const DECLINED_REASON: &str = "Brief declined";

/// Builds the brief builder registry.
///
/// # Errors
///
/// Only if the definitions below stop validating.
pub fn brief_registry() -> Result<StageRegistry<BriefStage>, ValidationError> {
    StageRegistry::builder("brief_builder")
        .stage(StageDefinition::confirmation(BriefStage::Topic, 10))
        .stage(StageDefinition::generated(BriefStage::Research, 20, "research", "run-research"))
        .stage(StageDefinition::composite(
            BriefStage::Draft,
            30,
            "brief_draft",
            "generate-brief-draft",
        ))
        .stage(StageDefinition::decision(
            BriefStage::Approval,
            40,
            vec![
                OutcomeSpec::proceed("approve"),
                OutcomeSpec::terminate("decline", DECLINED_REASON),
            ],
        ))
        .stage(StageDefinition::confirmation(BriefStage::Publish, 50))
        .build()
}
