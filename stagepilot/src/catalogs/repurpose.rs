//! Repurpose factory.
//!
//! `social_only` jumps past long-form generation; the skipped stage comes
//! back if the format decision is restarted.

use crate::core::{OutcomeSpec, StageDefinition};
use crate::errors::ValidationError;
use crate::registry::StageRegistry;

crate::stage_keys! {
    /// Stages of the repurpose factory.
    pub enum RepurposeStage {
        /// Source file upload.
        Source => "source",
        /// Format selection.
        Format => "format",
        /// Automated long-form generation.
        LongForm => "long_form",
        /// Automated social post generation.
        Social => "social",
        /// Publish confirmation.
        Publish => "publish",
    }
}

/// Builds the repurpose factory registry.
///
/// # Errors
///
/// Only if the definitions below stop validating.
pub fn repurpose_registry() -> Result<StageRegistry<RepurposeStage>, ValidationError> {
    StageRegistry::builder("repurpose_factory")
        .stage(StageDefinition::file_upload(RepurposeStage::Source, 10, "source"))
        .stage(StageDefinition::decision(
            RepurposeStage::Format,
            20,
            vec![
                OutcomeSpec::proceed("full_pack"),
                OutcomeSpec::proceed("social_only").jump_to(RepurposeStage::Social),
            ],
        ))
        .stage(StageDefinition::generated(
            RepurposeStage::LongForm,
            30,
            "long_form",
            "generate-long-form",
        ))
        .stage(StageDefinition::generated(
            RepurposeStage::Social,
            40,
            "social_posts",
            "generate-social-posts",
        ))
        .stage(StageDefinition::confirmation(RepurposeStage::Publish, 50))
        .build()
}
