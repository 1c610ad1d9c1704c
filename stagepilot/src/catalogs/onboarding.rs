//! Client onboarding timeline.
//!
//! A lead uploads a proposal, the team decides whether the lead is a fit,
//! and a fitting lead moves through contract, kickoff and strategy to launch.
//! A lead marked as not a fit gets a decline email and every later stage is
//! skipped.

use crate::core::{OutcomeSpec, StageDefinition};
use crate::errors::ValidationError;
use crate::registry::StageRegistry;

crate::stage_keys! {
    /// Stages of the onboarding timeline.
    pub enum OnboardingStage {
        /// Proposal upload.
        Proposal => "proposal",
        /// Fit review decision.
        FitReview => "fit_review",
        /// Signed contract upload.
        Contract => "contract",
        /// Kickoff call confirmation.
        Kickoff => "kickoff",
        /// Strategy document, generated or uploaded.
        Strategy => "strategy",
        /// Launch confirmation.
        Launch => "launch",
    }
}

/// Skip reason when the lead is not a fit.
pub const NOT_A_FIT_REASON: &str = "Lead marked as not a fit";

/// Job notified when the lead is declined.
pub const DECLINE_EMAIL_JOB: &str = "send-decline-email";

/// Job generating the strategy document.
pub const STRATEGY_JOB: &str = "generate-strategy-doc";

/// Builds the onboarding registry.
///
/// # Errors
///
/// Only if the definitions below stop validating.
pub fn onboarding_registry() -> Result<StageRegistry<OnboardingStage>, ValidationError> {
    StageRegistry::builder("onboarding")
        .stage(
            StageDefinition::file_upload(OnboardingStage::Proposal, 10, "proposal")
                .with_title("Upload proposal"),
        )
        .stage(
            StageDefinition::decision(
                OnboardingStage::FitReview,
                20,
                vec![
                    OutcomeSpec::proceed("fit"),
                    OutcomeSpec::terminate("not_fit", NOT_A_FIT_REASON).notify(DECLINE_EMAIL_JOB),
                ],
            )
            .with_title("Is this lead a fit?"),
        )
        .stage(
            StageDefinition::file_upload(OnboardingStage::Contract, 30, "contract")
                .with_title("Upload signed contract"),
        )
        .stage(StageDefinition::confirmation(OnboardingStage::Kickoff, 40).with_title("Kickoff call"))
        .stage(
            StageDefinition::composite(OnboardingStage::Strategy, 50, "strategy_doc", STRATEGY_JOB)
                .with_title("Strategy document"),
        )
        .stage(StageDefinition::confirmation(OnboardingStage::Launch, 60).with_title("Launch"))
        .build()
}
