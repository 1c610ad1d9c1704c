//! Ready-made pipelines.
//!
//! Each catalog declares its stage enum and builds a validated registry:
//! - [`onboarding`]: client onboarding timeline with a fit review
//! - [`hypothesis`]: ICP to hypotheses to outbound sequence
//! - [`brief`]: content brief builder with an approval gate
//! - [`repurpose`]: one source file turned into long-form and social content

pub mod brief;
pub mod hypothesis;
pub mod onboarding;
pub mod repurpose;

pub use brief::{brief_registry, BriefStage};
pub use hypothesis::{hypothesis_registry, HypothesisStage};
pub use onboarding::{onboarding_registry, OnboardingStage};
pub use repurpose::{repurpose_registry, RepurposeStage};
